//! Simulator child process as a line source
//!
//! The simulator runs in its own directory, because it reads its parameter
//! file and writes its distribution files relative to the working directory.
//! Stdout is read line by line; stderr is drained concurrently so a chatty
//! simulator can never block on a full pipe.

use crate::errors::{Result, RunError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long a simulator that closed its output may take to exit on its own
pub const EXIT_GRACE: Duration = Duration::from_secs(5);

/// Outcome of stopping a line source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Termination {
    /// Exit code, when the producer exited normally
    pub exit_code: Option<i32>,

    /// Whether the producer had to be killed
    pub killed: bool,

    /// Everything the producer wrote to stderr
    pub stderr: String,
}

/// Producer of raw output lines
#[async_trait]
pub trait LineSource: Send {
    /// Append the next line, terminator included, to `buf`
    ///
    /// Returns the number of bytes read; zero means the stream ended.
    async fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<usize>;

    /// Stop the producer and collect its diagnostics
    ///
    /// Must be safe to call after the stream ended on its own.
    async fn terminate(&mut self) -> Result<Termination>;
}

/// Resolved simulator executable and the directory it runs in
///
/// Symlinks are followed, so the working directory is the one holding the
/// real executable. Anything that reads the simulator's output files must use
/// this same directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorLocation {
    pub executable: PathBuf,
    pub working_dir: PathBuf,
}

impl SimulatorLocation {
    pub fn resolve(executable: &Path) -> Result<Self> {
        let resolved = executable
            .canonicalize()
            .map_err(|source| RunError::Spawn {
                path: executable.to_path_buf(),
                source,
            })?;
        let working_dir = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            executable: resolved,
            working_dir,
        })
    }
}

/// Running simulator executable
pub struct SimulatorProcess {
    executable: PathBuf,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<Vec<u8>>>,
    stream_ended: bool,
}

impl SimulatorProcess {
    /// Start the executable inside its own directory
    pub fn spawn(executable: &Path) -> Result<Self> {
        Self::spawn_at(&SimulatorLocation::resolve(executable)?)
    }

    /// Start an already resolved executable
    pub fn spawn_at(location: &SimulatorLocation) -> Result<Self> {
        let SimulatorLocation {
            executable,
            working_dir,
        } = location.clone();

        let mut child = Command::new(&executable)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                path: executable.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunError::Generic("simulator stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunError::Generic("simulator stderr was not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut collected = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut collected).await {
                debug!("stderr drain stopped: {}", e);
            }
            collected
        });

        debug!(executable = %executable.display(), cwd = %working_dir.display(), "simulator started");

        Ok(Self {
            executable,
            child,
            stdout: BufReader::new(stdout),
            stderr_task: Some(stderr_task),
            stream_ended: false,
        })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

#[async_trait]
impl LineSource for SimulatorProcess {
    async fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<usize> {
        let read = self.stdout.read_until(b'\n', buf).await?;
        if read == 0 {
            self.stream_ended = true;
        }
        Ok(read)
    }

    async fn terminate(&mut self) -> Result<Termination> {
        let exited = if self.stream_ended {
            match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
                Ok(status) => Some(status?),
                Err(_) => None,
            }
        } else {
            self.child.try_wait()?
        };

        let (status, killed) = match exited {
            Some(status) => (status, false),
            None => {
                if let Err(e) = self.child.start_kill() {
                    // exited between the check and the kill
                    debug!("kill skipped: {}", e);
                }
                (self.child.wait().await?, true)
            }
        };

        let stderr = match self.stderr_task.take() {
            Some(task) => match task.await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!("stderr drain task failed: {}", e);
                    String::new()
                }
            },
            None => String::new(),
        };

        Ok(Termination {
            exit_code: status.code(),
            killed,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let result = SimulatorProcess::spawn(Path::new("/nonexistent/dir/simulator"));
        assert!(matches!(result, Err(RunError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_lines_and_stderr_in_own_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here\n").unwrap();
        let script = dir.path().join("sim.sh");
        std::fs::write(&script, "#!/bin/sh\ncat marker.txt\necho oops >&2\necho last\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut process = SimulatorProcess::spawn(&script).unwrap();
        let mut buf = Vec::new();
        assert_eq!(process.read_line(&mut buf).await.unwrap(), 5);
        assert_eq!(buf, b"here\n");
        buf.clear();
        process.read_line(&mut buf).await.unwrap();
        assert_eq!(buf, b"last\n");
        buf.clear();
        assert_eq!(process.read_line(&mut buf).await.unwrap(), 0);

        let termination = process.terminate().await.unwrap();
        assert_eq!(termination.stderr.trim(), "oops");
        assert_eq!(termination.exit_code, Some(0));

        // second call is harmless
        let again = process.terminate().await.unwrap();
        assert!(again.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_follows_symlink() {
        let real = tempfile::TempDir::new().unwrap();
        let linked = tempfile::TempDir::new().unwrap();
        let script = real.path().join("sim.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        let link = linked.path().join("sim");
        std::os::unix::fs::symlink(&script, &link).unwrap();

        let location = SimulatorLocation::resolve(&link).unwrap();
        assert_eq!(location.working_dir, real.path().canonicalize().unwrap());
        assert_eq!(location.executable, script.canonicalize().unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_kills_running_process() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("forever.sh");
        std::fs::write(&script, "#!/bin/sh\necho start\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut process = SimulatorProcess::spawn(&script).unwrap();
        let mut buf = Vec::new();
        process.read_line(&mut buf).await.unwrap();
        let termination = process.terminate().await.unwrap();
        assert!(termination.killed);
        assert_eq!(termination.exit_code, None);
    }
}
