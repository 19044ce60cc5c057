//! Where simulator output lines go after processing

use crate::errors::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Console echo plus an optional raw output file
pub struct LineSink {
    console: Option<Box<dyn Write + Send>>,
    file: Option<BufWriter<File>>,
    suffix: String,
}

impl LineSink {
    /// Echo to stdout, tagging each line with `suffix`
    pub fn stdout(suffix: impl Into<String>) -> Self {
        Self {
            console: Some(Box::new(std::io::stdout())),
            file: None,
            suffix: suffix.into(),
        }
    }

    /// No console echo
    pub fn silent() -> Self {
        Self {
            console: None,
            file: None,
            suffix: String::new(),
        }
    }

    /// Also write every decoded line to a raw output file
    pub fn with_file(mut self, path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            self.file = Some(BufWriter::new(File::create(path)?));
        }
        Ok(self)
    }

    /// Emit a decoded line
    pub fn echo_text(&mut self, line: &str) -> Result<()> {
        if let Some(console) = self.console.as_mut() {
            writeln!(console, "{}{}", line.trim_end_matches(['\r', '\n']), self.suffix)?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.trim_start_matches(' ').as_bytes())?;
        }
        Ok(())
    }

    /// Emit a line that is not valid UTF-8; console only
    pub fn echo_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(console) = self.console.as_mut() {
            console.write_all(bytes)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(console) = self.console.as_mut() {
            console.flush()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Console suffix for a stage name, e.g. `   Light`
///
/// Each word is title-cased: a letter is uppercased when it follows a
/// non-letter and lowercased otherwise.
pub fn stage_suffix(stage_name: &str) -> String {
    if stage_name.is_empty() {
        return String::new();
    }
    let mut suffix = String::from("   ");
    let mut after_letter = false;
    for c in stage_name.chars() {
        if after_letter {
            suffix.extend(c.to_lowercase());
        } else {
            suffix.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }
    suffix
}
