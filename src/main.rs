//! steadyrun - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use steadyrun::cli::{Args, Config};
use steadyrun::runner::{launch, InterruptFlag, LaunchOptions};
use steadyrun::telemetry::RunSummary;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive())),
        )
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
    tracing::debug!(verbosity = verbosity.as_str(), "logging initialized");

    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    let executable = args
        .executable
        .clone()
        .or_else(|| config.simulator.executable.clone())
        .context("No simulator executable given (argument or simulator.executable)")?;

    let interrupt = InterruptFlag::new();
    let signal_task = interrupt.watch_ctrl_c();

    let options = LaunchOptions {
        executable,
        stage: args.stage.clone(),
        max_lines: args.max_lines,
        raw_output: args.output.clone(),
        echo: true,
        interrupt,
    };

    let outcome = launch(&config, options).await;
    signal_task.abort();

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", "Run failed:".red().bold(), e);
            return Err(e.into());
        }
    };

    if verbosity.show_summary() {
        RunSummary::new(&report).display();
    }
    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(())
}
