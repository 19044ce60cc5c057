//! Assembles a run from configuration and starts the simulator

use crate::analysis::build_detector;
use crate::cli::Config;
use crate::cutoff::Illumination;
use crate::errors::Result;
use crate::runner::driver::{RunDriver, RunReport, StageInfo};
use crate::runner::interrupt::InterruptFlag;
use crate::runner::sink::{stage_suffix, LineSink};
use crate::simulator::{
    ParameterFile, SimulatorLocation, SimulatorProcess, ILLUMINATION_VAR, TIME_STEP_VAR,
};
use crate::stream::Calibration;
use std::path::PathBuf;
use tracing::info;

/// Per-invocation settings that are not part of the configuration file
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: PathBuf,
    pub stage: Option<String>,
    pub max_lines: Option<u64>,
    /// Overrides `output.raw_output`
    pub raw_output: Option<PathBuf>,
    /// Echo simulator output to stdout
    pub echo: bool,
    pub interrupt: InterruptFlag,
}

impl LaunchOptions {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            stage: None,
            max_lines: None,
            raw_output: None,
            echo: true,
            interrupt: InterruptFlag::new(),
        }
    }
}

/// Run one stage of the simulator to a stop decision
pub async fn launch(config: &Config, options: LaunchOptions) -> Result<RunReport> {
    let stage = config.stage(options.stage.as_deref())?;
    let location = SimulatorLocation::resolve(&options.executable)?;
    let params = config
        .simulator
        .parameter_file
        .as_ref()
        .map(ParameterFile::load)
        .transpose()?;

    let time_step = match &params {
        Some(p) => p.get_f64(TIME_STEP_VAR)?,
        None => config.simulator.time_step,
    };
    let illumination = match (stage.illuminated, &params) {
        (Some(flag), _) => Illumination::from_flag(flag),
        (None, Some(p)) => Illumination::from_intensity(p.get_f64(ILLUMINATION_VAR)?),
        (None, None) => Illumination::On,
    };

    let detector = build_detector(&config.convergence, time_step)?;
    let calibration = Calibration::from_config(&config.calibration, time_step)?;
    let cutoffs = config.cutoff.build(&stage.name, illumination)?;
    let extractor = config.snapshots.extractor(&location.working_dir, &stage.name)?;

    let suffix = if config.output.show_stage_name {
        stage_suffix(&stage.name)
    } else {
        String::new()
    };
    let sink = if options.echo {
        LineSink::stdout(suffix)
    } else {
        LineSink::silent()
    };
    let raw_output = options
        .raw_output
        .clone()
        .or_else(|| config.output.raw_output.clone());
    let sink = sink.with_file(raw_output.as_deref())?;

    info!(
        stage = %stage.name,
        illumination = ?illumination,
        time_step,
        strategy = detector.as_ref().map(|_| config.convergence.strategy.as_str()).unwrap_or("disabled"),
        cutoffs = cutoffs.len(),
        "starting simulator"
    );
    let source = SimulatorProcess::spawn_at(&location)?;

    let mut driver = RunDriver::new(source, sink, calibration)
        .with_stage(StageInfo::new(stage.name.clone(), illumination, stage.number))
        .with_detector(detector)
        .with_extractor(extractor)
        .with_interrupt(options.interrupt)
        .with_max_lines(options.max_lines);
    for cutoff in cutoffs {
        driver = driver.with_cutoff(cutoff);
    }
    let report = driver.run().await?;
    Ok(report)
}
