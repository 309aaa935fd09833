//! CLI entry point for the AV1 batch transcoder
//!
//! Parses command line arguments, assembles the configuration and runs the batch.

use av1_batch::config::ConfigError;
use av1_batch::{
    run_startup_checks, AffinityPlan, BatchRunner, Config, Interrupts, RenameMover, SystemRunner,
};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status after SIGINT/SIGTERM
const EXIT_INTERRUPTED: u8 = 130;

/// Batch-transcode videos to AV1 with ffmpeg and SVT-AV1
#[derive(Parser, Debug)]
#[command(name = "av1-batch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CRF value passed to SVT-AV1
    #[arg(long)]
    crf: Option<u32>,

    /// Preset value passed to SVT-AV1
    #[arg(long, allow_negative_numbers = true)]
    preset: Option<i32>,

    /// Maximum height of output video
    #[arg(long = "maxheight")]
    max_height: Option<u32>,

    /// Disable the maximum height filter; --maxheight is ignored when set
    #[arg(long = "nomaxheight")]
    no_max_height: bool,

    /// SVT-AV1 params passed to the ffmpeg command
    #[arg(long = "svtav1-params")]
    svtav1_params: Option<String>,

    /// Number of logical CPU cores passed to taskset
    #[arg(long)]
    threads: Option<u32>,

    /// Input video files pattern
    #[arg(long)]
    pattern: Option<String>,

    /// Directory that will be scanned for videos
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Directory where processed source files are moved
    #[arg(long = "processeddir")]
    processed_dir: Option<PathBuf>,

    /// Directory where finished encodes go
    #[arg(long = "outdir")]
    out_dir: Option<PathBuf>,

    /// Directory where the file currently being encoded is written
    #[arg(long = "tempdir")]
    temp_dir: Option<PathBuf>,

    /// Skip startup checks (ffmpeg, ffprobe, taskset). For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Defaults, then config file, then environment, then flags
    fn build_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::from_env(),
        };

        if let Some(crf) = self.crf {
            config.encoder.crf = crf;
        }
        if let Some(preset) = self.preset {
            config.encoder.preset = preset;
        }
        if let Some(params) = &self.svtav1_params {
            config.encoder.svtav1_params = params.clone();
        }
        if let Some(height) = self.max_height {
            config.scaling.max_height = height;
        }
        if self.no_max_height {
            config.scaling.cap_height = false;
        }
        if let Some(threads) = self.threads {
            config.cpu.threads = Some(threads);
        }
        if let Some(pattern) = &self.pattern {
            config.paths.pattern = pattern.clone();
        }
        if let Some(dir) = &self.dir {
            config.paths.input_dir = dir.clone();
        }
        if let Some(dir) = &self.processed_dir {
            config.paths.archive_dir = dir.clone();
        }
        if let Some(dir) = &self.out_dir {
            config.paths.output_dir = dir.clone();
        }
        if let Some(dir) = &self.temp_dir {
            config.paths.temp_dir = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match args.build_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.skip_checks {
        warn!("Skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = run_startup_checks(&config) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let plan = AffinityPlan::derive(&config);
    info!(
        "Encoder pinned to CPUs {} ({} of {} logical cores)",
        plan.cpu_list(),
        plan.threads,
        plan.total_cores
    );

    let runner = SystemRunner::new(Interrupts::install());
    let batch = BatchRunner::new(config, plan, runner, RenameMover);

    match batch.run().await {
        Ok(summary) => {
            if summary.abandoned > 0 {
                warn!(
                    "{} file(s) encoded but not moved; check the temp and output directories",
                    summary.abandoned
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) if e.is_interrupted() => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
