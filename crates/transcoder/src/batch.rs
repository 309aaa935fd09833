//! Batch orchestration
//!
//! Processes every discovered source, one at a time, oldest first:
//! probe -> decide display height -> encode into temp -> move to output ->
//! archive source. Encode failures end the run; relocation failures only
//! abandon the current file. An interrupt seen at any point ends the run
//! before the next file starts and suppresses the completion banner.

use crate::affinity::AffinityPlan;
use crate::config::Config;
use crate::encode::run_encode;
use crate::naming::{decide_display_height, TranscodeJob};
use crate::probe::probe_resolution;
use crate::process::{ProcessRunner, SuperviseError};
use crate::relocate::{finalize, FileMover};
use crate::scan::{discover_candidates, Candidate, ScanError};
use crate::startup::{ensure_dirs, StartupError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for a batch run. Every variant is fatal.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Working directories could not be created
    #[error("Startup failed: {0}")]
    Startup(#[from] StartupError),

    /// Input discovery failed
    #[error("{0}")]
    Scan(#[from] ScanError),

    /// Encoding a file failed or was interrupted
    #[error("Encoding {} failed: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: SuperviseError,
    },

    /// SIGINT/SIGTERM arrived between encodes
    #[error("Interrupted")]
    Interrupted,
}

impl BatchError {
    /// The run ended because of SIGINT/SIGTERM
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            BatchError::Interrupted
                | BatchError::Encode {
                    source: SuperviseError::Interrupted,
                    ..
                }
        )
    }
}

/// How a single file's pipeline resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Encoded, published and archived
    Completed,
    /// Encoded, but a later move failed; files left for manual reconciliation
    Abandoned,
}

/// Counts for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub abandoned: usize,
}

/// Sequential batch transcoder
pub struct BatchRunner<R, M> {
    config: Config,
    plan: AffinityPlan,
    runner: R,
    mover: M,
}

impl<R: ProcessRunner, M: FileMover> BatchRunner<R, M> {
    pub fn new(config: Config, plan: AffinityPlan, runner: R, mover: M) -> Self {
        Self {
            config,
            plan,
            runner,
            mover,
        }
    }

    /// Run the whole batch
    ///
    /// 1. Create archive, output and temp directories
    /// 2. Discover candidates, oldest first
    /// 3. Process each candidate to completion before starting the next
    /// 4. Print the completion banner
    ///
    /// The interrupt flag is checked before every file and before the banner.
    pub async fn run(&self) -> Result<RunSummary, BatchError> {
        let paths = &self.config.paths;

        ensure_dirs(paths)?;

        let candidates = discover_candidates(&paths.input_dir, &paths.pattern)?;
        info!(
            "Found {} file(s) matching '{}' in {}",
            candidates.len(),
            paths.pattern,
            paths.input_dir.display()
        );

        let mut summary = RunSummary::default();
        for candidate in &candidates {
            self.check_interrupted()?;
            match self.process_file(candidate).await? {
                FileOutcome::Completed => summary.completed += 1,
                FileOutcome::Abandoned => summary.abandoned += 1,
            }
        }
        self.check_interrupted()?;

        println!("\n[AV1] Done!");

        Ok(summary)
    }

    fn check_interrupted(&self) -> Result<(), BatchError> {
        if self.runner.is_interrupted() {
            return Err(BatchError::Interrupted);
        }
        Ok(())
    }

    /// Run the full pipeline for one candidate
    pub async fn process_file(&self, candidate: &Candidate) -> Result<FileOutcome, BatchError> {
        let probe = probe_resolution(&self.runner, &self.config.tools, &candidate.path).await;
        match &probe {
            Ok(resolution) => debug!("{}: {}", candidate.path.display(), resolution),
            Err(e) => warn!("Probe failed for {}: {}", candidate.path.display(), e),
        }

        let decision = decide_display_height(&probe, &self.config.scaling);
        let Some(job) = TranscodeJob::plan(
            candidate,
            &self.config.paths,
            decision,
            self.config.scaling.cap_height,
        ) else {
            warn!("Skipping {}: no file name", candidate.path.display());
            return Ok(FileOutcome::Abandoned);
        };

        info!(
            "Encoding {} -> {}",
            job.source.display(),
            job.temp_path.display()
        );

        run_encode(
            &self.runner,
            &self.config,
            &self.plan,
            &job.source,
            &job.temp_path,
        )
        .await
        .map_err(|source| BatchError::Encode {
            path: job.source.clone(),
            source,
        })?;

        match finalize(&job, &self.mover) {
            Ok(()) => {
                info!("Finished {}", job.output_path.display());
                Ok(FileOutcome::Completed)
            }
            Err(e) => {
                warn!("Abandoning {}: {}", job.source.display(), e);
                Ok(FileOutcome::Abandoned)
            }
        }
    }
}
