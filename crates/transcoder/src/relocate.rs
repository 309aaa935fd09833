//! Relocation of finished encodes and their sources.
//!
//! After a successful encode the temp file is moved into the output directory,
//! then the source is moved into the archive directory. Each step is a plain
//! rename; a failed step abandons the rest and leaves every file where it is.

use crate::naming::TranscodeJob;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while relocating a job's files.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// Failed to move the encode out of the temp directory.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    PublishFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to move the source into the archive directory.
    #[error("Failed to archive {} to {}: {source}", .from.display(), .to.display())]
    ArchiveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Storage operation used to relocate files.
pub trait FileMover {
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Moves with `std::fs::rename`.
///
/// Atomic only within one filesystem; across filesystems the rename fails and
/// the job is abandoned rather than falling back to a copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenameMover;

impl FileMover for RenameMover {
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }
}

/// Moves the encode into place and archives the source.
///
/// Steps, strictly in order:
/// 1. `temp_path` -> `output_path`
/// 2. `source` -> `archive_path`
///
/// If step 1 fails, step 2 is never attempted. Nothing is deleted on failure.
pub fn finalize<M: FileMover>(job: &TranscodeJob, mover: &M) -> Result<(), RelocateError> {
    mover
        .move_file(&job.temp_path, &job.output_path)
        .map_err(|source| RelocateError::PublishFailed {
            from: job.temp_path.clone(),
            to: job.output_path.clone(),
            source,
        })?;

    mover
        .move_file(&job.source, &job.archive_path)
        .map_err(|source| RelocateError::ArchiveFailed {
            from: job.source.clone(),
            to: job.archive_path.clone(),
            source,
        })?;

    Ok(())
}
