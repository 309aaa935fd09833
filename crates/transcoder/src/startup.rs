//! Startup checks module
//!
//! Provides preflight checks run before any file is touched:
//! - External tool availability (ffmpeg, ffprobe, taskset)
//! - Creation of the archive, output and temp directories

use crate::config::{Config, PathsConfig};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{0}")]
    ToolUnavailable(String),

    #[error("Failed to create directory {}: {source}", .dir.display())]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Check that `program` starts and exits successfully with `version_arg`
pub fn check_tool_available(program: &str, version_arg: &str) -> Result<(), StartupError> {
    let status = Command::new(program)
        .arg(version_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| {
            StartupError::ToolUnavailable(format!(
                "{} {} failed; is it installed and in PATH? Error: {}",
                program, version_arg, e
            ))
        })?;

    if !status.success() {
        return Err(StartupError::ToolUnavailable(format!(
            "{} {} exited with {}",
            program, version_arg, status
        )));
    }

    debug!("Found {}", program);
    Ok(())
}

/// Run all tool checks in order
///
/// 1. ffmpeg
/// 2. ffprobe
/// 3. taskset
pub fn run_startup_checks(cfg: &Config) -> Result<(), StartupError> {
    check_tool_available(&cfg.tools.ffmpeg, "-version")?;
    check_tool_available(&cfg.tools.ffprobe, "-version")?;
    check_tool_available(&cfg.tools.taskset, "--version")?;
    Ok(())
}

/// Create the archive, output and temp directories (with parents)
pub fn ensure_dirs(paths: &PathsConfig) -> Result<(), StartupError> {
    for dir in [&paths.archive_dir, &paths.output_dir, &paths.temp_dir] {
        fs::create_dir_all(dir).map_err(|source| StartupError::CreateDir {
            dir: dir.clone(),
            source,
        })?;
    }
    Ok(())
}
