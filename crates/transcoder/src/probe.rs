//! Resolution probing via ffprobe.
//!
//! Asks ffprobe for the width and height of the first video stream as bare
//! numeric lines and parses them into a [`Resolution`].

use crate::config::ToolsConfig;
use crate::process::{CommandSpec, ProcessRunner};
use std::path::Path;
use thiserror::Error;

/// Sentinel for a dimension that could not be determined.
pub const UNKNOWN: i64 = -1;

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// ffprobe exited with non-zero status.
    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    /// ffprobe could not be started.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Width and height of a video stream; either may be [`UNKNOWN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: i64,
    pub height: i64,
}

impl Resolution {
    pub const UNKNOWN: Resolution = Resolution {
        width: UNKNOWN,
        height: UNKNOWN,
    };

    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }

    /// Height, if it was determined.
    pub fn known_height(&self) -> Option<i64> {
        (self.height >= 0).then_some(self.height)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Builds the ffprobe invocation for the first video stream of `path`.
pub fn build_probe_command(tools: &ToolsConfig, path: &Path) -> CommandSpec {
    let mut spec = CommandSpec::new(&tools.ffprobe);
    spec.arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height")
        .arg("-of")
        .arg("default=noprint_wrappers=1:nokey=1")
        .arg(path);
    spec
}

/// Parses ffprobe's bare numeric output.
///
/// Empty lines are skipped; a line that is not an integer becomes [`UNKNOWN`].
/// The first value is the width, the second the height.
pub fn parse_probe_output(output: &str) -> Resolution {
    let mut values = output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.trim().parse::<i64>().unwrap_or(UNKNOWN));

    let width = values.next().unwrap_or(UNKNOWN);
    let height = values.next().unwrap_or(UNKNOWN);

    Resolution { width, height }
}

/// Probes the resolution of the first video stream. No retries.
///
/// # Errors
/// Returns an error if ffprobe cannot be started or exits with non-zero
/// status; callers treat that as an `(unknown, unknown)` resolution.
pub async fn probe_resolution<R: ProcessRunner>(
    runner: &R,
    tools: &ToolsConfig,
    path: &Path,
) -> Result<Resolution, ProbeError> {
    let spec = build_probe_command(tools, path);
    let output = runner.capture(&spec).await?;

    if !output.success {
        return Err(ProbeError::FfprobeFailed(output.stderr.trim().to_string()));
    }

    Ok(parse_probe_output(&output.stdout))
}
