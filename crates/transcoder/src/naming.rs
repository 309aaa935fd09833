//! Output naming and per-file job planning.
//!
//! The display height is decided once per file from the probe outcome and the
//! scaling configuration. It is embedded in the output name only when height
//! capping is enabled.

use crate::config::{PathsConfig, ScalingConfig};
use crate::probe::{ProbeError, Resolution, UNKNOWN};
use crate::scan::Candidate;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Fixed tail of every output file name.
pub const OUTPUT_SUFFIX: &str = " [AV1 10bit].mkv";

/// Result of the display height policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightDecision {
    /// Height used for labeling; [`UNKNOWN`] when nothing better exists.
    pub height: i64,
    /// The probe gave no usable height.
    pub used_unknown: bool,
}

/// Decides the display height for one file.
///
/// | probe height | cap enabled | display height          |
/// |--------------|-------------|-------------------------|
/// | known        | yes         | min(cap, probed height) |
/// | known        | no          | probed height           |
/// | unknown      | yes         | cap                     |
/// | unknown      | no          | unknown                 |
///
/// A probe that succeeded but printed no parseable height counts as unknown.
pub fn decide_display_height(
    probe: &Result<Resolution, ProbeError>,
    scaling: &ScalingConfig,
) -> HeightDecision {
    let probed = probe.as_ref().ok().and_then(Resolution::known_height);
    let cap = i64::from(scaling.max_height);

    match (probed, scaling.cap_height) {
        (Some(h), true) => HeightDecision {
            height: cap.min(h),
            used_unknown: false,
        },
        (Some(h), false) => HeightDecision {
            height: h,
            used_unknown: false,
        },
        (None, true) => HeightDecision {
            height: cap,
            used_unknown: true,
        },
        (None, false) => HeightDecision {
            height: UNKNOWN,
            used_unknown: true,
        },
    }
}

/// Output file name for `source`.
///
/// `<stem> (<height>p) [AV1 10bit].mkv` with capping, `<stem> [AV1 10bit].mkv`
/// without.
pub fn output_file_name(source: &Path, decision: HeightDecision, cap_height: bool) -> OsString {
    let mut name = source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_default();

    if cap_height {
        name.push(format!(" ({}p)", decision.height));
    }
    name.push(OUTPUT_SUFFIX);

    name
}

/// Everything needed to encode one candidate and move the results.
///
/// The temp, output and archive paths live in the three working directories,
/// which are validated to be distinct from each other and from the input
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    /// Absolute path of the source video
    pub source: PathBuf,
    /// Where the encoder writes
    pub temp_path: PathBuf,
    /// Final location of the encode
    pub output_path: PathBuf,
    /// Where the source is moved once the encode is in place
    pub archive_path: PathBuf,
    /// Height used in the output name
    pub display_height: i64,
}

impl TranscodeJob {
    /// Plan the paths for one candidate.
    ///
    /// Returns `None` when the candidate path has no file name.
    pub fn plan(
        candidate: &Candidate,
        paths: &PathsConfig,
        decision: HeightDecision,
        cap_height: bool,
    ) -> Option<Self> {
        let source_name = candidate.path.file_name()?;
        let output_name = output_file_name(&candidate.path, decision, cap_height);

        Some(Self {
            source: candidate.path.clone(),
            temp_path: paths.temp_dir.join(&output_name),
            output_path: paths.output_dir.join(&output_name),
            archive_path: paths.archive_dir.join(source_name),
            display_height: decision.height,
        })
    }
}
