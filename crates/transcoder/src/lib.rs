//! AV1 batch transcoder
//!
//! Discovers source videos, encodes each one with a CPU-pinned ffmpeg/SVT-AV1
//! child process and moves the results through temp, output and archive
//! directories.

pub mod affinity;
pub mod batch;
pub mod encode;
pub mod naming;
pub mod probe;
pub mod process;
pub mod relocate;
pub mod scan;
pub mod startup;

pub use affinity::AffinityPlan;
pub use av1_batch_config as config;
pub use av1_batch_config::Config;
pub use batch::{BatchError, BatchRunner, FileOutcome, RunSummary};
pub use encode::{build_transcode_command, run_encode};
pub use naming::{decide_display_height, output_file_name, HeightDecision, TranscodeJob};
pub use probe::{parse_probe_output, probe_resolution, ProbeError, Resolution};
pub use process::{
    CapturedOutput, CommandSpec, Interrupts, ProcessRunner, SuperviseError, SystemRunner,
};
pub use relocate::{finalize, FileMover, RelocateError, RenameMover};
pub use scan::{discover_candidates, sort_candidates, Candidate, ScanError};
pub use startup::{check_tool_available, ensure_dirs, run_startup_checks, StartupError};
