//! Encoding modules for the AV1 batch transcoder

pub mod svt_av1;

pub use svt_av1::{build_transcode_command, run_encode, scale_filter, PIXEL_FORMAT, VIDEO_CODEC};
