//! Configuration module for the AV1 batch transcoder
//!
//! Handles loading configuration from TOML files, environment variable overrides
//! and validation of the resulting record.

pub mod config;

pub use config::*;
