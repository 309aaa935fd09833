//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// A value is out of range or the directories overlap
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// SVT-AV1 encoder settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncoderConfig {
    /// Constant rate factor (0-63)
    #[serde(default = "default_crf")]
    pub crf: u32,
    /// Encoder preset (-1-13, lower is slower)
    #[serde(default = "default_preset")]
    pub preset: i32,
    /// Raw `-svtav1-params` string
    #[serde(default = "default_svtav1_params")]
    pub svtav1_params: String,
}

fn default_crf() -> u32 {
    32
}

fn default_preset() -> i32 {
    4
}

fn default_svtav1_params() -> String {
    "keyint=10s:fast-decode=2".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            crf: default_crf(),
            preset: default_preset(),
            svtav1_params: default_svtav1_params(),
        }
    }
}

/// Output height capping.
///
/// `cap_height` both enables the scale filter and embeds the display height
/// in output file names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingConfig {
    /// Maximum output height in pixels
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// Whether the height cap is applied (default true)
    #[serde(default = "default_cap_height")]
    pub cap_height: bool,
}

fn default_max_height() -> u32 {
    1440
}

fn default_cap_height() -> bool {
    true
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            max_height: default_max_height(),
            cap_height: default_cap_height(),
        }
    }
}

/// CPU-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CpuConfig {
    /// Number of logical cores (auto-detected if None)
    pub logical_cores: Option<u32>,
    /// Threads the encoder is pinned to (70% of logical cores if None)
    pub threads: Option<u32>,
}

/// Input pattern and working directories
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Glob pattern matched relative to `input_dir`
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Directory scanned for source videos
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    /// Where processed sources are moved
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    /// Where finished encodes are moved
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Where the encode in progress is written
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

fn default_pattern() -> String {
    "*.mp4".to_string()
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./_processed")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./_out")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./_temp")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            input_dir: default_input_dir(),
            archive_dir: default_archive_dir(),
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}

/// Names (or paths) of the external programs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
    #[serde(default = "default_taskset")]
    pub taskset: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_taskset() -> String {
    "taskset".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            taskset: default_taskset(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub scaling: ScalingConfig,
    #[serde(default)]
    pub cpu: CpuConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - AV1_CRF -> encoder.crf
    /// - AV1_PRESET -> encoder.preset
    /// - AV1_SVTAV1_PARAMS -> encoder.svtav1_params
    /// - AV1_MAX_HEIGHT -> scaling.max_height
    /// - AV1_CAP_HEIGHT -> scaling.cap_height
    /// - AV1_THREADS -> cpu.threads
    /// - AV1_LOGICAL_CORES -> cpu.logical_cores
    ///
    /// Values that fail to parse leave the existing setting untouched.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("AV1_CRF") {
            if let Ok(crf) = val.parse::<u32>() {
                self.encoder.crf = crf;
            }
        }

        if let Ok(val) = env::var("AV1_PRESET") {
            if let Ok(preset) = val.parse::<i32>() {
                self.encoder.preset = preset;
            }
        }

        if let Ok(val) = env::var("AV1_SVTAV1_PARAMS") {
            if !val.is_empty() {
                self.encoder.svtav1_params = val;
            }
        }

        if let Ok(val) = env::var("AV1_MAX_HEIGHT") {
            if let Ok(height) = val.parse::<u32>() {
                self.scaling.max_height = height;
            }
        }

        if let Ok(val) = env::var("AV1_CAP_HEIGHT") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.scaling.cap_height = true,
                "false" | "0" | "no" => self.scaling.cap_height = false,
                _ => {}
            }
        }

        if let Ok(val) = env::var("AV1_THREADS") {
            if let Ok(threads) = val.parse::<u32>() {
                self.cpu.threads = Some(threads);
            }
        }

        if let Ok(val) = env::var("AV1_LOGICAL_CORES") {
            if let Ok(cores) = val.parse::<u32>() {
                self.cpu.logical_cores = Some(cores);
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Check value ranges and that the working directories are distinct.
    ///
    /// Directories are compared after being made absolute, without touching
    /// the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.encoder.crf > 63 {
            return Err(ConfigError::Invalid(format!(
                "crf must be within 0-63, got {}",
                self.encoder.crf
            )));
        }

        if !(-1..=13).contains(&self.encoder.preset) {
            return Err(ConfigError::Invalid(format!(
                "preset must be within -1-13, got {}",
                self.encoder.preset
            )));
        }

        if self.scaling.max_height == 0 {
            return Err(ConfigError::Invalid(
                "max_height must be greater than zero".to_string(),
            ));
        }

        if self.cpu.threads == Some(0) {
            return Err(ConfigError::Invalid(
                "threads must be at least 1".to_string(),
            ));
        }

        if self.paths.pattern.is_empty() {
            return Err(ConfigError::Invalid("pattern must not be empty".to_string()));
        }

        // matched relative to input_dir, so it cannot leave that directory
        let escapes = Path::new(&self.paths.pattern).components().any(|c| {
            matches!(
                c,
                std::path::Component::RootDir
                    | std::path::Component::Prefix(_)
                    | std::path::Component::ParentDir
            )
        });
        if escapes {
            return Err(ConfigError::Invalid(format!(
                "pattern must be relative to the input directory without '..', got '{}'",
                self.paths.pattern
            )));
        }

        let dirs = [
            ("input_dir", &self.paths.input_dir),
            ("archive_dir", &self.paths.archive_dir),
            ("output_dir", &self.paths.output_dir),
            ("temp_dir", &self.paths.temp_dir),
        ];
        let resolved: Vec<PathBuf> = dirs
            .iter()
            .map(|(_, dir)| normalize(dir))
            .collect::<Result<_, _>>()?;

        for i in 0..dirs.len() {
            for j in (i + 1)..dirs.len() {
                if resolved[i] == resolved[j] {
                    return Err(ConfigError::Invalid(format!(
                        "{} and {} must differ, both resolve to {}",
                        dirs[i].0,
                        dirs[j].0,
                        resolved[i].display()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Absolute, lexically normalized form of a directory path
fn normalize(dir: &Path) -> Result<PathBuf, ConfigError> {
    use std::path::Component;

    let absolute = std::path::absolute(dir)?;
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear all config-related env vars
    fn clear_env_vars() {
        env::remove_var("AV1_CRF");
        env::remove_var("AV1_PRESET");
        env::remove_var("AV1_SVTAV1_PARAMS");
        env::remove_var("AV1_MAX_HEIGHT");
        env::remove_var("AV1_CAP_HEIGHT");
        env::remove_var("AV1_THREADS");
        env::remove_var("AV1_LOGICAL_CORES");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_parses_all_sections(
            crf in 0u32..64,
            preset in -1i32..14,
            max_height in 1u32..4321,
            cap_height in proptest::bool::ANY,
            threads in proptest::option::of(1u32..128),
            pattern in "\\*\\.[a-z0-9]{1,4}",
        ) {
            let toml_str = format!(
                r#"
[encoder]
crf = {}
preset = {}
svtav1_params = "tune=0"

[scaling]
max_height = {}
cap_height = {}

[cpu]
{}

[paths]
pattern = "{}"
archive_dir = "/srv/done"
"#,
                crf,
                preset,
                max_height,
                cap_height,
                threads.map(|t| format!("threads = {}", t)).unwrap_or_default(),
                pattern,
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(config.encoder.crf, crf);
            prop_assert_eq!(config.encoder.preset, preset);
            prop_assert_eq!(config.encoder.svtav1_params.as_str(), "tune=0");
            prop_assert_eq!(config.scaling.max_height, max_height);
            prop_assert_eq!(config.scaling.cap_height, cap_height);
            prop_assert_eq!(config.cpu.threads, threads);
            prop_assert_eq!(config.paths.pattern, pattern);
            prop_assert_eq!(config.paths.archive_dir, PathBuf::from("/srv/done"));
            // untouched fields keep their defaults
            prop_assert_eq!(config.paths.output_dir, PathBuf::from("./_out"));
        }

        #[test]
        fn prop_env_overrides_crf_and_preset(
            initial_crf in 0u32..64,
            override_crf in 0u32..64,
            override_preset in -1i32..14,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("[encoder]\ncrf = {}\n", initial_crf);
            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("AV1_CRF", override_crf.to_string());
            env::set_var("AV1_PRESET", override_preset.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.encoder.crf, override_crf);
            prop_assert_eq!(config.encoder.preset, override_preset);
        }

        #[test]
        fn prop_env_overrides_cap_height(
            initial in proptest::bool::ANY,
            override_cap in proptest::bool::ANY,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("[scaling]\ncap_height = {}\n", initial);
            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("AV1_CAP_HEIGHT", override_cap.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.scaling.cap_height, override_cap);
        }

        #[test]
        fn prop_env_overrides_threads(
            initial in proptest::option::of(1u32..64),
            override_threads in 1u32..256,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!(
                "[cpu]\n{}\n",
                initial.map(|t| format!("threads = {}", t)).unwrap_or_default()
            );
            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("AV1_THREADS", override_threads.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.cpu.threads, Some(override_threads));
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_toml("").expect("Empty TOML should parse");

        assert_eq!(config.encoder.crf, 32);
        assert_eq!(config.encoder.preset, 4);
        assert_eq!(config.encoder.svtav1_params, "keyint=10s:fast-decode=2");
        assert_eq!(config.scaling.max_height, 1440);
        assert!(config.scaling.cap_height);
        assert_eq!(config.cpu.logical_cores, None);
        assert_eq!(config.cpu.threads, None);
        assert_eq!(config.paths.pattern, "*.mp4");
        assert_eq!(config.paths.archive_dir, PathBuf::from("./_processed"));
        assert_eq!(config.paths.output_dir, PathBuf::from("./_out"));
        assert_eq!(config.paths.temp_dir, PathBuf::from("./_temp"));
        assert_eq!(config.tools.taskset, "taskset");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_env_value_keeps_existing() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        env::set_var("AV1_CRF", "not-a-number");
        env::set_var("AV1_CAP_HEIGHT", "maybe");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.encoder.crf, 32);
        assert!(config.scaling.cap_height);
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = Config::parse_toml("[encoder\ncrf = 1");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Config::load_from_file("/definitely/not/here/config.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.encoder.crf = 64;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.encoder.preset = 14;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.scaling.max_height = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.cpu.threads = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_patterns_outside_input_dir() {
        for pattern in ["/videos/*.mp4", "../*.mp4", "sub/../../*.mp4"] {
            let mut config = Config::default();
            config.paths.pattern = pattern.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "pattern {} should be rejected",
                pattern
            );
        }

        for pattern in ["*.mp4", "./*.mkv", "season*/*.mp4"] {
            let mut config = Config::default();
            config.paths.pattern = pattern.to_string();
            assert!(config.validate().is_ok(), "pattern {} should be accepted", pattern);
        }
    }

    #[test]
    fn test_validate_rejects_shared_directories() {
        let mut config = Config::default();
        config.paths.temp_dir = PathBuf::from("./_out/");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.paths.archive_dir = PathBuf::from("./sub/..");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
