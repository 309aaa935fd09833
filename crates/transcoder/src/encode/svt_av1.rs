//! SVT-AV1 encoder module
//!
//! Builds the CPU-pinned ffmpeg/libsvtav1 invocation for one source file and
//! runs it attached to the terminal.

use crate::affinity::AffinityPlan;
use crate::config::Config;
use crate::process::{CommandSpec, ProcessRunner, SuperviseError};
use std::path::Path;

/// ffmpeg video encoder
pub const VIDEO_CODEC: &str = "libsvtav1";

/// 10-bit 4:2:0 output
pub const PIXEL_FORMAT: &str = "yuv420p10le";

/// Scale filter limiting output height to `min(cap, input height)`.
///
/// Width is derived from the aspect ratio.
pub fn scale_filter(max_height: u32) -> String {
    format!("scale=-1:'min({},ih)'", max_height)
}

/// Build the transcode command for one file
///
/// Creates a command configured with:
/// - `taskset -c 0-{threads-1}` wrapping ffmpeg
/// - First video stream, audio streams and (optional) subtitle streams mapped
/// - Height-capping scale filter when enabled
/// - libsvtav1 with the configured params, preset and CRF, 10-bit output
/// - Audio and subtitles copied
/// - `output` as the final positional argument
///
/// Pure: identical inputs give identical commands.
pub fn build_transcode_command(
    cfg: &Config,
    plan: &AffinityPlan,
    input: &Path,
    output: &Path,
) -> CommandSpec {
    let mut cmd = CommandSpec::new(&cfg.tools.taskset);

    cmd.arg("-c").arg(plan.cpu_list());
    cmd.arg(&cfg.tools.ffmpeg);

    cmd.arg("-y");
    cmd.arg("-i").arg(input);

    // `?` keeps ffmpeg from failing on sources without subtitles
    cmd.arg("-map").arg("0:v");
    cmd.arg("-map").arg("0:a");
    cmd.arg("-map").arg("0:s?");

    if cfg.scaling.cap_height {
        cmd.arg("-vf").arg(scale_filter(cfg.scaling.max_height));
    }

    cmd.arg("-c:v").arg(VIDEO_CODEC);
    cmd.arg("-svtav1-params").arg(&cfg.encoder.svtav1_params);
    cmd.arg("-preset").arg(cfg.encoder.preset.to_string());
    cmd.arg("-crf").arg(cfg.encoder.crf.to_string());
    cmd.arg("-pix_fmt").arg(PIXEL_FORMAT);

    cmd.arg("-c:a").arg("copy");
    cmd.arg("-c:s").arg("copy");

    cmd.arg(output);

    cmd
}

/// Encode `input` into `output`, blocking until the encoder exits
///
/// # Errors
/// Returns an error if:
/// - The encoder fails to start
/// - The encoder exits with non-zero status or is killed
/// - The run is interrupted
pub async fn run_encode<R: ProcessRunner>(
    runner: &R,
    cfg: &Config,
    plan: &AffinityPlan,
    input: &Path,
    output: &Path,
) -> Result<(), SuperviseError> {
    let cmd = build_transcode_command(cfg, plan, input, output);
    runner.run_attached(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    /// Helper to check if args contain a flag with a specific value
    fn has_flag_with_value(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9_/. -]{1,50}")
            .unwrap()
            .prop_filter("non-empty path", |s| !s.is_empty())
    }

    fn plan(threads: u32) -> AffinityPlan {
        AffinityPlan {
            total_cores: threads.max(1),
            threads,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_transcode_command_completeness(
            input in path_strategy(),
            output in path_strategy(),
            threads in 1u32..128,
            crf in 0u32..64,
            preset in -1i32..14,
            max_height in 144u32..4321,
            cap_height in proptest::bool::ANY,
            params in "[a-z0-9=:-]{0,30}",
        ) {
            let mut cfg = Config::default();
            cfg.encoder.crf = crf;
            cfg.encoder.preset = preset;
            cfg.encoder.svtav1_params = params.clone();
            cfg.scaling.max_height = max_height;
            cfg.scaling.cap_height = cap_height;

            let cmd = build_transcode_command(
                &cfg,
                &plan(threads),
                Path::new(&input),
                Path::new(&output),
            );
            let args = cmd.args_lossy();

            prop_assert_eq!(cmd.program_lossy(), "taskset");
            prop_assert_eq!(&args[0], "-c");
            prop_assert_eq!(&args[1], &format!("0-{}", threads - 1));
            prop_assert_eq!(&args[2], "ffmpeg");

            prop_assert!(has_flag_with_value(&args, "-i", &input));
            prop_assert!(has_flag_with_value(&args, "-map", "0:v"));
            prop_assert!(has_flag_with_value(&args, "-map", "0:a"));
            prop_assert!(has_flag_with_value(&args, "-map", "0:s?"));
            prop_assert!(!args.iter().any(|a| a == "0:s"), "subtitle map must be optional");

            prop_assert_eq!(
                has_flag_with_value(&args, "-vf", &scale_filter(max_height)),
                cap_height
            );
            prop_assert_eq!(args.iter().any(|a| a == "-vf"), cap_height);

            prop_assert!(has_flag_with_value(&args, "-c:v", "libsvtav1"));
            prop_assert!(has_flag_with_value(&args, "-svtav1-params", &params));
            prop_assert!(has_flag_with_value(&args, "-preset", &preset.to_string()));
            prop_assert!(has_flag_with_value(&args, "-crf", &crf.to_string()));
            prop_assert!(has_flag_with_value(&args, "-pix_fmt", "yuv420p10le"));
            prop_assert!(has_flag_with_value(&args, "-c:a", "copy"));
            prop_assert!(has_flag_with_value(&args, "-c:s", "copy"));

            prop_assert_eq!(args.last(), Some(&output));
        }

        #[test]
        fn prop_transcode_command_is_deterministic(
            input in path_strategy(),
            output in path_strategy(),
            threads in 1u32..128,
            cap_height in proptest::bool::ANY,
        ) {
            let mut cfg = Config::default();
            cfg.scaling.cap_height = cap_height;
            let plan = plan(threads);

            let first = build_transcode_command(&cfg, &plan, Path::new(&input), Path::new(&output));
            let second = build_transcode_command(&cfg, &plan, Path::new(&input), Path::new(&output));

            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn test_default_command_matches_reference_invocation() {
        let cfg = Config::default();
        let cmd = build_transcode_command(
            &cfg,
            &plan(8),
            &PathBuf::from("/in/a.mp4"),
            &PathBuf::from("_temp/a (1080p) [AV1 10bit].mkv"),
        );

        assert_eq!(
            cmd.args_lossy(),
            vec![
                "-c", "0-7", "ffmpeg", "-y", "-i", "/in/a.mp4",
                "-map", "0:v", "-map", "0:a", "-map", "0:s?",
                "-vf", "scale=-1:'min(1440,ih)'",
                "-c:v", "libsvtav1", "-svtav1-params", "keyint=10s:fast-decode=2",
                "-preset", "4", "-crf", "32", "-pix_fmt", "yuv420p10le",
                "-c:a", "copy", "-c:s", "copy",
                "_temp/a (1080p) [AV1 10bit].mkv",
            ]
        );
    }

    #[test]
    fn test_custom_tool_names() {
        let mut cfg = Config::default();
        cfg.tools.taskset = "/usr/bin/taskset".to_string();
        cfg.tools.ffmpeg = "/opt/ffmpeg/bin/ffmpeg".to_string();

        let cmd = build_transcode_command(&cfg, &plan(2), Path::new("a.mp4"), Path::new("b.mkv"));

        assert_eq!(cmd.program_lossy(), "/usr/bin/taskset");
        assert_eq!(cmd.args_lossy()[2], "/opt/ffmpeg/bin/ffmpeg");
    }
}
