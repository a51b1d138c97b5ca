//! Encoder argument vector construction.

use pistreamer_ipc::VideoConfig;

/// Capture backend passed to the encoder's input stage.
pub const DEFAULT_CAPTURE_BACKEND: &str = "v4l2";

/// The software encoder that accepts latency and quality tuning.
const TUNABLE_ENCODER: &str = "libx264";

/// Muxer used for every stream that is not a plain MJPEG pass-through.
pub const MUXER_MPEGTS: &str = "mpegts";

/// Muxer used when MJPEG input is copied straight through.
pub const MUXER_MJPEG: &str = "mjpeg";

/// Select the output muxer for an input format and encoder pair.
pub fn select_muxer(format: &str, encoder: &str) -> &'static str {
    if format == "mjpeg" && encoder == "copy" {
        MUXER_MJPEG
    } else {
        MUXER_MPEGTS
    }
}

/// Build the encoder arguments (program name excluded) for `config`.
///
/// The result depends only on the configuration and the capture backend.
pub fn build_args(config: &VideoConfig, capture_backend: &str) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        capture_backend.to_string(),
        "-input_format".to_string(),
        config.format.clone(),
        "-video_size".to_string(),
        format!("{}x{}", config.width, config.height),
        "-r".to_string(),
        config.framerate.to_string(),
        "-i".to_string(),
        config.device.clone(),
    ];

    args.extend(["-c:v".to_string(), config.encoder.clone()]);
    if config.encoder == TUNABLE_ENCODER {
        args.extend([
            "-preset".to_string(),
            "ultrafast".to_string(),
            "-tune".to_string(),
            "zerolatency".to_string(),
            "-crf".to_string(),
            config.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
        ]);
    }

    args.extend([
        "-f".to_string(),
        select_muxer(&config.format, &config.encoder).to_string(),
        config.address.clone(),
    ]);

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(format: &str, encoder: &str) -> VideoConfig {
        VideoConfig {
            format: format.to_string(),
            encoder: encoder.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_muxer() {
        assert_eq!(select_muxer("mjpeg", "copy"), "mjpeg");
        assert_eq!(select_muxer("mjpeg", "libx264"), "mpegts");
        assert_eq!(select_muxer("yuyv422", "copy"), "mpegts");
        assert_eq!(select_muxer("yuyv422", "libx264"), "mpegts");
        assert_eq!(select_muxer("", ""), "mpegts");
    }

    #[test]
    fn test_build_args_copy_passthrough() {
        let args = build_args(&config("mjpeg", "copy"), DEFAULT_CAPTURE_BACKEND);

        assert_eq!(
            args,
            vec![
                "-f",
                "v4l2",
                "-input_format",
                "mjpeg",
                "-video_size",
                "1920x1080",
                "-r",
                "60",
                "-i",
                "/dev/video0",
                "-c:v",
                "copy",
                "-f",
                "mjpeg",
                "udp://127.0.0.1:5000",
            ]
        );
    }

    #[test]
    fn test_build_args_tunable_encoder() {
        let mut config = config("yuyv422", "libx264");
        config.crf = 23;
        config.width = 1280;
        config.height = 720;
        config.framerate = 30;

        let args = build_args(&config, DEFAULT_CAPTURE_BACKEND);

        assert_eq!(
            args,
            vec![
                "-f",
                "v4l2",
                "-input_format",
                "yuyv422",
                "-video_size",
                "1280x720",
                "-r",
                "30",
                "-i",
                "/dev/video0",
                "-c:v",
                "libx264",
                "-preset",
                "ultrafast",
                "-tune",
                "zerolatency",
                "-crf",
                "23",
                "-pix_fmt",
                "yuv420p",
                "-f",
                "mpegts",
                "udp://127.0.0.1:5000",
            ]
        );
    }

    #[test]
    fn test_build_args_is_deterministic() {
        let config = config("yuyv422", "libx264");
        assert_eq!(build_args(&config, "v4l2"), build_args(&config, "v4l2"));
    }

    #[test]
    fn test_non_tunable_encoder_gets_no_quality_flags() {
        let args = build_args(&config("yuyv422", "h264_v4l2m2m"), "v4l2");
        assert!(!args.iter().any(|a| a == "-crf" || a == "-preset"));
    }
}
