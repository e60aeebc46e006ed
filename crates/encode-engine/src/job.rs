//! Encoder invocation for a numbered frame sequence.

use std::path::PathBuf;

/// Output video codec.
pub const VIDEO_CODEC: &str = "libx264";

/// Output pixel format.
pub const PIXEL_FORMAT: &str = "yuv420p";

/// x264 speed/size preset.
pub const PRESET: &str = "medium";

/// Constant rate factor.
pub const CRF: u8 = 18;

/// One encoder run over a captured frame sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    /// Located encoder executable.
    pub encoder: PathBuf,
    /// Counting pattern over the frames (`<dir>/%06d.png`).
    pub input_pattern: PathBuf,
    pub frame_rate: u32,
    pub output_path: PathBuf,
}

impl EncodeJob {
    pub fn new(
        encoder: impl Into<PathBuf>,
        input_pattern: impl Into<PathBuf>,
        frame_rate: u32,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            encoder: encoder.into(),
            input_pattern: input_pattern.into(),
            frame_rate,
            output_path: output_path.into(),
        }
    }

    /// Encoder arguments.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-framerate".to_string(),
            self.frame_rate.to_string(),
            "-i".to_string(),
            self.input_pattern.to_string_lossy().to_string(),
            "-c:v".to_string(),
            VIDEO_CODEC.to_string(),
            "-pix_fmt".to_string(),
            PIXEL_FORMAT.to_string(),
            "-preset".to_string(),
            PRESET.to_string(),
            "-crf".to_string(),
            CRF.to_string(),
            self.output_path.to_string_lossy().to_string(),
        ]
    }

    /// Printable command line, for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.encoder.to_string_lossy().to_string();
        for arg in self.args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_template() {
        let job = EncodeJob::new(
            "/usr/bin/ffmpeg",
            "/tmp/keyreel-1/%06d.png",
            30,
            "/videos/out.mp4",
        );

        assert_eq!(
            job.args(),
            vec![
                "-y",
                "-framerate",
                "30",
                "-i",
                "/tmp/keyreel-1/%06d.png",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-preset",
                "medium",
                "-crf",
                "18",
                "/videos/out.mp4",
            ]
        );
    }

    #[test]
    fn test_output_path_is_last() {
        let job = EncodeJob::new("ffmpeg", "in/%06d.png", 24, "a b/c.mp4");
        assert_eq!(job.args().last().map(String::as_str), Some("a b/c.mp4"));
        assert!(job.command_line().starts_with("ffmpeg -y -framerate 24"));
    }
}
