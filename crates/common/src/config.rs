//! Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default export parameters.
    pub export: ExportDefaults,

    /// Settle and shutdown delays used by the exporter.
    pub timing: TimingConfig,

    /// Frame capture tuning.
    pub capture: CaptureConfig,

    /// Encoder discovery.
    pub encoder: EncoderConfig,

    /// Scratch storage location.
    pub scratch: ScratchConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Output video path.
    pub output_path: PathBuf,

    /// Output frame rate.
    pub frame_rate: u32,

    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,
}

/// Delays applied around keyframe loads and encoder shutdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Delay between session start and the first keyframe load.
    pub start_delay_ms: u64,

    /// Delay between a keyframe load request and sampling the surface.
    pub render_settle_ms: u64,

    /// Delay after hiding UI overlays before sampling.
    pub overlay_settle_ms: u64,

    /// Delay between a finished capture and the next keyframe load.
    pub inter_frame_ms: u64,

    /// How long a terminated encoder may take to exit before it is killed.
    pub kill_grace_ms: u64,

    /// Upper bound on a whole encoder run. `None` waits indefinitely.
    pub encode_timeout_secs: Option<u64>,
}

/// Frame capture tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Smallest usable capture region (pixels) in either dimension.
    pub min_region_px: u32,

    /// Rows excluded at the top and bottom of the window when the surface
    /// bounds cannot be trusted.
    pub fallback_margin_px: u32,

    /// Resampling filter used to scale captures to the output resolution.
    pub filter: ResampleFilter,
}

/// Resampling filters available for output scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

/// Encoder discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Explicit encoder path, tried before any other location.
    pub path: Option<PathBuf>,

    /// Executable file name looked up next to the application.
    pub executable_name: String,

    /// Last-resort fixed location.
    pub fallback_path: PathBuf,
}

/// Scratch storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Parent directory for scratch directories (system temp dir if unset).
    pub root: Option<PathBuf>,

    /// Scratch directory name prefix.
    pub prefix: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "keyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            frame_rate: 24,
            width: 1920,
            height: 1080,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 100,
            render_settle_ms: 200,
            overlay_settle_ms: 50,
            inter_frame_ms: 100,
            kill_grace_ms: 3000,
            encode_timeout_secs: None,
        }
    }
}

impl TimingConfig {
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }

    pub fn overlay_settle(&self) -> Duration {
        Duration::from_millis(self.overlay_settle_ms)
    }

    pub fn inter_frame(&self) -> Duration {
        Duration::from_millis(self.inter_frame_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn encode_timeout(&self) -> Option<Duration> {
        self.encode_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            min_region_px: 50,
            fallback_margin_px: 60,
            filter: ResampleFilter::default(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            path: None,
            executable_name: default_encoder_name().to_string(),
            fallback_path: default_encoder_fallback(),
        }
    }
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            root: None,
            prefix: "keyreel".to_string(),
        }
    }
}

impl ScratchConfig {
    /// Directory scratch directories are created under.
    pub fn root_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("keyreel").join("config.json")
}

/// Default export location: the platform movies directory, else home.
fn default_output_path() -> PathBuf {
    dirs_next::video_dir()
        .or_else(dirs_next::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("animation.mp4")
}

fn default_encoder_name() -> &'static str {
    if cfg!(windows) {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

fn default_encoder_fallback() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\ffmpeg\bin\ffmpeg.exe")
    } else {
        PathBuf::from("/usr/bin/ffmpeg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "export": { "frame_rate": 30 }, "capture": { "filter": "catmull_rom" } }"#)
                .unwrap();
        assert_eq!(config.export.frame_rate, 30);
        assert_eq!(config.export.width, 1920);
        assert_eq!(config.capture.filter, ResampleFilter::CatmullRom);
        assert_eq!(config.capture.fallback_margin_px, 60);
        assert_eq!(config.timing.render_settle_ms, 200);
        assert!(config.export.output_path.ends_with("animation.mp4"));
    }

    #[test]
    fn save_and_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.timing.inter_frame_ms = 5;
        config.scratch.prefix = "reel-test".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.timing.inter_frame_ms, 5);
        assert_eq!(loaded.scratch.prefix, "reel-test");
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.export.frame_rate, 24);
    }

    #[test]
    fn timing_durations() {
        let timing = TimingConfig::default();
        assert_eq!(timing.render_settle(), Duration::from_millis(200));
        assert_eq!(timing.inter_frame(), Duration::from_millis(100));
        assert_eq!(timing.encode_timeout(), None);
    }
}
