//! User-adjustable export settings.

use std::path::PathBuf;

/// Frame rates below this are rejected.
pub const MIN_FRAME_RATE: u32 = 2;

/// Output path and frame rate used by the next export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    pub export_path: PathBuf,
    pub frame_rate: u32,
}

impl ExportSettings {
    /// Set the output path from user input, which may be a `file://` URL.
    pub fn set_export_path(&mut self, raw: &str) {
        self.export_path = normalize_export_path(raw);
    }

    /// Returns `false` and keeps the current rate when `rate` is too low.
    pub fn set_frame_rate(&mut self, rate: u32) -> bool {
        if rate < MIN_FRAME_RATE {
            return false;
        }
        self.frame_rate = rate;
        true
    }
}

/// Turn a path or `file://` URL into a native filesystem path.
///
/// `file:///C:/videos/a.mp4` and `/C:/videos/a.mp4` both become
/// `C:/videos/a.mp4` (with native separators); `file:///home/a.mp4` keeps its
/// leading slash.
pub fn normalize_export_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let path = trimmed.strip_prefix("file://").unwrap_or(trimmed);

    let path = match path.strip_prefix('/') {
        Some(rest) if has_drive_prefix(rest) => rest,
        _ => path,
    };

    if cfg!(windows) {
        PathBuf::from(path.replace('/', "\\"))
    } else {
        PathBuf::from(path)
    }
}

fn has_drive_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
