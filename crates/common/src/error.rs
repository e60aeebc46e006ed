//! Error types shared across KeyReel crates.

use std::path::PathBuf;

/// Top-level error type for KeyReel operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelError {
    #[error("An export is already in progress")]
    AlreadyExporting,

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("No keyframes found: {message}")]
    NoKeyframes { message: String },

    #[error("Encoder executable not found (searched: {})", join_paths(.searched))]
    EncoderUnavailable { searched: Vec<PathBuf> },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Scratch storage error: {message}")]
    Storage { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelError.
pub type ReelResult<T> = Result<T, ReelError>;

impl ReelError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn no_keyframes(msg: impl Into<String>) -> Self {
        Self::NoKeyframes {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage {
            message: msg.into(),
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<none>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_unavailable_lists_candidates() {
        let err = ReelError::EncoderUnavailable {
            searched: vec![PathBuf::from("/opt/app/ffmpeg"), PathBuf::from("/opt/ffmpeg")],
        };
        assert_eq!(
            err.to_string(),
            "Encoder executable not found (searched: /opt/app/ffmpeg, /opt/ffmpeg)"
        );
    }

    #[test]
    fn helper_constructors_format_messages() {
        assert_eq!(
            ReelError::no_keyframes("empty timeline").to_string(),
            "No keyframes found: empty timeline"
        );
        assert_eq!(
            ReelError::storage("disk full").to_string(),
            "Scratch storage error: disk full"
        );
    }
}
