//! Notifications emitted by the exporter.

use std::path::PathBuf;

use keyreel_encode_engine::LaunchFailureKind;
use keyreel_scene_core::KeyframeId;
use serde::Serialize;

use crate::session::ExportState;

/// Message reported when the user stops an export.
pub const CANCELLED_MESSAGE: &str = "Export was cancelled by user";

/// Change notifications, delivered to every subscriber in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ExportEvent {
    StateChanged(ExportState),
    ExportingChanged(bool),
    TotalFramesChanged(usize),
    CurrentFrameChanged(usize),
    StatusChanged(String),
    Progress(ExportProgress),
    /// Exactly one per session, after cleanup.
    Finished(ExportOutcome),
}

/// Emitted before each frame is captured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportProgress {
    /// 1-based number of the frame about to be captured.
    pub frame: usize,
    pub total: usize,
    pub keyframe: KeyframeId,
    pub status: String,
    /// Estimated seconds until all frames are captured.
    pub eta_secs: Option<f64>,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExportOutcome {
    Completed {
        output_path: PathBuf,
        frames: usize,
        elapsed_secs: f64,
    },
    Failed {
        message: String,
        detail: FailureDetail,
    },
    Cancelled {
        frames_captured: usize,
    },
}

impl ExportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Terminal state this outcome leaves the exporter in.
    pub fn state(&self) -> ExportState {
        match self {
            Self::Completed { .. } => ExportState::Completed,
            Self::Failed { .. } => ExportState::Failed,
            Self::Cancelled { .. } => ExportState::Cancelled,
        }
    }

    /// Display-ready description.
    pub fn message(&self) -> String {
        match self {
            Self::Completed { output_path, .. } => {
                format!("Animation exported to: {}", output_path.display())
            }
            Self::Failed { message, .. } => message.clone(),
            Self::Cancelled { .. } => CANCELLED_MESSAGE.to_string(),
        }
    }

    /// Short status line shown once the session has ended.
    pub fn status(&self) -> String {
        match self {
            Self::Completed { .. } => "Export completed successfully!".to_string(),
            Self::Cancelled { .. } => "Export cancelled".to_string(),
            Self::Failed { detail, .. } => match detail {
                FailureDetail::Capture { keyframe, .. } => {
                    format!("Error: Failed to capture frame {keyframe}")
                }
                FailureDetail::Encoder { .. } => "Error: FFmpeg failed".to_string(),
                FailureDetail::Launch { kind, .. } => format!("Error: {kind}"),
                FailureDetail::Storage { .. } => "Error: Scratch storage failed".to_string(),
            },
        }
    }
}

/// Structured cause of a failed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureDetail {
    Capture {
        sequence: usize,
        keyframe: KeyframeId,
        reason: String,
    },
    Encoder {
        exit_code: i32,
        diagnostics: String,
    },
    Launch {
        kind: LaunchFailureKind,
        reason: String,
    },
    Storage {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_states_and_messages() {
        let done = ExportOutcome::Completed {
            output_path: PathBuf::from("/v/a.mp4"),
            frames: 3,
            elapsed_secs: 1.5,
        };
        assert!(done.is_success());
        assert_eq!(done.state(), ExportState::Completed);
        assert_eq!(done.message(), "Animation exported to: /v/a.mp4");

        let cancelled = ExportOutcome::Cancelled { frames_captured: 1 };
        assert_eq!(cancelled.state(), ExportState::Cancelled);
        assert_eq!(cancelled.message(), "Export was cancelled by user");
        assert_eq!(cancelled.status(), "Export cancelled");
    }

    #[test]
    fn test_failure_status_follows_detail() {
        let failed = ExportOutcome::Failed {
            message: "FFmpeg failed with exit code 1\nboom".to_string(),
            detail: FailureDetail::Encoder {
                exit_code: 1,
                diagnostics: "boom".to_string(),
            },
        };
        assert_eq!(failed.state(), ExportState::Failed);
        assert_eq!(failed.status(), "Error: FFmpeg failed");

        let launch = ExportOutcome::Failed {
            message: "FFmpeg process crashed".to_string(),
            detail: FailureDetail::Launch {
                kind: LaunchFailureKind::Crashed,
                reason: "signal 9".to_string(),
            },
        };
        assert_eq!(launch.status(), "Error: FFmpeg process crashed");
    }

    #[test]
    fn test_event_serializes_tagged() {
        let json = serde_json::to_string(&ExportEvent::CurrentFrameChanged(2)).unwrap();
        assert_eq!(json, r#"{"event":"current_frame_changed","data":2}"#);

        let detail = FailureDetail::Launch {
            kind: LaunchFailureKind::TimedOut,
            reason: "limit".to_string(),
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["type"], "launch");
        assert_eq!(json["kind"], "TimedOut");
    }
}
