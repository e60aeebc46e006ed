//! Export session state.

use std::fmt;
use std::path::PathBuf;

use keyreel_capture_engine::ScratchDirectory;
use keyreel_common::clock::SessionClock;
use keyreel_scene_core::KeyframeId;
use serde::{Deserialize, Serialize};

/// Status text while no export has run yet.
pub const STATUS_READY: &str = "Ready";

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    #[default]
    Idle,
    Starting,
    /// Keyframe load requested.
    CapturingFrame,
    /// Waiting for the scene to settle after a keyframe load.
    WaitingSettle,
    /// Grabbing and writing the frame.
    Capturing,
    Encoding,
    Completed,
    Failed,
    Cancelled,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// A session exists and has not reached a terminal state.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle) && !self.is_terminal()
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::CapturingFrame => "capturing_frame",
            Self::WaitingSettle => "waiting_settle",
            Self::Capturing => "capturing",
            Self::Encoding => "encoding",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Observable projection of the exporter, readable at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: ExportState,
    pub exporting: bool,
    /// Frames captured so far in the current (or last) session.
    pub current_frame: usize,
    pub total_frames: usize,
    pub status: String,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: ExportState::Idle,
            exporting: false,
            current_frame: 0,
            total_frames: 0,
            status: STATUS_READY.to_string(),
        }
    }
}

/// Parameters fixed when a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub output_path: PathBuf,
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
}

/// One export run: the keyframes to visit, the cursor into them, and the
/// scratch directory holding captured frames.
#[derive(Debug)]
pub struct ExportSession {
    keyframes: Vec<KeyframeId>,
    index: usize,
    params: SessionParams,
    scratch: ScratchDirectory,
    clock: SessionClock,
}

impl ExportSession {
    pub fn new(keyframes: Vec<KeyframeId>, params: SessionParams, scratch: ScratchDirectory) -> Self {
        Self {
            keyframes,
            index: 0,
            params,
            scratch,
            clock: SessionClock::start(),
        }
    }

    /// Frames captured so far; also the sequence number of the next frame.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.keyframes.len()
    }

    /// Keyframe to capture next, or `None` once every keyframe is captured.
    pub fn current_keyframe(&self) -> Option<KeyframeId> {
        self.keyframes.get(self.index).copied()
    }

    pub fn is_complete(&self) -> bool {
        self.index >= self.keyframes.len()
    }

    pub fn advance(&mut self) {
        if !self.is_complete() {
            self.index += 1;
        }
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn scratch(&self) -> &ScratchDirectory {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut ScratchDirectory {
        &mut self.scratch
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }
}
