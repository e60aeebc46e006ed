//! KeyReel Export Engine
//!
//! Turns a keyframed scene into a video file:
//!
//! ```text
//! KeyframeSource ──resolve_order──▶ [k0, k1, ... kN]
//!        │
//!        ▼  per keyframe: load ─ settle ─ capture ─ pause
//!  ScratchDirectory: 000000.png ... 00000N.png
//!        │
//!        ▼
//!  EncoderProcessManager ──▶ output.mp4
//! ```
//!
//! [`Exporter`] owns the state machine; progress and the terminal outcome
//! are published as [`ExportEvent`]s.

pub mod events;
pub mod exporter;
pub mod sequencer;
pub mod session;
pub mod settings;

pub use events::{ExportEvent, ExportOutcome, ExportProgress, FailureDetail, CANCELLED_MESSAGE};
pub use exporter::{Exporter, ExporterOptions};
pub use sequencer::resolve_order;
pub use session::{ExportSession, ExportState, SessionParams, SessionSnapshot};
pub use settings::{normalize_export_path, ExportSettings};
