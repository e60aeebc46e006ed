//! KeyReel Capture Engine
//!
//! Turns the scene host's render surface into numbered still frames on
//! disk.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                FrameCapture                  │
//! │  RenderSurface ──grab──▶ crop ──▶ resize     │
//! │                                    │         │
//! │                                    ▼         │
//! │  ┌─────────────────────────────────────────┐ │
//! │  │      ScratchDirectory (per session)     │ │
//! │  │  000000.png  000001.png  000002.png ... │ │
//! │  └─────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────┘
//! ```

pub mod frame;
pub mod scratch;

pub use frame::{CaptureOptions, CapturedFrame, FrameCapture, WindowGrab};
pub use scratch::{frame_file_name, ScratchDirectory, ScratchStorage};
