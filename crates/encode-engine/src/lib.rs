//! KeyReel Encode Engine
//!
//! Locates the external encoder, runs it over a numbered frame sequence,
//! and reports a single [`EncodeResult`] per run. Running processes can be
//! terminated gracefully with a bounded wait before a hard kill.

pub mod job;
pub mod locate;
pub mod process;

pub use job::EncodeJob;
pub use locate::{is_executable, EncoderLocator};
pub use process::{
    EncodeProcess, EncodeResult, EncoderProcessManager, LaunchError, LaunchFailureKind,
};
