//! KeyReel Common Utilities
//!
//! Shared infrastructure for all KeyReel crates:
//! - Error types and result aliases
//! - Session clock for progress reporting
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
