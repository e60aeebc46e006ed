//! KeyReel scene contracts.
//!
//! The export pipeline never renders anything itself. It drives a scene host
//! through the traits in this crate: a [`KeyframeSource`] that can enumerate
//! and load keyframes, and a [`RenderSurface`] living inside a [`WindowHost`]
//! that can be grabbed as a still image.

pub mod geometry;

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;
use keyreel_common::error::ReelResult;
use serde::{Deserialize, Serialize};

pub use geometry::{PixelRect, SurfaceRect};

/// Identifier of a point in the host's animation timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyframeId(pub i64);

impl KeyframeId {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for KeyframeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for KeyframeId {
    fn from(value: i32) -> Self {
        Self(value as i64)
    }
}

impl fmt::Display for KeyframeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of keyframes, usually the host's keyframe manager.
pub trait KeyframeSource: Send + Sync {
    /// All keyframe identifiers, in any order. Answered in a single query.
    fn keyframe_ids(&self) -> ReelResult<Vec<KeyframeId>>;

    /// Ask the host to bring the scene to keyframe `id`.
    ///
    /// Fire-and-forget: the scene may finish updating asynchronously.
    /// Returns `false` if the host rejected the request.
    fn load_keyframe(&self, id: KeyframeId) -> bool;
}

/// A window that can produce a still image of its current contents.
pub trait WindowHost: Send + Sync {
    /// Grab the full window contents. `None` or an empty image means the grab
    /// failed.
    fn grab_window(&self) -> Option<RgbaImage>;

    /// Window size in window coordinates.
    fn size(&self) -> (u32, u32);
}

/// The view whose pixels are exported.
pub trait RenderSurface: Send + Sync {
    /// Bounds of the surface in its owning window's coordinates.
    fn bounds_in_window(&self) -> SurfaceRect;

    /// The owning window, if the surface is currently attached to one.
    fn window(&self) -> Option<Arc<dyn WindowHost>>;

    /// Hide (or restore) UI overlays drawn on top of the surface, such as a
    /// timeline strip. Returns `true` if the host has overlays it toggled.
    fn set_overlays_hidden(&self, hidden: bool) -> bool {
        let _ = hidden;
        false
    }
}
