//! Surface and pixel rectangles.
//!
//! Render surfaces report their bounds in window coordinates as floating
//! point values; captures work on integer pixel rectangles clipped to the
//! grabbed window image.

use serde::{Deserialize, Serialize};

/// A rectangle in window coordinates, as reported by a render surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl SurfaceRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Scale every component, e.g. from logical to device pixels.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Truncate to integer pixels.
    pub fn to_pixels(&self) -> PixelRect {
        PixelRect::new(
            truncate(self.x),
            truncate(self.y),
            truncate(self.width),
            truncate(self.height),
        )
    }
}

/// A rectangle in integer pixel coordinates. Width or height of zero or less
/// means the rectangle is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub const EMPTY: PixelRect = PixelRect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a `width` x `height` image anchored at the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, clamp_i32(width as i64), clamp_i32(height as i64))
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Overlap of two rectangles; [`PixelRect::EMPTY`] when they do not meet.
    pub fn intersect(&self, other: &PixelRect) -> PixelRect {
        if self.is_empty() || other.is_empty() {
            return PixelRect::EMPTY;
        }

        let left = (self.x as i64).max(other.x as i64);
        let top = (self.y as i64).max(other.y as i64);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return PixelRect::EMPTY;
        }

        PixelRect::new(
            clamp_i32(left),
            clamp_i32(top),
            clamp_i32(right - left),
            clamp_i32(bottom - top),
        )
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &PixelRect) -> bool {
        !other.is_empty()
            && other.x as i64 >= self.x as i64
            && other.y as i64 >= self.y as i64
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Empty, or narrower/shorter than `min` pixels.
    pub fn is_degenerate(&self, min: u32) -> bool {
        let min = min as i64;
        self.is_empty() || (self.width as i64) < min || (self.height as i64) < min
    }

    /// Full-width band of a `width` x `height` window that skips `margin`
    /// rows at the top and at the bottom.
    pub fn centered_band(width: u32, height: u32, margin: u32) -> PixelRect {
        let band_height = height as i64 - 2 * margin as i64;
        PixelRect::new(
            0,
            clamp_i32(margin as i64),
            clamp_i32(width as i64),
            clamp_i32(band_height),
        )
    }
}

fn truncate(v: f64) -> i32 {
    // `as` saturates and maps NaN to zero.
    v as i32
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
