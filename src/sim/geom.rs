//! Axis-aligned rectangles in world space
//!
//! Used for the camera view, the per-entity swept bounding box, and the
//! coarse overlap reject before the exact circle sweep.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Closed axis-aligned rectangle, `min <= max` on both axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Build from any two corners
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Rectangle centered on `center` with the given half size
    pub fn centered(center: Vec2, half_size: Vec2) -> Self {
        Self::new(center - half_size, center + half_size)
    }

    /// Bounding box of a circle
    #[inline]
    pub fn around_circle(center: Vec2, radius: f32) -> Self {
        Self::centered(center, Vec2::splat(radius))
    }

    /// Box containing a circle of `radius` over its whole straight sweep from
    /// `start` to `start + displacement`.
    ///
    /// A circle moving on a line never leaves the union of its endpoint
    /// boxes, so the union is exact for the sweep, not just the endpoints.
    pub fn swept_circle(start: Vec2, displacement: Vec2, radius: f32) -> Self {
        Self::new(start, start + displacement).expand(radius)
    }

    /// Grow by `margin` on every side
    #[inline]
    pub fn expand(self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// Smallest rectangle containing both
    pub fn union(self, other: Rect) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// True if the closed rectangles share any point
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}
