//! Spatial layer: a fixed square grid of bins over the bounded world
//!
//! Positions outside the world's half-extent are clamped into the border
//! bins rather than wrapped, so every position maps to a valid bin.
//! Two working rectangles in bin space are kept: the mask (bins touching the
//! visible region) and the area (bins touching one entity's sweep, clipped to
//! the mask). Both are recomputed on every query.

use glam::Vec2;

use super::geom::Rect;
use crate::SimConfig;

/// Row-major bin index, `y * bins_per_side + x`
pub type BinIndex = usize;

/// Inclusive rectangle of bin coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl BinRect {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        debug_assert!(x0 <= x1 && y0 <= y1);
        Self { x0, y0, x1, y1 }
    }

    pub fn contains(&self, (x, y): (usize, usize)) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Overlap of two rectangles, `None` when disjoint
    pub fn intersect(&self, other: &BinRect) -> Option<BinRect> {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        (x0 <= x1 && y0 <= y1).then(|| BinRect::new(x0, y0, x1, y1))
    }

    /// First bin in iteration order (top row, leftmost column)
    pub fn corner(&self) -> (usize, usize) {
        (self.x0, self.y1)
    }

    pub fn len(&self) -> usize {
        (self.x1 - self.x0 + 1) * (self.y1 - self.y0 + 1)
    }

    /// Bin indices row-major: y descending, x ascending
    pub fn iter(self, bins_per_side: usize) -> BinIter {
        BinIter {
            rect: self,
            side: bins_per_side,
            cur: Some(self.corner()),
        }
    }
}

/// Iterator over the bins of a `BinRect`
pub struct BinIter {
    rect: BinRect,
    side: usize,
    cur: Option<(usize, usize)>,
}

impl Iterator for BinIter {
    type Item = BinIndex;

    fn next(&mut self) -> Option<BinIndex> {
        let (x, y) = self.cur?;
        self.cur = if x < self.rect.x1 {
            Some((x + 1, y))
        } else if y > self.rect.y0 {
            Some((self.rect.x0, y - 1))
        } else {
            None
        };
        Some(y * self.side + x)
    }
}

/// The bin grid plus its mask/area working rectangles
#[derive(Debug, Clone)]
pub struct Layer {
    bins_per_side: usize,
    bin_span: f32,
    half_extent: f32,
    mask: BinRect,
    area: Option<BinRect>,
}

impl Layer {
    pub fn new(half_extent: f32, bins_per_side: usize) -> Self {
        let bins_per_side = bins_per_side.max(1);
        let full = BinRect::new(0, 0, bins_per_side - 1, bins_per_side - 1);
        Self {
            bins_per_side,
            bin_span: 2.0 * half_extent / bins_per_side as f32,
            half_extent,
            mask: full,
            area: None,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.half_extent, config.bins_per_side)
    }

    pub fn bins_per_side(&self) -> usize {
        self.bins_per_side
    }

    pub fn bin_count(&self) -> usize {
        self.bins_per_side * self.bins_per_side
    }

    pub fn bin_span(&self) -> f32 {
        self.bin_span
    }

    pub fn half_extent(&self) -> f32 {
        self.half_extent
    }

    /// Grid coordinate of one world axis value, clamped to the border
    fn axis_coord(&self, v: f32) -> usize {
        let clamped = v.clamp(-self.half_extent, self.half_extent);
        let cell = ((clamped + self.half_extent) / self.bin_span).floor() as i64;
        cell.clamp(0, self.bins_per_side as i64 - 1) as usize
    }

    /// Bin coordinates owning `pos`
    pub fn bin_coords(&self, pos: Vec2) -> (usize, usize) {
        (self.axis_coord(pos.x), self.axis_coord(pos.y))
    }

    /// Bin owning `pos`; never out of range
    pub fn bin_of(&self, pos: Vec2) -> BinIndex {
        let (x, y) = self.bin_coords(pos);
        self.index(x, y)
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> BinIndex {
        y * self.bins_per_side + x
    }

    #[inline]
    pub fn coords(&self, bin: BinIndex) -> (usize, usize) {
        (bin % self.bins_per_side, bin / self.bins_per_side)
    }

    /// World-space bounds of one bin
    pub fn bin_bounds(&self, bin: BinIndex) -> Rect {
        let (x, y) = self.coords(bin);
        let min = Vec2::new(
            -self.half_extent + x as f32 * self.bin_span,
            -self.half_extent + y as f32 * self.bin_span,
        );
        Rect::new(min, min + Vec2::splat(self.bin_span))
    }

    /// Bin rectangle touching a world rectangle, clipped to the grid
    pub fn bin_rect(&self, rect: &Rect) -> BinRect {
        let (ax, ay) = self.bin_coords(rect.min);
        let (bx, by) = self.bin_coords(rect.max);
        BinRect::new(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
    }

    /// Set the mask to the bins covering the visible region
    pub fn set_mask(&mut self, view: &Rect) -> BinRect {
        self.mask = self.bin_rect(view);
        self.mask
    }

    /// Set the area to the bins covering one entity's sweep, clipped to the
    /// current mask. Off-mask sweeps leave the area empty.
    pub fn set_area(&mut self, swept: &Rect) -> Option<BinRect> {
        self.area = self.bin_rect(swept).intersect(&self.mask);
        self.area
    }

    pub fn mask(&self) -> BinRect {
        self.mask
    }

    pub fn area(&self) -> Option<BinRect> {
        self.area
    }

    pub fn in_mask(&self, bin: BinIndex) -> bool {
        self.mask.contains(self.coords(bin))
    }

    pub fn mask_bins(&self) -> BinIter {
        self.mask.iter(self.bins_per_side)
    }

    pub fn for_each_in_mask(&self, action: impl FnMut(BinIndex)) {
        self.mask_bins().for_each(action);
    }

    pub fn for_each_in_area(&self, action: impl FnMut(BinIndex)) {
        if let Some(area) = self.area {
            area.iter(self.bins_per_side).for_each(action);
        }
    }
}
