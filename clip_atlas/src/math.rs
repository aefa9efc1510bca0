// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer pixel geometry.

/// A point in integer device pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntPoint {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl IntPoint {
    /// Creates a new point.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A half-open rectangle in integer device pixels.
///
/// Covers the pixels `x0..x1` horizontally and `y0..y1` vertically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// Left edge (inclusive).
    pub x0: i32,
    /// Top edge (inclusive).
    pub y0: i32,
    /// Right edge (exclusive).
    pub x1: i32,
    /// Bottom edge (exclusive).
    pub y1: i32,
}

impl IntRect {
    /// Creates a rectangle from its edges.
    #[inline]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Creates a rectangle from an origin and a size.
    #[inline]
    pub const fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Width in pixels. Zero for inverted rectangles.
    #[inline]
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0).max(0).unsigned_abs()
    }

    /// Height in pixels. Zero for inverted rectangles.
    #[inline]
    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0).max(0).unsigned_abs()
    }

    /// Whether the rectangle covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// The top-left corner.
    #[inline]
    pub fn top_left(&self) -> IntPoint {
        IntPoint::new(self.x0, self.y0)
    }

    /// Smallest rectangle containing both `self` and `other`.
    ///
    /// Empty rectangles do not contribute.
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Offsets the rectangle by `(dx, dy)`.
    #[inline]
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }
}
