// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Staged mask pixels and their transfer to page textures.
//!
//! Rasterization writes into CPU-side staging memory owned by each plot through a
//! [`MaskTarget`]. Nothing reaches the GPU until the application records the pending
//! uploads: the atlas hands every dirty plot region to an [`UploadTarget`] as a
//! [`PlotUpload`]. This mirrors the `take_pending_uploads` pattern used for glyph bitmaps,
//! except that the atlas keeps the data until the upload succeeds.

use crate::error::UploadError;
use crate::locator::TextureId;
use crate::math::IntRect;

/// Writable single-channel coverage view into a plot's staging memory.
///
/// Coordinates are relative to the target's top-left corner. Writes outside the target are
/// ignored.
pub struct MaskTarget<'a> {
    data: &'a mut [u8],
    stride: usize,
    rect: IntRect,
}

impl<'a> MaskTarget<'a> {
    /// Creates a view of `rect` inside `data`, which holds rows of `stride` bytes.
    ///
    /// Atlas engines call this to hand their staging memory to a rasterizer.
    ///
    /// # Panics
    ///
    /// If a non-empty `rect` does not lie inside `data`.
    pub fn new(data: &'a mut [u8], stride: usize, rect: IntRect) -> Self {
        assert!(
            rect.is_empty()
                || (rect.x0 >= 0
                    && rect.y0 >= 0
                    && rect.x1 as usize <= stride
                    && rect.y1 as usize * stride <= data.len()),
            "mask target outside of its backing memory"
        );
        Self { data, stride, rect }
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.rect.width()
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.rect.height()
    }

    /// Row `y` of the target, or `None` past the last row.
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.height() {
            return None;
        }
        let width = self.width() as usize;
        let start = (self.rect.y0 as usize + y as usize) * self.stride + self.rect.x0 as usize;
        Some(&mut self.data[start..start + width])
    }

    /// Row `y` of the target, or `None` past the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height() {
            return None;
        }
        let start = (self.rect.y0 as usize + y as usize) * self.stride + self.rect.x0 as usize;
        Some(&self.data[start..start + self.width() as usize])
    }

    /// Coverage at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width() {
            return None;
        }
        self.row(y).map(|row| row[x as usize])
    }

    /// Sets coverage at `(x, y)`.
    pub fn put(&mut self, x: u32, y: u32, coverage: u8) {
        if x >= self.width() {
            return;
        }
        if let Some(row) = self.row_mut(y) {
            row[x as usize] = coverage;
        }
    }

    /// Sets every pixel to `coverage`.
    pub fn fill(&mut self, coverage: u8) {
        for y in 0..self.height() {
            if let Some(row) = self.row_mut(y) {
                row.fill(coverage);
            }
        }
    }

    /// Sets the pixels of `rect` (target coordinates, clipped to the target) to `coverage`.
    pub fn fill_rect(&mut self, rect: IntRect, coverage: u8) {
        let width = self.width() as i32;
        let height = self.height() as i32;
        let x0 = rect.x0.clamp(0, width) as usize;
        let x1 = rect.x1.clamp(0, width) as usize;
        let y0 = rect.y0.clamp(0, height) as u32;
        let y1 = rect.y1.clamp(0, height) as u32;
        if x0 >= x1 {
            return;
        }
        for y in y0..y1 {
            if let Some(row) = self.row_mut(y) {
                row[x0..x1].fill(coverage);
            }
        }
    }

    /// A view of this target shrunk by `amount` pixels on every side.
    pub fn inset(&mut self, amount: u32) -> MaskTarget<'_> {
        let amount = amount.min(self.width() / 2).min(self.height() / 2) as i32;
        let rect = IntRect::new(
            self.rect.x0 + amount,
            self.rect.y0 + amount,
            self.rect.x1 - amount,
            self.rect.y1 - amount,
        );
        MaskTarget {
            data: &mut *self.data,
            stride: self.stride,
            rect,
        }
    }
}

impl core::fmt::Debug for MaskTarget<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MaskTarget")
            .field("rect", &self.rect)
            .field("stride", &self.stride)
            .finish_non_exhaustive()
    }
}

/// A region of staged coverage waiting to be copied into a page texture.
#[derive(Debug)]
pub struct PlotUpload<'a> {
    /// The destination texture.
    pub texture: TextureId,
    /// Index of the destination page.
    pub page_index: u32,
    /// Index of the plot within the page.
    pub plot_index: u32,
    /// Page texture width in pixels (for lazily creating the texture).
    pub texture_width: u32,
    /// Page texture height in pixels.
    pub texture_height: u32,
    /// Destination rectangle in page pixels.
    pub rect: IntRect,
    /// Single-channel coverage. The first byte is the top-left pixel of `rect`.
    pub data: &'a [u8],
    /// Bytes between the starts of consecutive rows in `data`.
    pub stride: usize,
}

impl PlotUpload<'_> {
    /// Row `y` of the upload, `rect.width()` bytes long.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.rect.height() {
            return None;
        }
        let start = y as usize * self.stride;
        self.data.get(start..start + self.rect.width() as usize)
    }
}

/// The recording context that copies staged coverage into GPU textures.
///
/// Supplied by the application when it records uploads for a flush.
pub trait UploadTarget {
    /// Copies `upload` into its texture.
    fn upload(&mut self, upload: PlotUpload<'_>) -> Result<(), UploadError>;
}

impl<T: UploadTarget + ?Sized> UploadTarget for &mut T {
    fn upload(&mut self, upload: PlotUpload<'_>) -> Result<(), UploadError> {
        (**self).upload(upload)
    }
}
