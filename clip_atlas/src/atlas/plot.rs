// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A fixed-size region of an atlas page.

use alloc::vec;
use alloc::vec::Vec;

use guillotiere::{AtlasAllocator, size2};

use super::upload::{MaskTarget, PlotUpload};
use crate::locator::{AtlasToken, Generation, PlotLocator, TextureId};
use crate::math::{IntPoint, IntRect};

/// A plot packs rectangles with a guillotine allocator and owns the staging memory for them.
///
/// Plots are never partially freed: they are reset as a whole, which is when their
/// generation changes.
pub(crate) struct Plot {
    page_index: u32,
    plot_index: u32,
    /// Position of the plot within its page.
    origin: IntPoint,
    width: u32,
    height: u32,
    generation: Generation,
    /// Token of the last flush that used content from this plot.
    last_use: AtlasToken,
    allocator: AtlasAllocator,
    allocation_count: u32,
    /// Coverage staging memory, allocated on first use.
    data: Vec<u8>,
    /// Plot-local area written since the last successful upload.
    dirty: IntRect,
}

impl Plot {
    pub(crate) fn new(
        page_index: u32,
        plot_index: u32,
        origin: IntPoint,
        width: u32,
        height: u32,
        generation: Generation,
    ) -> Self {
        Self {
            page_index,
            plot_index,
            origin,
            width,
            height,
            generation,
            last_use: AtlasToken::INITIAL,
            allocator: AtlasAllocator::new(size2(width as i32, height as i32)),
            allocation_count: 0,
            data: Vec::new(),
            dirty: IntRect::default(),
        }
    }

    #[inline]
    pub(crate) fn locator(&self) -> PlotLocator {
        PlotLocator::new(self.page_index, self.plot_index, self.generation)
    }

    #[inline]
    pub(crate) fn generation(&self) -> Generation {
        self.generation
    }

    #[inline]
    pub(crate) fn last_use(&self) -> AtlasToken {
        self.last_use
    }

    #[inline]
    pub(crate) fn set_last_use(&mut self, token: AtlasToken) {
        self.last_use = self.last_use.max(token);
    }

    #[inline]
    pub(crate) fn is_occupied(&self) -> bool {
        self.allocation_count > 0
    }

    #[inline]
    pub(crate) fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    #[inline]
    pub(crate) fn origin(&self) -> IntPoint {
        self.origin
    }

    /// Reserves a `width` x `height` area, returning it in plot coordinates.
    pub(crate) fn add_rect(&mut self, width: u32, height: u32) -> Option<IntRect> {
        if width > self.width || height > self.height {
            return None;
        }
        let allocation = self
            .allocator
            .allocate(size2(width as i32, height as i32))?;
        self.allocation_count += 1;
        let origin = allocation.rectangle.min;
        Some(IntRect::from_origin_size(
            origin.x,
            origin.y,
            width as i32,
            height as i32,
        ))
    }

    /// Clears `rect` (plot coordinates), marks it dirty and returns a writable view of it.
    pub(crate) fn mask_target(&mut self, rect: IntRect) -> MaskTarget<'_> {
        if self.data.is_empty() {
            self.data = vec![0; self.width as usize * self.height as usize];
        }
        self.dirty = self.dirty.union(&rect);
        let mut target = MaskTarget::new(&mut self.data, self.width as usize, rect);
        target.fill(0);
        target
    }

    /// The pending upload for this plot, if anything was written since the last one.
    pub(crate) fn pending_upload(
        &self,
        texture: TextureId,
        texture_width: u32,
        texture_height: u32,
    ) -> Option<PlotUpload<'_>> {
        if self.dirty.is_empty() {
            return None;
        }
        let stride = self.width as usize;
        let start = self.dirty.y0 as usize * stride + self.dirty.x0 as usize;
        Some(PlotUpload {
            texture,
            page_index: self.page_index,
            plot_index: self.plot_index,
            texture_width,
            texture_height,
            rect: self.dirty.translate(self.origin.x, self.origin.y),
            data: &self.data[start..],
            stride,
        })
    }

    pub(crate) fn mark_uploaded(&mut self) {
        self.dirty = IntRect::default();
    }

    /// Drops every allocation and moves the plot to `generation`.
    ///
    /// Staging memory is kept for reuse; pixels still waiting for upload are discarded.
    pub(crate) fn reset(&mut self, generation: Generation) {
        debug_assert_ne!(
            self.generation, generation,
            "a reset plot must change generation"
        );
        self.generation = generation;
        self.allocator.clear();
        self.allocation_count = 0;
        self.dirty = IntRect::default();
    }
}

impl core::fmt::Debug for Plot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Plot")
            .field("page_index", &self.page_index)
            .field("plot_index", &self.plot_index)
            .field("generation", &self.generation)
            .field("last_use", &self.last_use)
            .field("allocation_count", &self.allocation_count)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
