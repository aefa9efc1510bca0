// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Atlas addresses, generations and flush tokens.

use crate::math::{IntPoint, IntRect};

/// Generation of a plot's contents.
///
/// A plot receives a new generation every time its memory is handed to new content. Locators
/// remember the generation they were issued under and are valid only while it is still the
/// plot's current one. Generations are compared for equality only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Generation(u64);

impl Generation {
    /// The generation no live plot ever has.
    pub const INVALID: Self = Self(0);

    /// Whether this is [`Generation::INVALID`].
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Source of fresh plot generations.
///
/// Never hands out [`Generation::INVALID`] and never repeats a value.
#[derive(Debug)]
pub struct AtlasGenerationCounter {
    next: u64,
}

impl AtlasGenerationCounter {
    /// Creates a counter whose first generation is 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next generation.
    pub fn next_generation(&mut self) -> Generation {
        let generation = Generation(self.next);
        // u64 does not wrap in practice; skip the invalid value anyway.
        self.next = self.next.wrapping_add(1).max(1);
        generation
    }
}

impl Default for AtlasGenerationCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies a flush.
///
/// Tokens grow by one per flush. A plot remembers the token of the last flush that sampled
/// from it; plots used by the current flush are not reclaimed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtlasToken(u64);

impl AtlasToken {
    /// The token before any flush.
    pub const INITIAL: Self = Self(0);

    /// The token that follows this one.
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Number of flushes from `earlier` to `self`, or zero if `earlier` is not earlier.
    #[inline]
    pub fn flushes_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Handle of the texture backing one atlas page.
///
/// Released pages never return their id, so a recreated page has a new handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Identifies a plot and the generation of content it held when the locator was issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlotLocator {
    /// Index of the page.
    pub page_index: u32,
    /// Index of the plot within its page.
    pub plot_index: u32,
    /// Plot generation at issue time.
    pub generation: Generation,
}

impl PlotLocator {
    /// Creates a locator.
    #[inline]
    pub const fn new(page_index: u32, plot_index: u32, generation: Generation) -> Self {
        Self {
            page_index,
            plot_index,
            generation,
        }
    }

    /// Whether both locators name the same plot, regardless of generation.
    #[inline]
    pub fn same_plot(&self, other: &Self) -> bool {
        self.page_index == other.page_index && self.plot_index == other.plot_index
    }
}

/// Where a piece of content lives inside the atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AtlasLocator {
    /// The plot holding the content.
    pub plot: PlotLocator,
    /// The allocated rectangle in page pixel coordinates, padding included.
    pub rect: IntRect,
}

impl AtlasLocator {
    /// Index of the page.
    #[inline]
    pub fn page_index(&self) -> u32 {
        self.plot.page_index
    }

    /// Index of the plot within its page.
    #[inline]
    pub fn plot_index(&self) -> u32 {
        self.plot.plot_index
    }

    /// Plot generation at issue time.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.plot.generation
    }

    /// Top-left corner of the allocation in page pixels.
    #[inline]
    pub fn top_left(&self) -> IntPoint {
        self.rect.top_left()
    }
}
