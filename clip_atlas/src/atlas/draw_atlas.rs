// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paged plot atlas.

use alloc::vec::Vec;

use super::plot::Plot;
use super::upload::{MaskTarget, UploadTarget};
use super::{AtlasEngine, PlotEvictor, ReclaimPolicy};
use crate::error::{PlacementError, UploadError};
use crate::locator::{AtlasGenerationCounter, AtlasLocator, AtlasToken, PlotLocator, TextureId};
use crate::math::{IntPoint, IntRect};

/// Dimensions and limits of a [`DrawAtlas`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Page texture width in pixels.
    pub page_width: u32,
    /// Page texture height in pixels.
    pub page_height: u32,
    /// Plot width in pixels. Clamped to the page width.
    pub plot_width: u32,
    /// Plot height in pixels. Clamped to the page height.
    pub plot_height: u32,
    /// Maximum number of pages alive at once.
    pub max_pages: u32,
    /// Number of flushes a plot must go unused before LRU compaction reclaims it.
    pub plot_recently_used_count: u64,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            page_width: 2048,
            page_height: 2048,
            plot_width: 512,
            plot_height: 512,
            max_pages: 4,
            plot_recently_used_count: 32,
        }
    }
}

struct Page {
    texture: TextureId,
    plots: Vec<Plot>,
    /// Plot indices, most recently used first.
    mru: Vec<u32>,
}

impl Page {
    fn new(
        page_index: u32,
        texture: TextureId,
        layout: &PlotLayout,
        generations: &mut AtlasGenerationCounter,
    ) -> Self {
        let plots = (0..layout.plots_per_page())
            .map(|plot_index| {
                let column = plot_index % layout.plots_per_row;
                let row = plot_index / layout.plots_per_row;
                Plot::new(
                    page_index,
                    plot_index,
                    IntPoint::new(
                        (column * layout.plot_width) as i32,
                        (row * layout.plot_height) as i32,
                    ),
                    layout.plot_width,
                    layout.plot_height,
                    generations.next_generation(),
                )
            })
            .collect();
        Self {
            texture,
            plots,
            mru: (0..layout.plots_per_page()).collect(),
        }
    }

    fn make_mru(&mut self, plot_index: u32) {
        if let Some(position) = self.mru.iter().position(|&index| index == plot_index) {
            self.mru[..=position].rotate_right(1);
        }
    }

    /// Places the rectangle in the first plot, in recency order, with room for it.
    fn add_rect(&mut self, width: u32, height: u32) -> Option<(u32, IntRect)> {
        for position in 0..self.mru.len() {
            let plot_index = self.mru[position];
            if let Some(rect) = self.plots[plot_index as usize].add_rect(width, height) {
                self.make_mru(plot_index);
                return Some((plot_index, rect));
            }
        }
        None
    }

    fn is_occupied(&self) -> bool {
        self.plots.iter().any(Plot::is_occupied)
    }
}

#[derive(Clone, Copy, Debug)]
struct PlotLayout {
    plot_width: u32,
    plot_height: u32,
    plots_per_row: u32,
    plots_per_column: u32,
}

impl PlotLayout {
    fn new(config: &AtlasConfig) -> Self {
        let page_width = config.page_width.max(1);
        let page_height = config.page_height.max(1);
        let plot_width = config.plot_width.clamp(1, page_width);
        let plot_height = config.plot_height.clamp(1, page_height);
        Self {
            plot_width,
            plot_height,
            plots_per_row: page_width / plot_width,
            plots_per_column: page_height / plot_height,
        }
    }

    fn plots_per_page(&self) -> u32 {
        self.plots_per_row * self.plots_per_column
    }
}

/// An atlas of up to [`AtlasConfig::max_pages`] pages, each divided into equally sized plots.
///
/// Rectangles are packed into plots with a guillotine allocator. Plots are reclaimed whole,
/// least recently used first, and only once no draw of the current flush samples from them.
/// Every reclamation is announced to the [`PlotEvictor`] before the plot is reset and its
/// generation moves on.
pub struct DrawAtlas {
    config: AtlasConfig,
    layout: PlotLayout,
    pages: Vec<Page>,
    generations: AtlasGenerationCounter,
    next_texture_id: u32,
}

impl DrawAtlas {
    /// Creates an atlas without any pages.
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            layout: PlotLayout::new(&config),
            config,
            pages: Vec::new(),
            generations: AtlasGenerationCounter::new(),
            next_texture_id: 0,
        }
    }

    /// The configuration this atlas was created with.
    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Number of pages currently alive.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of plots holding at least one allocation.
    pub fn occupied_plot_count(&self) -> usize {
        self.plots().filter(|plot| plot.is_occupied()).count()
    }

    fn plots(&self) -> impl Iterator<Item = &Plot> {
        self.pages.iter().flat_map(|page| page.plots.iter())
    }

    fn plot(&self, plot: PlotLocator) -> Option<&Plot> {
        self.pages
            .get(plot.page_index as usize)?
            .plots
            .get(plot.plot_index as usize)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "page and plot counts are bounded by u32 configuration values"
    )]
    fn push_page(&mut self) -> u32 {
        let page_index = self.pages.len() as u32;
        let texture = TextureId(self.next_texture_id);
        self.next_texture_id += 1;
        let page = Page::new(page_index, texture, &self.layout, &mut self.generations);
        self.pages.push(page);
        log::debug!("clip atlas: created page {page_index} ({texture:?})");
        page_index
    }

    /// The occupied plot with the oldest last use that the flush `token` does not sample.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "page and plot counts are bounded by u32 configuration values"
    )]
    fn find_reclaimable(&self, token: AtlasToken) -> Option<(u32, u32)> {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(page_index, page)| {
                page.plots
                    .iter()
                    .enumerate()
                    .map(move |(plot_index, plot)| (page_index, plot_index, plot))
            })
            .filter(|(_, _, plot)| plot.is_occupied() && plot.last_use() < token)
            .min_by_key(|(_, _, plot)| plot.last_use())
            .map(|(page_index, plot_index, _)| (page_index as u32, plot_index as u32))
    }

    /// Announces the reclamation of a plot and resets it.
    fn reclaim(&mut self, page_index: u32, plot_index: u32, evictor: &mut dyn PlotEvictor) {
        let generation = self.generations.next_generation();
        let plot = &mut self.pages[page_index as usize].plots[plot_index as usize];
        evictor.evict(plot.locator());
        plot.reset(generation);
    }

    fn finish_placement<F>(
        &mut self,
        page_index: u32,
        plot_index: u32,
        rect: IntRect,
        token: AtlasToken,
        rasterize: F,
    ) -> AtlasLocator
    where
        F: FnOnce(&mut MaskTarget<'_>),
    {
        let plot = &mut self.pages[page_index as usize].plots[plot_index as usize];
        plot.set_last_use(token);
        let origin = plot.origin();
        let locator = AtlasLocator {
            plot: plot.locator(),
            rect: rect.translate(origin.x, origin.y),
        };
        rasterize(&mut plot.mask_target(rect));
        log::trace!("clip atlas: placed {:?}", locator);
        locator
    }
}

impl AtlasEngine for DrawAtlas {
    fn plots_per_page(&self) -> u32 {
        self.layout.plots_per_page()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "page and plot counts are bounded by u32 configuration values"
    )]
    fn add_rect<F>(
        &mut self,
        width: u32,
        height: u32,
        token: AtlasToken,
        evictor: &mut dyn PlotEvictor,
        rasterize: F,
    ) -> Result<AtlasLocator, PlacementError>
    where
        F: FnOnce(&mut MaskTarget<'_>),
    {
        if width == 0 || height == 0 {
            return Err(PlacementError::Empty);
        }
        if width > self.layout.plot_width || height > self.layout.plot_height {
            return Err(PlacementError::TooLarge);
        }

        for page_index in 0..self.pages.len() {
            if let Some((plot_index, rect)) = self.pages[page_index].add_rect(width, height) {
                return Ok(self.finish_placement(
                    page_index as u32,
                    plot_index,
                    rect,
                    token,
                    rasterize,
                ));
            }
        }

        let target = if self.pages.len() < self.config.max_pages as usize {
            self.push_page()
        } else {
            let Some((page_index, plot_index)) = self.find_reclaimable(token) else {
                return Err(PlacementError::AtlasFull);
            };
            self.reclaim(page_index, plot_index, evictor);
            page_index
        };
        match self.pages[target as usize].add_rect(width, height) {
            Some((plot_index, rect)) => {
                Ok(self.finish_placement(target, plot_index, rect, token, rasterize))
            }
            // An empty plot always has room for a rectangle no larger than itself.
            None => Err(PlacementError::AtlasFull),
        }
    }

    fn has_id(&self, plot: PlotLocator) -> bool {
        plot.generation.is_valid()
            && self
                .plot(plot)
                .is_some_and(|current| current.generation() == plot.generation)
    }

    fn set_last_use_token(&mut self, plot: PlotLocator, token: AtlasToken) {
        let Some(page) = self.pages.get_mut(plot.page_index as usize) else {
            return;
        };
        match page.plots.get_mut(plot.plot_index as usize) {
            Some(current) if current.generation() == plot.generation => {
                current.set_last_use(token);
                page.make_mru(plot.plot_index);
            }
            _ => {}
        }
    }

    fn texture(&self, page_index: u32) -> Option<TextureId> {
        self.pages.get(page_index as usize).map(|page| page.texture)
    }

    fn record_uploads(&mut self, target: &mut dyn UploadTarget) -> Result<(), UploadError> {
        let (texture_width, texture_height) = (self.config.page_width, self.config.page_height);
        for page in &mut self.pages {
            for plot in &mut page.plots {
                if !plot.is_dirty() {
                    continue;
                }
                if let Some(upload) = plot.pending_upload(page.texture, texture_width, texture_height)
                {
                    if let Err(err) = target.upload(upload) {
                        log::warn!("clip atlas: {err}");
                        return Err(err);
                    }
                }
                plot.mark_uploaded();
            }
        }
        Ok(())
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "page and plot counts are bounded by u32 configuration values"
    )]
    fn compact(
        &mut self,
        current_token: AtlasToken,
        policy: ReclaimPolicy,
        evictor: &mut dyn PlotEvictor,
    ) {
        let recently_used = self.config.plot_recently_used_count;
        let mut reclaimed = 0_usize;
        for page_index in 0..self.pages.len() {
            for plot_index in 0..self.pages[page_index].plots.len() {
                let plot = &self.pages[page_index].plots[plot_index];
                if !plot.is_occupied() || plot.last_use() >= current_token {
                    continue;
                }
                let reclaim = match policy {
                    ReclaimPolicy::ForceAll => true,
                    ReclaimPolicy::LruOnly => {
                        current_token.flushes_since(plot.last_use()) >= recently_used
                    }
                };
                if reclaim {
                    self.reclaim(page_index as u32, plot_index as u32, evictor);
                    reclaimed += 1;
                }
            }
        }

        let mut released = 0_usize;
        while self.pages.last().is_some_and(|page| !page.is_occupied()) {
            self.pages.pop();
            released += 1;
        }
        log::debug!(
            "clip atlas: compaction ({policy:?}) reclaimed {reclaimed} plots, released {released} pages"
        );
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "page and plot counts are bounded by u32 configuration values"
    )]
    fn evict_all_plots(&mut self, evictor: &mut dyn PlotEvictor) {
        for page_index in 0..self.pages.len() {
            for plot_index in 0..self.pages[page_index].plots.len() {
                if self.pages[page_index].plots[plot_index].is_occupied() {
                    self.reclaim(page_index as u32, plot_index as u32, evictor);
                }
            }
        }
    }

    fn free_gpu_resources(&mut self, evictor: &mut dyn PlotEvictor) {
        self.evict_all_plots(evictor);
        log::debug!("clip atlas: released {} pages", self.pages.len());
        self.pages.clear();
    }
}

impl Default for DrawAtlas {
    fn default() -> Self {
        Self::new(AtlasConfig::default())
    }
}

impl core::fmt::Debug for DrawAtlas {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DrawAtlas")
            .field("config", &self.config)
            .field("pages", &self.pages.len())
            .field("occupied_plots", &self.occupied_plot_count())
            .finish_non_exhaustive()
    }
}
