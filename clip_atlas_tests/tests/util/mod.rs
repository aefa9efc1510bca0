// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures: a scriptable atlas engine, a counting rasterizer and a recording upload
//! target.

use clip_atlas::kurbo::Rect;
use clip_atlas::{
    AtlasConfig, AtlasEngine, AtlasGenerationCounter, AtlasLocator, AtlasToken, ClipElement,
    ClipShape, Generation, IntRect, MaskRasterizer, MaskTarget, PlacementError, PlotEvictor,
    PlotLocator, PlotUpload, ReclaimPolicy, TextureId, UploadError, UploadErrorKind,
    UploadTarget,
};

/// A rectangle clip element covering `x0..x1`, `y0..y1` in device space.
pub(crate) fn rect_element(id: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> ClipElement {
    ClipElement::new(id, ClipShape::Rect(Rect::new(x0, y0, x1, y1)))
}

/// Atlas configuration with tiny plots, so tests can fill plots with a handful of masks.
pub(crate) fn small_config() -> AtlasConfig {
    AtlasConfig {
        page_width: 128,
        page_height: 64,
        plot_width: 32,
        plot_height: 32,
        max_pages: 2,
        plot_recently_used_count: 4,
    }
}

/// Rasterizes rectangle elements with full coverage and counts invocations.
#[derive(Debug, Default)]
pub(crate) struct CountingRasterizer {
    pub(crate) calls: usize,
}

impl MaskRasterizer for CountingRasterizer {
    fn rasterize(&mut self, elements: &[ClipElement], bounds: IntRect, target: &mut MaskTarget<'_>) {
        self.calls += 1;
        target.fill(255);
        for element in elements {
            if let ClipShape::Rect(rect) = &element.shape {
                let device = element.transform.transform_rect_bbox(*rect);
                let inside = IntRect::new(
                    device.x0.floor() as i32 - bounds.x0,
                    device.y0.floor() as i32 - bounds.y0,
                    device.x1.ceil() as i32 - bounds.x0,
                    device.y1.ceil() as i32 - bounds.y0,
                );
                // Intersect: clear everything outside the element.
                for y in 0..target.height() as i32 {
                    for x in 0..target.width() as i32 {
                        let covered =
                            x >= inside.x0 && x < inside.x1 && y >= inside.y0 && y < inside.y1;
                        if !covered {
                            target.put(x as u32, y as u32, 0);
                        }
                    }
                }
            }
        }
    }
}

/// A copied region, as seen by [`RecordingUploads`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedUpload {
    pub(crate) texture: TextureId,
    pub(crate) rect: IntRect,
    pub(crate) rows: Vec<Vec<u8>>,
}

impl RecordedUpload {
    /// Coverage at page pixel `(x, y)`, if the upload covers it.
    pub(crate) fn coverage_at(&self, x: i32, y: i32) -> Option<u8> {
        if x < self.rect.x0 || x >= self.rect.x1 || y < self.rect.y0 || y >= self.rect.y1 {
            return None;
        }
        Some(self.rows[(y - self.rect.y0) as usize][(x - self.rect.x0) as usize])
    }
}

/// Records every upload, or rejects them all while `fail` is set.
#[derive(Debug, Default)]
pub(crate) struct RecordingUploads {
    pub(crate) fail: bool,
    pub(crate) uploads: Vec<RecordedUpload>,
}

impl UploadTarget for RecordingUploads {
    fn upload(&mut self, upload: PlotUpload<'_>) -> Result<(), UploadError> {
        if self.fail {
            return Err(UploadError::new(UploadErrorKind::Rejected, upload.texture));
        }
        let rows = (0..upload.rect.height())
            .map(|y| upload.row(y).unwrap_or_default().to_vec())
            .collect();
        self.uploads.push(RecordedUpload {
            texture: upload.texture,
            rect: upload.rect,
            rows,
        });
        Ok(())
    }
}

#[derive(Debug)]
struct MockPlot {
    generation: Generation,
    used: u32,
    last_use: AtlasToken,
}

/// An engine with a fixed number of plots that each hold `plot_capacity` masks.
///
/// Plots are filled in index order and reclaimed least recently used first.
#[derive(Debug)]
pub(crate) struct MockAtlas {
    plots_per_page: u32,
    plot_capacity: u32,
    plots: Vec<MockPlot>,
    generations: AtlasGenerationCounter,
    /// Refuse every placement.
    pub(crate) reject_all: bool,
    /// Successful placements.
    pub(crate) placements: usize,
    /// Plots reclaimed for any reason.
    pub(crate) reclaims: usize,
    /// Calls to `record_uploads`.
    pub(crate) upload_passes: usize,
}

impl MockAtlas {
    pub(crate) fn new(pages: u32, plots_per_page: u32, plot_capacity: u32) -> Self {
        let mut generations = AtlasGenerationCounter::new();
        let plots = (0..pages * plots_per_page)
            .map(|_| MockPlot {
                generation: generations.next_generation(),
                used: 0,
                last_use: AtlasToken::INITIAL,
            })
            .collect();
        Self {
            plots_per_page,
            plot_capacity,
            plots,
            generations,
            reject_all: false,
            placements: 0,
            reclaims: 0,
            upload_passes: 0,
        }
    }

    fn locator(&self, index: usize) -> PlotLocator {
        PlotLocator::new(
            index as u32 / self.plots_per_page,
            index as u32 % self.plots_per_page,
            self.plots[index].generation,
        )
    }

    fn index_of(&self, plot: PlotLocator) -> usize {
        (plot.page_index * self.plots_per_page + plot.plot_index) as usize
    }

    fn reclaim(&mut self, index: usize, evictor: &mut dyn PlotEvictor) {
        evictor.evict(self.locator(index));
        let generation = self.generations.next_generation();
        let plot = &mut self.plots[index];
        plot.generation = generation;
        plot.used = 0;
        self.reclaims += 1;
    }
}

impl AtlasEngine for MockAtlas {
    fn plots_per_page(&self) -> u32 {
        self.plots_per_page
    }

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
        if self.reject_all {
            return Err(PlacementError::AtlasFull);
        }
        let index = match self
            .plots
            .iter()
            .position(|plot| plot.used < self.plot_capacity)
        {
            Some(index) => index,
            None => {
                let victim = self
                    .plots
                    .iter()
                    .enumerate()
                    .filter(|(_, plot)| plot.last_use < token)
                    .min_by_key(|(_, plot)| plot.last_use)
                    .map(|(index, _)| index)
                    .ok_or(PlacementError::AtlasFull)?;
                self.reclaim(victim, evictor);
                victim
            }
        };

        let slot = self.plots[index].used;
        self.plots[index].used += 1;
        self.plots[index].last_use = self.plots[index].last_use.max(token);
        self.placements += 1;

        let mut scratch = vec![0_u8; (width * height) as usize];
        rasterize(&mut MaskTarget::new(
            &mut scratch,
            width as usize,
            IntRect::from_origin_size(0, 0, width as i32, height as i32),
        ));

        Ok(AtlasLocator {
            plot: self.locator(index),
            rect: IntRect::from_origin_size(
                (slot * width) as i32,
                0,
                width as i32,
                height as i32,
            ),
        })
    }

    fn has_id(&self, plot: PlotLocator) -> bool {
        self.plots
            .get(self.index_of(plot))
            .is_some_and(|current| current.generation == plot.generation)
    }

    fn set_last_use_token(&mut self, plot: PlotLocator, token: AtlasToken) {
        let index = self.index_of(plot);
        if let Some(current) = self.plots.get_mut(index) {
            if current.generation == plot.generation {
                current.last_use = current.last_use.max(token);
            }
        }
    }

    fn texture(&self, page_index: u32) -> Option<TextureId> {
        let pages = self.plots.len() as u32 / self.plots_per_page;
        (page_index < pages).then_some(TextureId(page_index))
    }

    fn record_uploads(&mut self, _: &mut dyn UploadTarget) -> Result<(), UploadError> {
        self.upload_passes += 1;
        Ok(())
    }

    fn compact(
        &mut self,
        current_token: AtlasToken,
        policy: ReclaimPolicy,
        evictor: &mut dyn PlotEvictor,
    ) {
        for index in 0..self.plots.len() {
            let plot = &self.plots[index];
            if plot.used == 0 || plot.last_use >= current_token {
                continue;
            }
            let stale = current_token.flushes_since(plot.last_use) >= 2;
            if policy == ReclaimPolicy::ForceAll || stale {
                self.reclaim(index, evictor);
            }
        }
    }

    fn evict_all_plots(&mut self, evictor: &mut dyn PlotEvictor) {
        for index in 0..self.plots.len() {
            if self.plots[index].used > 0 {
                self.reclaim(index, evictor);
            }
        }
    }

    fn free_gpu_resources(&mut self, evictor: &mut dyn PlotEvictor) {
        self.evict_all_plots(evictor);
    }
}
