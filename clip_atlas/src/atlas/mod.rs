// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The boundary between the clip mask cache and the atlas packing engine.
//!
//! The cache talks to the packer through [`AtlasEngine`] and receives reclamation
//! notifications through [`PlotEvictor`]. The engine never holds on to the evictor: every
//! operation that may reclaim a plot takes it as an argument, so the owner of the engine can
//! lend out its cache index for exactly the duration of the call.
//!
//! [`DrawAtlas`] is the engine used by default.

mod draw_atlas;
mod plot;
pub mod upload;

pub use draw_atlas::{AtlasConfig, DrawAtlas};

use crate::error::{PlacementError, UploadError};
use crate::locator::{AtlasLocator, AtlasToken, PlotLocator, TextureId};
use upload::{MaskTarget, UploadTarget};

/// Receives notice that a plot is about to be reused.
///
/// Called synchronously, before the plot's memory is handed to new content, with the
/// locator the plot had until now. Implementations must not fail and cannot reach back into
/// the engine.
pub trait PlotEvictor {
    /// Forget everything stored in `plot`.
    fn evict(&mut self, plot: PlotLocator);
}

/// Which plots a reclamation pass may take back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReclaimPolicy {
    /// Only plots that have gone unused for a while.
    LruOnly,
    /// Every plot not in use by the current flush.
    ForceAll,
}

/// An atlas that places rectangles inside plots of shared page textures.
pub trait AtlasEngine {
    /// Number of plots on every page.
    fn plots_per_page(&self) -> u32;

    /// Reserves a `width` x `height` area and rasterizes into it.
    ///
    /// `rasterize` runs only if space was granted, with the area cleared to zero coverage.
    /// If a plot has to be reclaimed to make room, `evictor` hears about it first. Content
    /// placed here is considered in use by the flush identified by `token`.
    fn add_rect<F>(
        &mut self,
        width: u32,
        height: u32,
        token: AtlasToken,
        evictor: &mut dyn PlotEvictor,
        rasterize: F,
    ) -> Result<AtlasLocator, PlacementError>
    where
        F: FnOnce(&mut MaskTarget<'_>);

    /// Whether `plot` still holds the content it held when the locator was issued.
    fn has_id(&self, plot: PlotLocator) -> bool;

    /// Records that the flush identified by `token` samples from `plot`.
    fn set_last_use_token(&mut self, plot: PlotLocator, token: AtlasToken);

    /// The texture backing page `page_index`, if the page exists.
    fn texture(&self, page_index: u32) -> Option<TextureId>;

    /// Hands every staged region to `target`.
    fn record_uploads(&mut self, target: &mut dyn UploadTarget) -> Result<(), UploadError>;

    /// Reclaims plots according to `policy`, then releases pages nothing lives on.
    fn compact(
        &mut self,
        current_token: AtlasToken,
        policy: ReclaimPolicy,
        evictor: &mut dyn PlotEvictor,
    );

    /// Reclaims every occupied plot.
    fn evict_all_plots(&mut self, evictor: &mut dyn PlotEvictor);

    /// Reclaims every occupied plot and releases all pages.
    fn free_gpu_resources(&mut self, evictor: &mut dyn PlotEvictor);
}
