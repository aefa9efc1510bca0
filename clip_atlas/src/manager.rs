// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The clip mask cache.

use crate::atlas::upload::{MaskTarget, UploadTarget};
use crate::atlas::{AtlasConfig, AtlasEngine, DrawAtlas, ReclaimPolicy};
use crate::error::UploadError;
use crate::index::MaskIndex;
use crate::key::{ClipElement, ClipMaskKey};
use crate::locator::{AtlasLocator, AtlasToken, PlotLocator, TextureId};
use crate::math::{IntPoint, IntRect};

/// Transparent border, in pixels, kept around every mask so that filtering never samples a
/// neighbor.
pub const MASK_PADDING: u32 = 1;

/// Produces mask coverage for a list of clip elements.
///
/// Implemented by the rendering front end. `target` covers exactly `bounds`: pixel `(0, 0)`
/// of the target is device pixel `(bounds.x0, bounds.y0)`. The target starts out fully
/// transparent.
pub trait MaskRasterizer {
    /// Rasterizes the combined coverage of `elements` into `target`.
    fn rasterize(&mut self, elements: &[ClipElement], bounds: IntRect, target: &mut MaskTarget<'_>);
}

impl<F> MaskRasterizer for F
where
    F: FnMut(&[ClipElement], IntRect, &mut MaskTarget<'_>),
{
    fn rasterize(&mut self, elements: &[ClipElement], bounds: IntRect, target: &mut MaskTarget<'_>) {
        self(elements, bounds, target);
    }
}

/// A clip mask ready to be sampled once uploads for the current flush are recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipMask {
    /// The page texture holding the mask.
    pub texture: TextureId,
    /// Top-left pixel of the mask inside the texture, padding excluded.
    pub offset: IntPoint,
    /// The atlas allocation, padding included.
    pub locator: AtlasLocator,
}

impl ClipMask {
    fn new(texture: TextureId, locator: AtlasLocator) -> Self {
        let top_left = locator.top_left();
        Self {
            texture,
            offset: IntPoint::new(
                top_left.x + MASK_PADDING as i32,
                top_left.y + MASK_PADDING as i32,
            ),
            locator,
        }
    }
}

/// Statistics about cached clip masks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipAtlasStats {
    /// Masks currently cached.
    pub entries: usize,
    /// Records in the per-plot lists. Always equal to `entries`.
    pub list_entries: usize,
    /// Plots holding at least one cached mask.
    pub occupied_plots: usize,
    /// Lookups answered from the cache since the last `clear_stats()`.
    pub hits: u64,
    /// Lookups that had to place a mask since the last `clear_stats()`.
    pub misses: u64,
    /// Masks placed and rasterized since the last `clear_stats()`.
    pub placements: u64,
    /// Misses the atlas could not place since the last `clear_stats()`.
    pub placement_failures: u64,
    /// Masks dropped because their plot was reclaimed since the last `clear_stats()`.
    pub evicted_entries: u64,
    /// Plot eviction notices handled since the last `clear_stats()`.
    pub plot_evictions: u64,
}

/// Caches rasterized clip masks in an atlas.
///
/// Each distinct [`ClipMaskKey`] is rasterized once and then served from the atlas until the
/// atlas reclaims the plot holding it. Reclamation reaches the cache through the
/// [`PlotEvictor`](crate::PlotEvictor) callback, which removes exactly the masks stored in
/// the reclaimed plot.
///
/// One manager belongs to one recording context and is used from one thread; it owns its
/// atlas outright.
pub struct ClipAtlasManager<A: AtlasEngine = DrawAtlas> {
    atlas: A,
    index: MaskIndex,
    /// The flush currently being recorded.
    token: AtlasToken,
    hits: u64,
    misses: u64,
    placements: u64,
    placement_failures: u64,
}

impl ClipAtlasManager<DrawAtlas> {
    /// Creates a manager backed by a [`DrawAtlas`] with the given configuration.
    pub fn new(config: AtlasConfig) -> Self {
        Self::with_engine(DrawAtlas::new(config))
    }
}

impl Default for ClipAtlasManager<DrawAtlas> {
    fn default() -> Self {
        Self::new(AtlasConfig::default())
    }
}

impl<A: AtlasEngine> ClipAtlasManager<A> {
    /// Creates a manager that places masks with `atlas`.
    pub fn with_engine(atlas: A) -> Self {
        let plots_per_page = atlas.plots_per_page();
        Self {
            atlas,
            index: MaskIndex::new(plots_per_page),
            token: AtlasToken::INITIAL,
            hits: 0,
            misses: 0,
            placements: 0,
            placement_failures: 0,
        }
    }

    /// The atlas engine.
    pub fn atlas(&self) -> &A {
        &self.atlas
    }

    /// The token of the flush currently being recorded.
    #[inline]
    pub fn current_token(&self) -> AtlasToken {
        self.token
    }

    /// Ends the current flush.
    ///
    /// Masks used so far may be reclaimed once no later flush uses them.
    pub fn advance_flush(&mut self) {
        self.token = self.token.next();
    }

    /// Returns the atlas location of the mask for `elements` clipped to `bounds`, rasterizing
    /// it with `rasterizer` if it is not cached yet.
    ///
    /// A hit never places or rasterizes anything. It still asks the atlas whether the plot is
    /// live and records that the current flush samples from it (`has_id`, `texture` and
    /// `set_last_use_token`), so the plot is not reclaimed while the flush is recorded.
    ///
    /// Returns `None` if the mask cannot be placed, even after reclaiming plots. The caller
    /// should then clip without the atlas. Nothing is cached in that case.
    pub fn find_or_create_entry<R>(
        &mut self,
        stack_record_id: u32,
        elements: &[ClipElement],
        bounds: IntRect,
        rasterizer: &mut R,
    ) -> Option<ClipMask>
    where
        R: MaskRasterizer + ?Sized,
    {
        let key = ClipMaskKey::new(stack_record_id, elements, bounds);

        if let Some(entry) = self.index.get(&key).copied() {
            let live = self.atlas.has_id(entry.locator.plot);
            debug_assert!(live, "cached clip mask points at a reclaimed plot");
            if live {
                if let Some(texture) = self.atlas.texture(entry.locator.page_index()) {
                    self.atlas.set_last_use_token(entry.locator.plot, self.token);
                    self.hits += 1;
                    log::trace!("clip atlas: hit for record {stack_record_id} at {bounds:?}");
                    return Some(ClipMask::new(texture, entry.locator));
                }
            }
            self.index.remove_stale(&key);
        }

        self.misses += 1;
        let Some(locator) = self.add_to_atlas(elements, bounds, rasterizer) else {
            self.placement_failures += 1;
            return None;
        };
        let inserted = self.index.insert(key, bounds, locator);
        debug_assert!(inserted, "clip mask inserted twice");
        self.placements += 1;
        self.debug_check();

        let texture = self.atlas.texture(locator.page_index())?;
        Some(ClipMask::new(texture, locator))
    }

    fn add_to_atlas<R>(
        &mut self,
        elements: &[ClipElement],
        bounds: IntRect,
        rasterizer: &mut R,
    ) -> Option<AtlasLocator>
    where
        R: MaskRasterizer + ?Sized,
    {
        if bounds.is_empty() {
            log::trace!("clip atlas: not caching empty mask {bounds:?}");
            return None;
        }
        let width = bounds.width() + 2 * MASK_PADDING;
        let height = bounds.height() + 2 * MASK_PADDING;
        let result = self.atlas.add_rect(
            width,
            height,
            self.token,
            &mut self.index,
            |target| rasterizer.rasterize(elements, bounds, &mut target.inset(MASK_PADDING)),
        );
        match result {
            Ok(locator) => Some(locator),
            Err(err) => {
                log::warn!("clip atlas: cannot place {width}x{height} mask: {err}");
                None
            }
        }
    }

    /// Copies every mask rasterized since the last successful call into its page texture.
    ///
    /// On failure, masks stay cached but must not be sampled until a later call succeeds.
    pub fn record_uploads(&mut self, target: &mut dyn UploadTarget) -> Result<(), UploadError> {
        self.atlas.record_uploads(target)
    }

    /// Forgets every mask stored in `plot`.
    ///
    /// This is what the atlas calls before reusing a plot; calling it directly only drops the
    /// cache entries.
    pub fn evict(&mut self, plot: PlotLocator) {
        crate::atlas::PlotEvictor::evict(&mut self.index, plot);
        self.debug_check();
    }

    /// Asks the atlas to reclaim plots to save memory.
    ///
    /// Without `force_compact` only plots unused for a while are reclaimed; with it, every
    /// plot the current flush does not use.
    pub fn compact(&mut self, force_compact: bool) {
        let policy = if force_compact {
            ReclaimPolicy::ForceAll
        } else {
            ReclaimPolicy::LruOnly
        };
        self.atlas.compact(self.token, policy, &mut self.index);
        self.debug_check();
    }

    /// Evicts every mask from the atlas.
    pub fn evict_atlases(&mut self) {
        self.atlas.evict_all_plots(&mut self.index);
        debug_assert_eq!(self.index.len(), 0, "masks survived evicting every plot");
        self.index.clear();
        log::debug!("clip atlas: evicted all plots");
    }

    /// Releases the atlas textures and forgets every mask.
    ///
    /// Later lookups behave as on a new manager. The flush token keeps counting so that
    /// last-use tokens an engine still holds never appear newer than the current flush.
    pub fn free_gpu_resources(&mut self) {
        self.atlas.free_gpu_resources(&mut self.index);
        self.index.clear();
        self.clear_stats();
        log::debug!("clip atlas: released GPU resources");
    }

    /// Number of cached masks.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no mask is cached.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.len() == 0
    }

    /// Current statistics.
    pub fn stats(&self) -> ClipAtlasStats {
        let counters = self.index.counters();
        ClipAtlasStats {
            entries: self.index.len(),
            list_entries: self.index.list_entry_count(),
            occupied_plots: self.index.occupied_plots(),
            hits: self.hits,
            misses: self.misses,
            placements: self.placements,
            placement_failures: self.placement_failures,
            evicted_entries: counters.evicted_entries,
            plot_evictions: counters.plot_evictions,
        }
    }

    /// Clears statistics counters without touching the cache.
    pub fn clear_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.placements = 0;
        self.placement_failures = 0;
        self.index.clear_counters();
    }

    /// Whether every cached mask is linked from exactly its plot's list and still lives in
    /// the atlas.
    pub fn check_consistency(&self) -> bool {
        self.index.is_consistent()
            && self
                .index
                .entries()
                .all(|(_, entry)| self.atlas.has_id(entry.locator.plot))
    }

    #[inline]
    fn debug_check(&self) {
        debug_assert!(
            self.check_consistency(),
            "clip mask cache and plot lists disagree"
        );
    }
}

impl<A: AtlasEngine + core::fmt::Debug> core::fmt::Debug for ClipAtlasManager<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClipAtlasManager")
            .field("atlas", &self.atlas)
            .field("index", &self.index)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ClipShape;
    use crate::kurbo::Rect;

    struct SolidRasterizer {
        calls: usize,
    }

    impl MaskRasterizer for SolidRasterizer {
        fn rasterize(&mut self, _: &[ClipElement], bounds: IntRect, target: &mut MaskTarget<'_>) {
            assert_eq!(target.width(), bounds.width(), "target must match the mask bounds");
            assert_eq!(target.height(), bounds.height(), "target must match the mask bounds");
            self.calls += 1;
            target.fill(255);
        }
    }

    fn elements() -> [ClipElement; 1] {
        [ClipElement::new(
            5,
            ClipShape::Rect(Rect::new(0.0, 0.0, 10.0, 10.0)),
        )]
    }

    #[test]
    fn offset_skips_padding() {
        let mut manager = ClipAtlasManager::new(AtlasConfig::default());
        let mut rasterizer = SolidRasterizer { calls: 0 };
        let mask = manager
            .find_or_create_entry(1, &elements(), IntRect::new(0, 0, 10, 10), &mut rasterizer)
            .unwrap();
        assert_eq!(mask.locator.rect.width(), 10 + 2 * MASK_PADDING);
        assert_eq!(
            mask.offset,
            IntPoint::new(
                mask.locator.rect.x0 + MASK_PADDING as i32,
                mask.locator.rect.y0 + MASK_PADDING as i32
            )
        );
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let mut manager = ClipAtlasManager::new(AtlasConfig::default());
        let mut rasterizer = SolidRasterizer { calls: 0 };
        let bounds = IntRect::new(3, 4, 13, 14);
        let first = manager.find_or_create_entry(1, &elements(), bounds, &mut rasterizer);
        let second = manager.find_or_create_entry(1, &elements(), bounds, &mut rasterizer);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(rasterizer.calls, 1);
        let stats = manager.stats();
        assert_eq!((stats.hits, stats.misses, stats.placements), (1, 1, 1));
    }

    #[test]
    fn empty_bounds_are_not_cached() {
        let mut manager = ClipAtlasManager::new(AtlasConfig::default());
        let mut rasterizer = SolidRasterizer { calls: 0 };
        let mask =
            manager.find_or_create_entry(1, &elements(), IntRect::new(5, 5, 5, 9), &mut rasterizer);
        assert!(mask.is_none());
        assert!(manager.is_empty());
        assert_eq!(rasterizer.calls, 0);
        assert_eq!(manager.stats().placement_failures, 1);
    }
}
