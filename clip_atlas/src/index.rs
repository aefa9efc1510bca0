// Copyright 2025 the Clip Atlas Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forward mask cache and per-plot reverse index.

use alloc::vec::Vec;
use hashbrown::HashMap;
use hashbrown::hash_map::Entry;

use crate::atlas::PlotEvictor;
use crate::key::ClipMaskKey;
use crate::locator::{AtlasLocator, PlotLocator};
use crate::math::IntRect;

/// A mask that is present in the atlas.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MaskEntry {
    /// The bounds the mask was requested for.
    pub(crate) bounds: IntRect,
    /// Where the padded mask lives.
    pub(crate) locator: AtlasLocator,
}

/// Reverse link from a plot to a mask stored in it.
#[derive(Clone, Debug)]
struct MaskKeyEntry {
    key: ClipMaskKey,
    bounds: IntRect,
}

/// Counters maintained by the index.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct IndexCounters {
    /// Entries removed because their plot was reclaimed.
    pub(crate) evicted_entries: u64,
    /// Plot eviction notices received, including those for plots holding no mask.
    pub(crate) plot_evictions: u64,
}

/// Every cached mask, reachable both by key and by the plot holding it.
///
/// Both directions are only ever changed together, by [`MaskIndex::insert`] and by
/// [`PlotEvictor::evict`], so for every plot the keys in its list are exactly the cached keys
/// whose locator names that plot.
pub(crate) struct MaskIndex {
    cache: HashMap<ClipMaskKey, MaskEntry>,
    /// One list per plot, indexed by `page_index * plots_per_page + plot_index`.
    key_lists: Vec<Vec<MaskKeyEntry>>,
    plots_per_page: u32,
    list_entry_count: usize,
    counters: IndexCounters,
}

impl MaskIndex {
    pub(crate) fn new(plots_per_page: u32) -> Self {
        Self {
            cache: HashMap::new(),
            key_lists: Vec::new(),
            plots_per_page: plots_per_page.max(1),
            list_entry_count: 0,
            counters: IndexCounters::default(),
        }
    }

    fn list_index(&self, plot: &PlotLocator) -> usize {
        plot.page_index as usize * self.plots_per_page as usize + plot.plot_index as usize
    }

    pub(crate) fn get(&self, key: &ClipMaskKey) -> Option<&MaskEntry> {
        self.cache.get(key)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&ClipMaskKey, &MaskEntry)> {
        self.cache.iter()
    }

    /// Records a freshly placed mask under `key`.
    ///
    /// Returns `false` and leaves the index untouched if `key` is already present.
    pub(crate) fn insert(&mut self, key: ClipMaskKey, bounds: IntRect, locator: AtlasLocator) -> bool {
        let list_index = self.list_index(&locator.plot);
        let reverse_key = match self.cache.entry(key) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(vacant) => {
                let reverse_key = vacant.key().clone();
                vacant.insert(MaskEntry { bounds, locator });
                reverse_key
            }
        };
        if self.key_lists.len() <= list_index {
            self.key_lists.resize_with(list_index + 1, Vec::new);
        }
        self.key_lists[list_index].push(MaskKeyEntry {
            key: reverse_key,
            bounds,
        });
        self.list_entry_count += 1;
        true
    }

    /// Removes the entry for `key`, which must have been found stale.
    pub(crate) fn remove_stale(&mut self, key: &ClipMaskKey) {
        let Some(entry) = self.cache.remove(key) else {
            return;
        };
        let list_index = self.list_index(&entry.locator.plot);
        if let Some(list) = self.key_lists.get_mut(list_index) {
            if let Some(position) = list.iter().position(|record| record.key == *key) {
                list.swap_remove(position);
                self.list_entry_count -= 1;
            }
        }
    }

    /// Drops every entry and every plot list.
    pub(crate) fn clear(&mut self) {
        self.cache.clear();
        self.key_lists.clear();
        self.list_entry_count = 0;
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }

    #[inline]
    pub(crate) fn list_entry_count(&self) -> usize {
        self.list_entry_count
    }

    /// Number of plots with at least one cached mask.
    pub(crate) fn occupied_plots(&self) -> usize {
        self.key_lists.iter().filter(|list| !list.is_empty()).count()
    }

    pub(crate) fn counters(&self) -> IndexCounters {
        self.counters
    }

    pub(crate) fn clear_counters(&mut self) {
        self.counters = IndexCounters::default();
    }

    /// Checks that the cache and the plot lists describe the same set of masks.
    pub(crate) fn is_consistent(&self) -> bool {
        if self.cache.len() != self.list_entry_count {
            return false;
        }
        let mut listed = 0;
        for (list_index, list) in self.key_lists.iter().enumerate() {
            for record in list {
                listed += 1;
                let Some(entry) = self.cache.get(&record.key) else {
                    return false;
                };
                if entry.bounds != record.bounds || self.list_index(&entry.locator.plot) != list_index
                {
                    return false;
                }
            }
        }
        listed == self.list_entry_count
    }
}

impl PlotEvictor for MaskIndex {
    fn evict(&mut self, plot: PlotLocator) {
        self.counters.plot_evictions += 1;
        let list_index = self.list_index(&plot);
        let Some(list) = self.key_lists.get_mut(list_index) else {
            return;
        };
        let records = core::mem::take(list);
        let evicted = records.len();
        for record in records {
            let removed = self.cache.remove(&record.key);
            debug_assert!(
                removed.is_some_and(|entry| {
                    entry.locator.plot.same_plot(&plot) && entry.bounds == record.bounds
                }),
                "plot list names a mask that is not cached in that plot"
            );
        }
        self.list_entry_count -= evicted;
        self.counters.evicted_entries += evicted as u64;
        if evicted > 0 {
            log::debug!(
                "clip atlas: evicted {evicted} masks from page {} plot {}",
                plot.page_index,
                plot.plot_index
            );
        }
    }
}

impl core::fmt::Debug for MaskIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MaskIndex")
            .field("entries", &self.cache.len())
            .field("list_entries", &self.list_entry_count)
            .field("plots_per_page", &self.plots_per_page)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{ClipElement, ClipShape};
    use crate::kurbo::Rect;
    use crate::locator::AtlasGenerationCounter;

    fn key(record: u32) -> ClipMaskKey {
        let element = ClipElement::new(1, ClipShape::Rect(Rect::new(0.0, 0.0, 4.0, 4.0)));
        ClipMaskKey::new(record, &[element], IntRect::new(0, 0, 4, 4))
    }

    fn locator(plot: PlotLocator) -> AtlasLocator {
        AtlasLocator {
            plot,
            rect: IntRect::new(0, 0, 6, 6),
        }
    }

    #[test]
    fn insert_links_both_directions() {
        let mut counter = AtlasGenerationCounter::new();
        let plot = PlotLocator::new(1, 2, counter.next_generation());
        let mut index = MaskIndex::new(4);
        assert!(index.insert(key(1), IntRect::new(0, 0, 4, 4), locator(plot)));
        assert!(!index.insert(key(1), IntRect::new(0, 0, 4, 4), locator(plot)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.list_entry_count(), 1);
        assert_eq!(index.key_lists.len(), 7);
        assert!(index.is_consistent());
    }

    #[test]
    fn evict_only_touches_its_plot() {
        let mut counter = AtlasGenerationCounter::new();
        let a = PlotLocator::new(0, 0, counter.next_generation());
        let b = PlotLocator::new(0, 1, counter.next_generation());
        let mut index = MaskIndex::new(4);
        for record in 0..3 {
            index.insert(key(record), IntRect::new(0, 0, 4, 4), locator(a));
        }
        index.insert(key(10), IntRect::new(0, 0, 4, 4), locator(b));

        index.evict(a);
        assert_eq!(index.len(), 1);
        assert!(index.get(&key(10)).is_some());
        assert!(index.get(&key(0)).is_none());
        assert_eq!(index.counters().evicted_entries, 3);
        assert_eq!(index.counters().plot_evictions, 1);
        assert!(index.is_consistent());

        // Evicting an empty or unknown plot is a no-op.
        index.evict(a);
        index.evict(PlotLocator::new(9, 0, counter.next_generation()));
        assert_eq!(index.counters().evicted_entries, 3);
        assert_eq!(index.counters().plot_evictions, 3);
    }

    #[test]
    fn remove_stale_unlinks_reverse_record() {
        let mut counter = AtlasGenerationCounter::new();
        let plot = PlotLocator::new(0, 3, counter.next_generation());
        let mut index = MaskIndex::new(4);
        index.insert(key(1), IntRect::new(0, 0, 4, 4), locator(plot));
        index.insert(key(2), IntRect::new(0, 0, 4, 4), locator(plot));
        index.remove_stale(&key(1));
        assert_eq!(index.len(), 1);
        assert_eq!(index.list_entry_count(), 1);
        assert!(index.is_consistent());
    }
}
