//! Full-vs-reduced decision and the per-channel reduction cache.
//!
//! Reduced renders use buckets aligned to a global grid of `bucket_width`
//! samples, so a bucket's contents never depend on where the viewport
//! starts. The cache keeps a contiguous run of grid buckets per channel:
//!
//! - same width, viewport inside the run: re-slice (pan, no work);
//! - same width, viewport overlapping or touching the run: compute only the
//!   missing edge buckets and publish an extended copy;
//! - different width (zoom) or a disjoint jump: rebuild around the viewport.
//!
//! Entries are immutable behind an `Arc` and replaced wholesale, so a reader
//! never sees a half-built bucket sequence.

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::downsample::{Bucket, Point, flatten, reduce_grid};
use crate::error::{Error, Result};
use crate::range::ViewRange;
use crate::store::SignalSource;
use crate::transform::TransformChain;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Raw samples, one point per sample.
    Full,
    /// Min/max buckets, up to two points per bucket.
    Reduced,
}

/// A cached run of grid buckets for one channel at one bucket width.
#[derive(Debug)]
pub struct CacheEntry {
    pub channel: usize,
    pub bucket_width: usize,
    pub first_bucket: usize,
    pub buckets: Vec<Bucket>,
}

impl CacheEntry {
    pub fn end_bucket(&self) -> usize {
        self.first_bucket + self.buckets.len()
    }

    /// Sample extent `[start, end)` covered by the cached buckets.
    pub fn extent(&self) -> (usize, usize) {
        match (self.buckets.first(), self.buckets.last()) {
            (Some(first), Some(last)) => (first.start, last.end),
            _ => (0, 0),
        }
    }

    fn covers(&self, first: usize, last: usize) -> bool {
        self.first_bucket <= first && last <= self.end_bucket()
    }

    fn touches(&self, first: usize, last: usize) -> bool {
        first <= self.end_bucket() && self.first_bucket <= last
    }

    fn slice(&self, first: usize, last: usize) -> &[Bucket] {
        let lo = first.saturating_sub(self.first_bucket).min(self.buckets.len());
        let hi = last.saturating_sub(self.first_bucket).clamp(lo, self.buckets.len());
        &self.buckets[lo..hi]
    }
}

/// Counters for cache behaviour, mostly useful in tests and debug output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub full: u64,
    pub hits: u64,
    pub extensions: u64,
    pub rebuilds: u64,
    pub stale_discards: u64,
}

#[derive(Default)]
struct Counters {
    full: AtomicU64,
    hits: AtomicU64,
    extensions: AtomicU64,
    rebuilds: AtomicU64,
    stale_discards: AtomicU64,
}

#[derive(Default)]
struct Slot {
    entry: RwLock<Option<Arc<CacheEntry>>>,
}

impl Slot {
    fn load(&self) -> Option<Arc<CacheEntry>> {
        self.entry.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Outcome of a selection for one channel.
#[derive(Clone, Debug)]
pub struct Selection {
    pub mode: Mode,
    pub bucket_width: Option<usize>,
    pub points: Vec<Point>,
    /// The buckets behind `points`; empty in full mode.
    pub buckets: Vec<Bucket>,
}

pub struct ResolutionSelector {
    config: EngineConfig,
    slots: Vec<Slot>,
    counters: Counters,
}

enum Plan {
    Hit(Arc<CacheEntry>),
    Extend {
        base: Arc<CacheEntry>,
        left: (usize, usize),
        right: (usize, usize),
    },
    Rebuild {
        first: usize,
        last: usize,
    },
}

impl ResolutionSelector {
    pub fn new(channels: usize, config: EngineConfig) -> Self {
        ResolutionSelector {
            config,
            slots: (0..channels).map(|_| Slot::default()).collect(),
            counters: Counters::default(),
        }
    }

    /// Decide the mode for `range` under `budget` points and produce the points.
    pub fn select<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        transforms: &TransformChain,
        channel: usize,
        range: ViewRange,
        budget: usize,
        cancel: &CancelToken,
    ) -> Result<Selection> {
        let budget = budget.max(1);

        if range.len() <= budget {
            let view = transforms.apply(source.channel(channel, range.start(), range.end())?);
            cancel.check()?;
            self.counters.full.fetch_add(1, Ordering::Relaxed);
            return Ok(Selection {
                mode: Mode::Full,
                bucket_width: None,
                points: view
                    .indexed()
                    .map(|(index, value)| Point { index, value })
                    .collect(),
                buckets: Vec::new(),
            });
        }

        let slot = self.slots.get(channel).ok_or(Error::ChannelUnavailable {
            channel,
            channels: self.slots.len(),
        })?;

        let width = range.len().div_ceil(budget);
        let first = range.start() / width;
        let last = range.end().div_ceil(width);
        let total = source.sample_count().div_ceil(width);
        let margin = (budget as f64 * self.config.prefetch_margin).ceil() as usize;
        let cap = budget.saturating_mul(self.config.cache_budget_factor.max(1));

        let plan = match slot.load() {
            Some(entry) if entry.bucket_width == width && entry.covers(first, last) => {
                Plan::Hit(entry)
            }
            Some(entry) if entry.bucket_width == width && entry.touches(first, last) => {
                let left = if first < entry.first_bucket {
                    (first.saturating_sub(margin), entry.first_bucket)
                } else {
                    (entry.first_bucket, entry.first_bucket)
                };
                let right = if last > entry.end_bucket() {
                    (entry.end_bucket(), (last + margin).min(total))
                } else {
                    (entry.end_bucket(), entry.end_bucket())
                };
                if right.1 - left.0 > cap {
                    log::debug!("ch{channel}: extension past cache cap, rebuilding");
                    Plan::Rebuild { first, last }
                } else {
                    Plan::Extend {
                        base: entry,
                        left,
                        right,
                    }
                }
            }
            Some(entry) => {
                if entry.bucket_width != width {
                    log::debug!(
                        "ch{channel}: bucket width {} -> {width}, discarding cache",
                        entry.bucket_width
                    );
                }
                Plan::Rebuild { first, last }
            }
            None => Plan::Rebuild { first, last },
        };

        let entry = match plan {
            Plan::Hit(entry) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                entry
            }
            Plan::Extend { base, left, right } => {
                let before = self.reduce(source, transforms, channel, width, left, cancel)?;
                let after = self.reduce(source, transforms, channel, width, right, cancel)?;
                let mut buckets = Vec::with_capacity(before.len() + base.buckets.len() + after.len());
                buckets.extend(before);
                buckets.extend_from_slice(&base.buckets);
                buckets.extend(after);
                let entry = Arc::new(CacheEntry {
                    channel,
                    bucket_width: width,
                    first_bucket: left.0,
                    buckets,
                });
                self.counters.extensions.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "ch{channel}: extended cache to buckets {}..{}",
                    entry.first_bucket,
                    entry.end_bucket()
                );
                self.publish(slot, Some(&base), Arc::clone(&entry), cancel)?;
                entry
            }
            Plan::Rebuild { first, last } => {
                let lo = first.saturating_sub(margin);
                let hi = (last + margin).min(total).max(last);
                let buckets = self.reduce(source, transforms, channel, width, (lo, hi), cancel)?;
                let entry = Arc::new(CacheEntry {
                    channel,
                    bucket_width: width,
                    first_bucket: lo,
                    buckets,
                });
                self.counters.rebuilds.fetch_add(1, Ordering::Relaxed);
                log::debug!("ch{channel}: rebuilt cache, width {width}, buckets {lo}..{hi}");
                self.publish(slot, None, Arc::clone(&entry), cancel)?;
                entry
            }
        };

        let buckets = entry.slice(first, last).to_vec();
        Ok(Selection {
            mode: Mode::Reduced,
            bucket_width: Some(width),
            points: flatten(&buckets),
            buckets,
        })
    }

    fn reduce<S: SignalSource + ?Sized>(
        &self,
        source: &S,
        transforms: &TransformChain,
        channel: usize,
        width: usize,
        (lo, hi): (usize, usize),
        cancel: &CancelToken,
    ) -> Result<Vec<Bucket>> {
        if lo >= hi {
            return Ok(Vec::new());
        }
        let view = transforms.apply(source.channel(channel, lo * width, hi * width)?);
        reduce_grid(&view, width, lo, hi, self.config.chunk_samples, cancel)
    }

    /// Swap in `entry` unless the request was superseded or, for an
    /// extension, the entry it was built on has since been replaced.
    fn publish(
        &self,
        slot: &Slot,
        base: Option<&Arc<CacheEntry>>,
        entry: Arc<CacheEntry>,
        cancel: &CancelToken,
    ) -> Result<()> {
        let mut guard = slot.entry.write().unwrap_or_else(|e| e.into_inner());
        if cancel.is_cancelled() {
            self.counters.stale_discards.fetch_add(1, Ordering::Relaxed);
            return Err(Error::Cancelled);
        }
        if let Some(base) = base {
            let unchanged = guard.as_ref().is_some_and(|cur| Arc::ptr_eq(cur, base));
            if !unchanged {
                log::debug!("ch{}: cache replaced during extension, not merging", entry.channel);
                self.counters.stale_discards.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }
        *guard = Some(entry);
        Ok(())
    }

    /// Current cache entry for `channel`, if any.
    pub fn cached(&self, channel: usize) -> Option<Arc<CacheEntry>> {
        self.slots.get(channel).and_then(Slot::load)
    }

    pub fn invalidate(&self, channel: usize) {
        if let Some(slot) = self.slots.get(channel) {
            *slot.entry.write().unwrap_or_else(|e| e.into_inner()) = None;
        }
    }

    pub fn clear(&self) {
        for channel in 0..self.slots.len() {
            self.invalidate(channel);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            full: self.counters.full.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            extensions: self.counters.extensions.load(Ordering::Relaxed),
            rebuilds: self.counters.rebuilds.load(Ordering::Relaxed),
            stale_discards: self.counters.stale_discards.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Supersession;
    use crate::store::{ChannelView, MemorySignal};
    use std::sync::atomic::AtomicBool;

    fn signal(n: usize) -> MemorySignal {
        let ch0: Vec<i32> = (0..n)
            .map(|i| ((i as i64 * 7919) % 1013 - 506) as i32)
            .collect();
        let ch1: Vec<i32> = (0..n)
            .map(|i| if i % 1000 == 0 { 9999 } else { (i % 3) as i32 })
            .collect();
        MemorySignal::from_channels(vec![ch0, ch1])
    }

    fn select(
        sel: &ResolutionSelector,
        source: &MemorySignal,
        channel: usize,
        start: usize,
        end: usize,
        budget: usize,
    ) -> Selection {
        sel.select(
            source,
            &TransformChain::new(),
            channel,
            ViewRange::new(start, end).unwrap(),
            budget,
            &CancelToken::never(),
        )
        .unwrap()
    }

    #[test]
    fn test_mode_switch_boundary() {
        let source = signal(10_000);
        let sel = ResolutionSelector::new(2, EngineConfig::default());

        let full = select(&sel, &source, 0, 1000, 1100, 100);
        assert_eq!(full.mode, Mode::Full);
        assert_eq!(full.points.len(), 100);
        assert_eq!(full.points[0].index, 1000);
        assert_eq!(full.points[99].index, 1099);
        assert!(full.buckets.is_empty());

        let reduced = select(&sel, &source, 0, 1000, 1101, 100);
        assert_eq!(reduced.mode, Mode::Reduced);
        assert_eq!(reduced.bucket_width, Some(2));
    }

    #[test]
    fn test_reduced_points_ordered_and_bounded() {
        let source = signal(100_000);
        let sel = ResolutionSelector::new(2, EngineConfig::default());
        let out = select(&sel, &source, 0, 12_345, 98_765, 500);
        assert!(out.points.windows(2).all(|w| w[0].index <= w[1].index));
        assert!(out.buckets.len() <= 501);
        assert!(out.points.len() <= 2 * 501);
        // Every visible sample lies in some returned bucket.
        assert!(out.buckets.first().unwrap().start <= 12_345);
        assert!(out.buckets.last().unwrap().end >= 98_765);
    }

    #[test]
    fn test_reduced_envelope_holds() {
        let source = signal(50_000);
        let sel = ResolutionSelector::new(2, EngineConfig::default());
        let out = select(&sel, &source, 1, 0, 50_000, 37);
        let raw = source.channel(1, 0, 50_000).unwrap().to_vec();
        for b in &out.buckets {
            let part = &raw[b.start..b.end];
            assert_eq!(b.min.value, *part.iter().min().unwrap());
            assert_eq!(b.max.value, *part.iter().max().unwrap());
        }
    }

    #[test]
    fn test_pan_reuses_cache_and_keeps_values() {
        let source = signal(200_000);
        let sel = ResolutionSelector::new(2, EngineConfig::default());

        let a = select(&sel, &source, 0, 50_000, 60_000, 100);
        assert_eq!(sel.stats().rebuilds, 1);
        let before = sel.cached(0).unwrap();

        // Pan inside the prefetched margin: pure re-slice.
        let b = select(&sel, &source, 0, 52_000, 62_000, 100);
        assert_eq!(sel.stats().hits, 1);
        assert_eq!(sel.stats().rebuilds, 1);
        assert!(Arc::ptr_eq(&before, &sel.cached(0).unwrap()));
        assert_eq!(a.bucket_width, b.bucket_width);

        // Overlapping buckets are identical.
        for bucket in &b.buckets {
            if let Some(old) = a.buckets.iter().find(|o| o.start == bucket.start) {
                assert_eq!(old, bucket);
            }
        }
    }

    #[test]
    fn test_pan_past_extent_extends_edges_only() {
        let source = signal(200_000);
        let sel = ResolutionSelector::new(2, EngineConfig::default());
        select(&sel, &source, 0, 50_000, 60_000, 100);
        let before = sel.cached(0).unwrap();
        let (_, old_end) = before.extent();

        // Past the right margin but still touching the cached run.
        let start = old_end - 5_000;
        select(&sel, &source, 0, start, start + 10_000, 100);
        let stats = sel.stats();
        assert_eq!(stats.extensions, 1);
        assert_eq!(stats.rebuilds, 1);

        let after = sel.cached(0).unwrap();
        assert_eq!(after.first_bucket, before.first_bucket);
        assert_eq!(&after.buckets[..before.buckets.len()], &before.buckets[..]);
        assert!(after.end_bucket() > before.end_bucket());
        // The previous entry is untouched (copy-on-write).
        assert_eq!(before.extent().1, old_end);
    }

    #[test]
    fn test_zoom_invalidates() {
        let source = signal(200_000);
        let sel = ResolutionSelector::new(2, EngineConfig::default());
        select(&sel, &source, 0, 0, 100_000, 100);
        assert_eq!(sel.cached(0).unwrap().bucket_width, 1000);
        select(&sel, &source, 0, 0, 50_000, 100);
        assert_eq!(sel.cached(0).unwrap().bucket_width, 500);
        assert_eq!(sel.stats().rebuilds, 2);
        assert_eq!(sel.stats().hits, 0);
    }

    #[test]
    fn test_disjoint_jump_rebuilds() {
        let source = signal(1_000_000);
        let sel = ResolutionSelector::new(2, EngineConfig::default());
        select(&sel, &source, 0, 0, 10_000, 100);
        select(&sel, &source, 0, 900_000, 910_000, 100);
        assert_eq!(sel.stats().rebuilds, 2);
        assert_eq!(sel.stats().extensions, 0);
        let (start, end) = sel.cached(0).unwrap().extent();
        assert!(start <= 900_000 && end >= 910_000);
    }

    #[test]
    fn test_channels_cached_independently() {
        let source = signal(100_000);
        let sel = ResolutionSelector::new(2, EngineConfig::default());
        select(&sel, &source, 0, 0, 100_000, 100);
        assert!(sel.cached(1).is_none());
        select(&sel, &source, 1, 0, 10_000, 100);
        assert_eq!(sel.cached(0).unwrap().bucket_width, 1000);
        assert_eq!(sel.cached(1).unwrap().bucket_width, 100);
        sel.invalidate(0);
        assert!(sel.cached(0).is_none());
        sel.clear();
        assert!(sel.cached(1).is_none());
    }

    #[test]
    fn test_superseded_request_leaves_cache_alone() {
        let source = signal(100_000);
        let sel = ResolutionSelector::new(2, EngineConfig::default());
        select(&sel, &source, 0, 0, 100_000, 100);
        let before = sel.cached(0).unwrap();

        let sup = Supersession::new();
        let stale = sup.issue();
        sup.issue();
        let err = sel
            .select(
                &source,
                &TransformChain::new(),
                0,
                ViewRange::new(0, 10_000).unwrap(),
                100,
                &stale,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(Arc::ptr_eq(&before, &sel.cached(0).unwrap()));
    }

    /// Zooms the shared selector from inside the next read once armed, so an
    /// extension in flight finds its base entry replaced when it publishes.
    struct ZoomDuringRead {
        inner: MemorySignal,
        selector: Arc<ResolutionSelector>,
        armed: AtomicBool,
    }

    impl SignalSource for ZoomDuringRead {
        fn channel_count(&self) -> usize {
            self.inner.channel_count()
        }

        fn sample_count(&self) -> usize {
            self.inner.sample_count()
        }

        fn channel(&self, channel: usize, start: usize, end: usize) -> Result<ChannelView<'_>> {
            if self.armed.swap(false, Ordering::SeqCst) {
                select(&self.selector, &self.inner, channel, 0, 100_000, 100);
            }
            self.inner.channel(channel, start, end)
        }
    }

    #[test]
    fn test_extension_over_replaced_entry_is_not_merged() {
        let sel = Arc::new(ResolutionSelector::new(2, EngineConfig::default()));
        let source = ZoomDuringRead {
            inner: signal(200_000),
            selector: Arc::clone(&sel),
            armed: AtomicBool::new(false),
        };
        let never = CancelToken::never();
        let chain = TransformChain::new();

        let first = sel
            .select(&source, &chain, 0, ViewRange::new(0, 10_000).unwrap(), 100, &never)
            .unwrap();
        assert_eq!(first.bucket_width, Some(100));
        assert_eq!(sel.cached(0).unwrap().end_bucket(), 200);

        // Panning right needs buckets 200..350; the zoom lands while they are read.
        source.armed.store(true, Ordering::SeqCst);
        let panned = sel
            .select(&source, &chain, 0, ViewRange::new(15_000, 25_000).unwrap(), 100, &never)
            .unwrap();
        assert_eq!(panned.mode, Mode::Reduced);
        assert_eq!(panned.bucket_width, Some(100));
        assert_eq!(panned.buckets.first().unwrap().start, 15_000);
        assert_eq!(panned.buckets.last().unwrap().end, 25_000);

        assert_eq!(sel.cached(0).unwrap().bucket_width, 1000);
        let stats = sel.stats();
        assert_eq!(stats.extensions, 1);
        assert_eq!(stats.rebuilds, 2);
        assert_eq!(stats.stale_discards, 1);
    }
}
