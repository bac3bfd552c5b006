//! Read-mostly cache over the latest `Snapshot`.
//!
//! One `RwLock` guards the snapshot handle, its generation and the memo
//! tables. Queries take the read side; `rebuild` and `invalidate` take the
//! write side, so a reader sees either the old snapshot with its memo or the
//! new one with an empty memo. Memo inserts happen under the read guard
//! through an inner mutex and therefore never overlap a swap.
//!
//! `rebuild` holds the write guard while the builder runs: readers arriving
//! mid-build wait for the swap instead of reading the outgoing snapshot.
//!
//! Only keys present in the snapshot are memoized, so the memo never holds
//! more than one entry per region and per year of the current generation.

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::builder::{BuildOptions, Builder};
use super::order::CanonicalOrder;
use super::types::{BuildReport, RawRecord, RegionSeries, Snapshot, YearSummary};
use crate::error::BuildError;

#[derive(Debug, Default)]
struct Memo {
    regions: AHashMap<(String, u64), Arc<RegionSeries>>,
    years: AHashMap<(i32, u64), YearSummary>,
}

impl Memo {
    fn clear(&mut self) {
        self.regions.clear();
        self.years.clear();
    }

    fn len(&self) -> usize {
        self.regions.len() + self.years.len()
    }
}

#[derive(Debug, Default)]
struct State {
    snapshot: Option<Arc<Snapshot>>,
    generation: u64,
    memo: Mutex<Memo>,
}

/// Memo counters, mostly for tests and the CLI summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
pub struct StatsCache {
    order: CanonicalOrder,
    builder: Builder,
    state: RwLock<State>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StatsCache {
    /// Starts empty; call `rebuild` to load data.
    pub fn new(order: CanonicalOrder, opts: BuildOptions) -> Self {
        Self {
            order,
            builder: Builder::new(opts),
            state: RwLock::new(State::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn order(&self) -> &CanonicalOrder {
        &self.order
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn is_loaded(&self) -> bool {
        self.state.read().snapshot.is_some()
    }

    /// Current snapshot handle, for callers that need several answers from
    /// the same generation.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.read().snapshot.clone()
    }

    pub fn report(&self) -> Option<BuildReport> {
        self.state.read().snapshot.as_ref().map(|s| s.report.clone())
    }

    /// Regions with data, in canonical order.
    pub fn list_regions(&self) -> Vec<String> {
        let state = self.state.read();
        match &state.snapshot {
            Some(snap) => self.order.filter_present(|name| snap.has_region(name)),
            None => Vec::new(),
        }
    }

    /// Distinct years present, most recent first.
    pub fn years(&self) -> Vec<i32> {
        let state = self.state.read();
        state
            .snapshot
            .as_ref()
            .map(|s| s.years_desc.clone())
            .unwrap_or_default()
    }

    pub fn region_series(&self, region: &str) -> Option<Arc<RegionSeries>> {
        let state = self.state.read();
        let snap = state.snapshot.as_ref()?;
        let key = (region.to_string(), state.generation);

        if let Some(hit) = state.memo.lock().regions.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(Arc::clone(hit));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = snap.region(region)?;
        let mut memo = state.memo.lock();
        let out = memo.regions.entry(key).or_insert_with(|| Arc::clone(value));
        Some(Arc::clone(out))
    }

    pub fn year_summary(&self, year: i32) -> Option<YearSummary> {
        let state = self.state.read();
        let snap = state.snapshot.as_ref()?;
        let key = (year, state.generation);

        if let Some(hit) = state.memo.lock().years.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(*hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = *snap.year(year)?;
        let out = *state.memo.lock().years.entry(key).or_insert(value);
        Some(out)
    }

    pub fn memo_stats(&self) -> MemoStats {
        let entries = self.state.read().memo.lock().len();
        MemoStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }

    /// Drop the snapshot and every memoized answer. Queries return empty
    /// until the next successful `rebuild`.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.snapshot = None;
        state.generation += 1;
        state.memo.get_mut().clear();
        tracing::debug!(generation = state.generation, "cache invalidated");
    }

    /// Build a fresh snapshot and swap it in. On error the previous snapshot,
    /// generation and memo stay as they were.
    pub fn rebuild(&self, raw: &[RawRecord]) -> Result<BuildReport, BuildError> {
        let mut state = self.state.write();
        let snapshot = match self.builder.build(raw) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!(%err, kept_generation = state.generation, "rebuild failed; keeping previous snapshot");
                return Err(err);
            }
        };
        let report = snapshot.report.clone();
        state.snapshot = Some(Arc::new(snapshot));
        state.generation += 1;
        state.memo.get_mut().clear();
        tracing::info!(generation = state.generation, "snapshot published");
        Ok(report)
    }

    /// Explicit teardown for the owning component.
    pub fn shutdown(&self) {
        let stats = self.memo_stats();
        self.invalidate();
        tracing::info!(hits = stats.hits, misses = stats.misses, "stats cache shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> StatsCache {
        StatsCache::new(
            CanonicalOrder::new(["A", "B", "C"]),
            BuildOptions {
                workers: 2,
                sentinel: "ALL".into(),
                progress: false,
            },
        )
    }

    fn sample() -> Vec<RawRecord> {
        vec![
            RawRecord::complete("C", 2020, 5, 1, 2, 40.0),
            RawRecord::complete("A", 2020, 10, 1, 5, 50.0),
            RawRecord::complete("A", 2021, 12, 2, 6, 50.0),
        ]
    }

    #[test]
    fn empty_before_first_build() {
        let c = cache();
        assert!(!c.is_loaded());
        assert!(c.list_regions().is_empty());
        assert!(c.region_series("A").is_none());
        assert!(c.year_summary(2020).is_none());
        assert!(c.years().is_empty());
        assert_eq!(c.memo_stats().entries, 0);
    }

    #[test]
    fn memo_returns_same_arc() {
        let c = cache();
        c.rebuild(&sample()).unwrap();
        let a1 = c.region_series("A").unwrap();
        let a2 = c.region_series("A").unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        let stats = c.memo_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn unknown_keys_do_not_grow_memo() {
        let c = cache();
        c.rebuild(&sample()).unwrap();
        for n in 0..10_000 {
            assert!(c.region_series(&format!("nope{n}")).is_none());
            assert!(c.year_summary(3000 + n).is_none());
        }
        assert_eq!(c.memo_stats().entries, 0);

        // known keys: at most one entry each, however often they are asked for
        for _ in 0..50 {
            let _ = c.region_series("A");
            let _ = c.region_series("C");
            let _ = c.year_summary(2020);
            let _ = c.year_summary(2021);
        }
        let stats = c.memo_stats();
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.misses, 20_000 + 4);
    }

    #[test]
    fn rebuild_clears_memo_and_bumps_generation() {
        let c = cache();
        c.rebuild(&sample()).unwrap();
        let g1 = c.generation();
        let before = c.region_series("A").unwrap();

        let next = vec![RawRecord::complete("A", 2022, 1, 0, 1, 100.0)];
        c.rebuild(&next).unwrap();
        assert!(c.generation() > g1);
        assert_eq!(c.memo_stats().entries, 0);
        let after = c.region_series("A").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.years(), vec![2022]);
        assert_eq!(c.list_regions(), vec!["A"]);
    }

    #[test]
    fn invalidate_empties_everything() {
        let c = cache();
        c.rebuild(&sample()).unwrap();
        let _ = c.region_series("A");
        c.invalidate();
        assert!(!c.is_loaded());
        assert!(c.region_series("A").is_none());
        assert!(c.year_summary(2020).is_none());
        assert!(c.list_regions().is_empty());
        assert_eq!(c.memo_stats().entries, 0);

        c.rebuild(&sample()).unwrap();
        assert_eq!(c.list_regions(), vec!["A", "C"]);
    }

    #[test]
    fn failed_rebuild_keeps_previous_snapshot() {
        let c = cache();
        c.rebuild(&sample()).unwrap();
        let g = c.generation();
        let _ = c.year_summary(2020);

        assert!(matches!(c.rebuild(&[]), Err(BuildError::EmptyInput)));
        assert_eq!(c.generation(), g);
        assert_eq!(c.memo_stats().entries, 1);
        assert_eq!(c.year_summary(2020).unwrap().total_registrations, 15);
    }

    #[test]
    fn shutdown_drops_data() {
        let c = cache();
        c.rebuild(&sample()).unwrap();
        c.shutdown();
        assert!(!c.is_loaded());
        assert!(c.report().is_none());
    }
}
