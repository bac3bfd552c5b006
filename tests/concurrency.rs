// tests/concurrency.rs
//
// Worker-count independence of the builder and reader/rebuild interleaving.
//
use std::sync::Arc;
use std::thread;

use regstats::{BuildOptions, Builder, CanonicalOrder, RawRecord, Snapshot, StatsCache};

fn fixture(regions: usize, years: std::ops::Range<i32>) -> Vec<RawRecord> {
    let mut raw = Vec::new();
    for r in 0..regions {
        for year in years.clone() {
            let reg = (r as i64 * 37 + year as i64 * 11) % 5000 + 10;
            let rate = ((r * 7 + year as usize) % 100) as f64 + 0.25;
            raw.push(RawRecord::complete(format!("R{r:02}"), year, reg, reg / 3, reg / 2, rate));
        }
    }
    raw.push(RawRecord::complete("全臺", years.start, 1, 1, 1, 1.0));
    raw
}

fn opts(workers: usize) -> BuildOptions {
    BuildOptions {
        workers,
        sentinel: "全臺".into(),
        progress: false,
    }
}

fn assert_same(a: &Snapshot, b: &Snapshot) {
    assert_eq!(a.regions.len(), b.regions.len());
    for (name, series) in &a.regions {
        assert_eq!(Some(series), b.regions.get(name), "region {name}");
    }
    assert_eq!(a.years, b.years);
    assert_eq!(a.years_desc, b.years_desc);
    assert_eq!(a.report, b.report);
}

#[test]
fn single_and_multi_worker_builds_agree() {
    let raw = fixture(22, 2009..2024);
    let one = Builder::new(opts(1)).build(&raw).unwrap();
    for workers in [2, 4, 8] {
        let many = Builder::new(opts(workers)).build(&raw).unwrap();
        assert_same(&one, &many);
    }
    assert_eq!(one.regions.len(), 22);
    assert_eq!(one.years.len(), 15);
}

#[test]
fn readers_never_see_mixed_generations() {
    let first = fixture(6, 2010..2015);
    let second: Vec<RawRecord> = fixture(6, 2010..2015)
        .into_iter()
        .map(|mut r| {
            r.registrations = r.registrations.map(|v| v + 1_000_000);
            r
        })
        .collect();

    let order = CanonicalOrder::new((0..6).map(|r| format!("R{r:02}")));
    let cache = Arc::new(StatsCache::new(order, opts(4)));
    cache.rebuild(&first).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..200 {
                    let Some(snap) = cache.snapshot() else { continue };
                    // every region in one snapshot comes from the same input set
                    let big: Vec<bool> = snap
                        .regions
                        .values()
                        .map(|s| s.records()[0].registrations >= 1_000_000)
                        .collect();
                    assert!(big.iter().all(|&b| b == big[0]));

                    if let Some(series) = cache.region_series("R01") {
                        assert_eq!(series.years(), vec![2014, 2013, 2012, 2011, 2010]);
                    }
                }
            })
        })
        .collect();

    for i in 0..20 {
        let data = if i % 2 == 0 { &second } else { &first };
        cache.rebuild(data).unwrap();
        if i % 5 == 0 {
            cache.invalidate();
        }
    }
    for r in readers {
        r.join().unwrap();
    }

    cache.rebuild(&second).unwrap();
    let s = cache.region_series("R00").unwrap();
    assert!(s.records()[0].registrations >= 1_000_000);
}
