// benches/rebuild.rs
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use regstats::{BuildOptions, Builder, RawRecord};

fn fixture() -> Vec<RawRecord> {
    let mut raw = Vec::new();
    for r in 0..22 {
        for year in 2009..2024 {
            let reg = (r * 131 + year as i64 * 7) % 9000 + 100;
            raw.push(RawRecord::complete(format!("R{r}"), year, reg, reg / 4, reg / 2, 45.0));
        }
    }
    raw
}

fn bench_build(c: &mut Criterion) {
    let raw = fixture();

    c.bench_function("build_1_worker", |b| {
        let builder = Builder::new(BuildOptions::with_workers(1));
        b.iter(|| {
            let snap = builder.build(black_box(&raw)).unwrap();
            black_box(snap.regions.len())
        })
    });

    c.bench_function("build_default_workers", |b| {
        let builder = Builder::new(BuildOptions::default());
        b.iter(|| {
            let snap = builder.build(black_box(&raw)).unwrap();
            black_box(snap.regions.len())
        })
    });
}

criterion_group!(benches, bench_build);
criterion_main!(benches);
