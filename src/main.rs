use anyhow::{Context, Result, bail};
use std::env;
use std::path::PathBuf;

use regstats::{Settings, StatsCache, YearRecord, ingest, logging};

enum Query {
    Regions,
    Region(String, Option<i32>),
    Year(i32),
    Years,
}

struct Args {
    input: PathBuf,
    query: Query,
    progress: bool,
}

fn usage() -> ! {
    eprintln!(
        "usage: regstats <data.csv|data.tsv> [--region NAME [--year YEAR] | --year YEAR | --years] [--progress]\n\
         env:   REGSTATS_THREADS, REGSTATS_SENTINEL, REGSTATS_REGION_ORDER, RUST_LOG"
    );
    std::process::exit(1);
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut input = None;
    let mut region = None;
    let mut year = None;
    let mut years = false;
    let mut progress = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--region" => region = Some(args.next().unwrap_or_else(|| usage())),
            "--year" => {
                let y = args.next().unwrap_or_else(|| usage());
                year = Some(y.parse().with_context(|| format!("bad year {y:?}"))?);
            }
            "--years" => years = true,
            "--progress" => progress = true,
            "-h" | "--help" => usage(),
            other if other.starts_with("--") => bail!("unknown flag {other}"),
            other => input = Some(PathBuf::from(other)),
        }
    }

    let query = match (region, year, years) {
        (Some(name), year, false) => Query::Region(name, year),
        (None, Some(y), false) => Query::Year(y),
        (None, None, true) => Query::Years,
        (None, None, false) => Query::Regions,
        _ => usage(),
    };

    let input = input.unwrap_or_else(|| usage());
    if !input.exists() {
        bail!("input {:?} does not exist", input);
    }
    Ok(Args {
        input,
        query,
        progress,
    })
}

fn main() -> Result<()> {
    logging::init();

    let args = parse_args()?;
    let settings = Settings::from_env();
    tracing::info!(
        workers = settings.threads.count,
        hint = %settings.threads.source,
        sentinel = %settings.sentinel,
        "configuration"
    );

    let mut opts = settings.build_options();
    opts.progress = args.progress;
    let cache = StatsCache::new(settings.order.clone(), opts);

    let records = ingest::load_csv(&args.input)?;
    let report = cache
        .rebuild(&records)
        .with_context(|| format!("build statistics from {}", args.input.display()))?;
    if report.skipped_records > 0
        || !report.omitted_regions.is_empty()
        || !report.omitted_years.is_empty()
    {
        tracing::warn!(
            skipped = report.skipped_records,
            omitted_regions = ?report.omitted_regions,
            omitted_years = ?report.omitted_years,
            "build completed with degraded input"
        );
    }

    match args.query {
        Query::Regions => {
            for region in cache.list_regions() {
                println!("{region}");
            }
        }
        Query::Years => {
            for year in cache.years() {
                println!("{year}");
            }
        }
        Query::Region(name, year) => match cache.region_series(&name) {
            Some(series) => {
                let rows: Vec<&YearRecord> = match year {
                    Some(y) => series.get(y).into_iter().collect(),
                    None => series.records().iter().collect(),
                };
                if let (None, Some(latest)) = (year, series.latest()) {
                    eprintln!("{name}: {} years, latest {}", series.len(), latest.year);
                }
                if rows.is_empty() {
                    eprintln!("no data for region {name} in the requested year");
                }
                println!("year\tregistrations\tderegistrations\tneutered\trate\tnet\tneutered/reg");
                for r in rows {
                    let ratio = r
                        .neutered_ratio()
                        .map(|v| format!("{v:.2}"))
                        .unwrap_or_else(|| "-".into());
                    println!(
                        "{}\t{}\t{}\t{}\t{:.2}\t{}\t{}",
                        r.year,
                        r.registrations,
                        r.deregistrations,
                        r.neutered,
                        r.neutering_rate,
                        r.net_registrations(),
                        ratio
                    );
                }
            }
            None => eprintln!("no data for region {name}"),
        },
        Query::Year(year) => match cache.year_summary(year) {
            Some(s) => println!(
                "year={} registrations={} deregistrations={} neutered={} mean_rate={:.2} regions={} rows={}",
                s.year,
                s.total_registrations,
                s.total_deregistrations,
                s.total_neutered,
                s.mean_neutering_rate,
                s.reporting_regions,
                s.reporting_rows
            ),
            None => eprintln!("no data for year {year}"),
        },
    }

    cache.shutdown();
    Ok(())
}
