use ahash::AHashMap;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use super::types::{BuildReport, RawRecord, RegionSeries, Snapshot, YearRecord, YearSummary};
use crate::config::DEFAULT_SENTINEL;
use crate::error::{BuildError, RegionError, YearError};
use crate::runtime;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub workers: usize,
    /// Region name of the pre-aggregated total row; dropped before grouping.
    pub sentinel: String,
    pub progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            workers: runtime::detect_thread_config().count,
            sentinel: DEFAULT_SENTINEL.to_string(),
            progress: false,
        }
    }
}

impl BuildOptions {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }
}

/// Turns a flat record set into a complete `Snapshot`.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    opts: BuildOptions,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs one task, turning a panic into the task's own error type.
pub(crate) fn guarded<T, E, F, P>(task: F, on_panic: P) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    P: FnOnce(String) -> E,
{
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(res) => res,
        Err(payload) => Err(on_panic(panic_message(payload.as_ref()))),
    }
}

fn checked_total<I>(year: i32, field: &'static str, values: I) -> Result<u64, YearError>
where
    I: IntoIterator<Item = u64>,
{
    values
        .into_iter()
        .try_fold(0u64, |acc, v| acc.checked_add(v))
        .ok_or(YearError::Overflow { year, field })
}

fn summarize(year: i32, rows: &[(&str, YearRecord)]) -> Result<YearSummary, YearError> {
    // a region with repeated rows for the year weighs once in the mean
    let region_rates: Vec<f64> = rows
        .iter()
        .map(|&(region, r)| (region, r.neutering_rate))
        .into_group_map()
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(b.0))
        .map(|(_, rates)| rates.iter().sum::<f64>() / rates.len() as f64)
        .collect();
    let regions = region_rates.len();
    let mean = if regions == 0 {
        0.0
    } else {
        region_rates.iter().sum::<f64>() / regions as f64
    };

    let registrations = rows.iter().map(|(_, r)| r.registrations);
    let deregistrations = rows.iter().map(|(_, r)| r.deregistrations);
    let neutered = rows.iter().map(|(_, r)| r.neutered);
    Ok(YearSummary {
        year,
        total_registrations: checked_total(year, "registrations", registrations)?,
        total_deregistrations: checked_total(year, "deregistrations", deregistrations)?,
        total_neutered: checked_total(year, "neutered", neutered)?,
        mean_neutering_rate: mean,
        reporting_regions: regions,
        reporting_rows: rows.len(),
    })
}

fn progress_bar(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} tasks {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

impl Builder {
    pub fn new(opts: BuildOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.opts
    }

    pub fn build(&self, raw: &[RawRecord]) -> Result<Snapshot, BuildError> {
        let t0 = Instant::now();
        if raw.is_empty() {
            return Err(BuildError::EmptyInput);
        }

        // drop the sentinel row and anything malformed
        let mut report = BuildReport::default();
        let mut rows: Vec<(&str, YearRecord)> = Vec::with_capacity(raw.len());
        for rec in raw {
            let region = rec.region.trim();
            if region == self.opts.sentinel {
                report.sentinel_records += 1;
                continue;
            }
            match YearRecord::try_from(rec) {
                Ok(r) => rows.push((region, r)),
                Err(err) => {
                    report.skipped_records += 1;
                    tracing::debug!(region, year = ?rec.year, %err, "skipping malformed record");
                }
            }
        }
        report.accepted_records = rows.len();
        if rows.is_empty() {
            return Err(if report.skipped_records == 0 {
                BuildError::EmptyInput
            } else {
                BuildError::NoUsableRecords {
                    skipped: report.skipped_records,
                }
            });
        }

        // one slot per region / per year, reserved before dispatch
        let region_tasks: Vec<(&str, Vec<YearRecord>)> = rows
            .iter()
            .map(|&(region, r)| (region, r))
            .into_group_map()
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .collect();
        let year_tasks: Vec<(i32, Vec<(&str, YearRecord)>)> = rows
            .iter()
            .map(|&(region, r)| (r.year, (region, r)))
            .into_group_map()
            .into_iter()
            .sorted_by_key(|(year, _)| std::cmp::Reverse(*year))
            .collect();

        let pb = progress_bar(region_tasks.len() + year_tasks.len(), self.opts.progress);
        pb.set_message(format!(
            "regions={} years={}",
            region_tasks.len(),
            year_tasks.len()
        ));

        let pool = runtime::build_pool(self.opts.workers)?;
        let (region_results, year_results): (
            Vec<Result<RegionSeries, RegionError>>,
            Vec<Result<YearSummary, YearError>>,
        ) = pool.install(|| {
                rayon::join(
                    || {
                        region_tasks
                            .par_iter()
                            .map(|(region, records)| {
                                let out = guarded(
                                    || RegionSeries::new(*region, records.clone()),
                                    |message| RegionError::Panicked {
                                        region: region.to_string(),
                                        message,
                                    },
                                );
                                pb.inc(1);
                                out
                            })
                            .collect()
                    },
                    || {
                        year_tasks
                            .par_iter()
                            .map(|(year, records)| {
                                let out = guarded(
                                    || summarize(*year, records),
                                    |message| YearError::Panicked {
                                        year: *year,
                                        message,
                                    },
                                );
                                pb.inc(1);
                                out
                            })
                            .collect()
                    },
                )
            });
        pb.finish_and_clear();

        // barrier passed: assemble on this thread only
        let mut regions = AHashMap::with_capacity(region_results.len());
        for res in region_results {
            match res {
                Ok(series) => {
                    regions.insert(series.region().to_string(), Arc::new(series));
                }
                Err(err) => {
                    let name = match &err {
                        RegionError::DuplicateYear { region, .. }
                        | RegionError::Panicked { region, .. } => region.clone(),
                    };
                    tracing::warn!(region = %name, %err, "region omitted from snapshot");
                    report.omitted_regions.push(name);
                }
            }
        }

        let mut summaries = Vec::with_capacity(year_results.len());
        for res in year_results {
            match res {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    let year = match &err {
                        YearError::Overflow { year, .. } | YearError::Panicked { year, .. } => *year,
                    };
                    tracing::warn!(year, %err, "year omitted from snapshot");
                    report.omitted_years.push(year);
                }
            }
        }

        let years_desc: Vec<i32> = summaries.iter().map(|s| s.year).collect();
        let years: AHashMap<i32, YearSummary> =
            summaries.into_iter().map(|s| (s.year, s)).collect();

        tracing::info!(
            regions = regions.len(),
            years = years.len(),
            accepted = report.accepted_records,
            skipped = report.skipped_records,
            omitted_regions = report.omitted_regions.len(),
            omitted_years = report.omitted_years.len(),
            workers = self.opts.workers,
            wall_ms = t0.elapsed().as_millis() as u64,
            "snapshot built"
        );

        Ok(Snapshot {
            regions,
            years,
            years_desc,
            report,
        })
    }
}
