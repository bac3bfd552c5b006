use ahash::AHashMap;
use std::sync::Arc;

use crate::error::{RecordError, RegionError};

/// One row as handed over by the loader. `None` = missing or non-numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub region: String,
    pub year: Option<i32>,
    pub registrations: Option<i64>,
    pub deregistrations: Option<i64>,
    pub neutered: Option<i64>,
    pub neutering_rate: Option<f64>,
}

impl RawRecord {
    pub fn complete(
        region: impl Into<String>,
        year: i32,
        registrations: i64,
        deregistrations: i64,
        neutered: i64,
        neutering_rate: f64,
    ) -> Self {
        Self {
            region: region.into(),
            year: Some(year),
            registrations: Some(registrations),
            deregistrations: Some(deregistrations),
            neutered: Some(neutered),
            neutering_rate: Some(neutering_rate),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearRecord {
    pub year: i32,
    pub registrations: u64,
    pub deregistrations: u64,
    pub neutered: u64,
    pub neutering_rate: f64, // percent; not clamped
}

#[inline]
fn count(field: &'static str, v: Option<i64>) -> Result<u64, RecordError> {
    let v = v.ok_or(RecordError::Missing(field))?;
    u64::try_from(v).map_err(|_| RecordError::NegativeCount { field, value: v })
}

impl TryFrom<&RawRecord> for YearRecord {
    type Error = RecordError;

    fn try_from(raw: &RawRecord) -> Result<Self, Self::Error> {
        if raw.region.trim().is_empty() {
            return Err(RecordError::EmptyRegion);
        }
        let year = raw.year.ok_or(RecordError::Missing("year"))?;
        let neutering_rate = raw
            .neutering_rate
            .ok_or(RecordError::Missing("neutering_rate"))?;
        if !neutering_rate.is_finite() {
            return Err(RecordError::NonFiniteRate);
        }
        Ok(Self {
            year,
            registrations: count("registrations", raw.registrations)?,
            deregistrations: count("deregistrations", raw.deregistrations)?,
            neutered: count("neutered", raw.neutered)?,
            neutering_rate,
        })
    }
}

impl YearRecord {
    /// Registrations minus deregistrations; negative when a region shrank.
    #[inline]
    pub fn net_registrations(&self) -> i64 {
        self.registrations as i64 - self.deregistrations as i64
    }

    /// Neutered count as a percentage of registrations.
    #[inline]
    pub fn neutered_ratio(&self) -> Option<f64> {
        if self.registrations == 0 {
            None
        } else {
            Some(self.neutered as f64 / self.registrations as f64 * 100.0)
        }
    }
}

/// Per-region time series, most recent year first. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSeries {
    region: String,
    records: Vec<YearRecord>,
}

impl RegionSeries {
    /// Sorts by year descending and rejects duplicate years.
    pub fn new(region: impl Into<String>, mut records: Vec<YearRecord>) -> Result<Self, RegionError> {
        let region = region.into();
        records.sort_by(|a, b| b.year.cmp(&a.year));
        if let Some(w) = records.windows(2).find(|w| w[0].year == w[1].year) {
            return Err(RegionError::DuplicateYear {
                region,
                year: w[0].year,
            });
        }
        Ok(Self { region, records })
    }

    #[inline]
    pub fn region(&self) -> &str {
        &self.region
    }
    #[inline]
    pub fn records(&self) -> &[YearRecord] {
        &self.records
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        self.records.iter().map(|r| r.year).collect()
    }

    pub fn latest(&self) -> Option<&YearRecord> {
        self.records.first()
    }

    pub fn get(&self, year: i32) -> Option<&YearRecord> {
        // descending order, so compare reversed
        self.records
            .binary_search_by(|r| year.cmp(&r.year))
            .ok()
            .map(|i| &self.records[i])
    }
}

/// Cross-region rollup for one year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearSummary {
    pub year: i32,
    pub total_registrations: u64,
    pub total_deregistrations: u64,
    pub total_neutered: u64,
    /// Mean over regions; a region with several rows contributes their mean.
    pub mean_neutering_rate: f64,
    /// Distinct regions with at least one row for the year.
    pub reporting_regions: usize,
    pub reporting_rows: usize,
}

/// What the build absorbed instead of failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub accepted_records: usize,
    pub skipped_records: usize,
    pub sentinel_records: usize,
    pub omitted_regions: Vec<String>,
    pub omitted_years: Vec<i32>,
}

/// Everything one build produced. Shared read-only until the next rebuild.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub regions: AHashMap<String, Arc<RegionSeries>>,
    pub years: AHashMap<i32, YearSummary>,
    pub years_desc: Vec<i32>,
    pub report: BuildReport,
}

impl Snapshot {
    pub fn region(&self, name: &str) -> Option<&Arc<RegionSeries>> {
        self.regions.get(name)
    }

    pub fn year(&self, year: i32) -> Option<&YearSummary> {
        self.years.get(&year)
    }

    pub fn has_region(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(year: i32) -> YearRecord {
        YearRecord {
            year,
            registrations: 10,
            deregistrations: 2,
            neutered: 5,
            neutering_rate: 50.0,
        }
    }

    #[test]
    fn series_sorted_descending() {
        let s = RegionSeries::new("A", vec![rec(2019), rec(2021), rec(2020)]).unwrap();
        assert_eq!(s.years(), vec![2021, 2020, 2019]);
        assert_eq!(s.latest().map(|r| r.year), Some(2021));
        assert_eq!(s.get(2020).map(|r| r.year), Some(2020));
        assert!(s.get(2018).is_none());
    }

    #[test]
    fn series_rejects_duplicate_year() {
        let err = RegionSeries::new("A", vec![rec(2020), rec(2021), rec(2020)]).unwrap_err();
        assert_eq!(
            err,
            RegionError::DuplicateYear {
                region: "A".into(),
                year: 2020
            }
        );
    }

    #[test]
    fn malformed_rows_rejected() {
        let mut raw = RawRecord::complete("A", 2020, 1, 1, 1, 1.0);
        raw.neutered = None;
        assert_eq!(
            YearRecord::try_from(&raw),
            Err(RecordError::Missing("neutered"))
        );

        let raw = RawRecord::complete("A", 2020, -4, 1, 1, 1.0);
        assert!(matches!(
            YearRecord::try_from(&raw),
            Err(RecordError::NegativeCount { field: "registrations", value: -4 })
        ));

        let raw = RawRecord::complete("A", 2020, 1, 1, 1, f64::NAN);
        assert_eq!(YearRecord::try_from(&raw), Err(RecordError::NonFiniteRate));

        let raw = RawRecord::complete("  ", 2020, 1, 1, 1, 1.0);
        assert_eq!(YearRecord::try_from(&raw), Err(RecordError::EmptyRegion));
    }

    #[test]
    fn out_of_range_rate_passes_through() {
        let raw = RawRecord::complete("A", 2020, 1, 1, 1, 140.5);
        assert_eq!(YearRecord::try_from(&raw).unwrap().neutering_rate, 140.5);
    }

    #[test]
    fn derived_rates() {
        let r = YearRecord {
            year: 2020,
            registrations: 200,
            deregistrations: 250,
            neutered: 50,
            neutering_rate: 0.0,
        };
        assert_eq!(r.net_registrations(), -50);
        assert_eq!(r.neutered_ratio(), Some(25.0));
        let zero = YearRecord { registrations: 0, ..r };
        assert_eq!(zero.neutered_ratio(), None);
    }
}
