use anyhow::{Context, Result, bail};
use std::path::Path;

use super::csv::parse_rows;
use crate::stats::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Region,
    Year,
    Registrations,
    Deregistrations,
    Neutered,
    Rate,
}

const COLUMNS: [Column; 6] = [
    Column::Region,
    Column::Year,
    Column::Registrations,
    Column::Deregistrations,
    Column::Neutered,
    Column::Rate,
];

impl Column {
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Region => &["county", "region", "縣市"],
            Column::Year => &["year", "年", "年份"],
            Column::Registrations => &["registrations", "登記數"],
            Column::Deregistrations => &["deregistrations", "除戶數", "註銷數"],
            Column::Neutered => &["neutered", "絕育數"],
            Column::Rate => &["neutering rate", "neutering_rate", "絕育率"],
        }
    }

    fn name(self) -> &'static str {
        self.aliases()[0]
    }
}

fn normalize_header(cell: &str) -> String {
    cell.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// column -> index into each row
fn resolve_header(header: &[String]) -> Result<[usize; 6]> {
    let norm: Vec<String> = header.iter().map(|c| normalize_header(c)).collect();
    let mut idx = [0usize; 6];
    for (slot, col) in idx.iter_mut().zip(COLUMNS) {
        *slot = norm
            .iter()
            .position(|h| col.aliases().contains(&h.as_str()))
            .with_context(|| format!("missing column `{}` in header {:?}", col.name(), header))?;
    }
    Ok(idx)
}

fn cell<'a>(row: &'a [String], i: usize) -> Option<&'a str> {
    row.get(i).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn int_cell(row: &[String], i: usize) -> Option<i64> {
    cell(row, i)?.parse().ok()
}

fn rate_cell(row: &[String], i: usize) -> Option<f64> {
    cell(row, i)?.trim_end_matches('%').trim().parse().ok()
}

/// Header row first; unparseable cells become `None` and are left for the
/// builder to skip.
pub fn parse_table(text: &str, sep: char) -> Result<Vec<RawRecord>> {
    let mut rows = parse_rows(text, sep).into_iter();
    let Some(header) = rows.next() else {
        bail!("no header row");
    };
    let [region, year, reg, dereg, neutered, rate] = resolve_header(&header)?;

    let records: Vec<RawRecord> = rows
        .map(|row| RawRecord {
            region: cell(&row, region).unwrap_or_default().to_string(),
            year: int_cell(&row, year).and_then(|y| i32::try_from(y).ok()),
            registrations: int_cell(&row, reg),
            deregistrations: int_cell(&row, dereg),
            neutered: int_cell(&row, neutered),
            neutering_rate: rate_cell(&row, rate),
        })
        .collect();
    Ok(records)
}

pub fn parse_csv(text: &str) -> Result<Vec<RawRecord>> {
    parse_table(text, ',')
}

/// `.tsv` / `.tab` files are tab-separated; everything else is comma.
fn separator_for(path: &Path) -> char {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("tab") => '\t',
        _ => ',',
    }
}

pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let text =
        std::fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
    let records = parse_table(&text, separator_for(path))
        .with_context(|| format!("parse {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = records.len(), "records loaded");
    Ok(records)
}
