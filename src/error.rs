use thiserror::Error;

/// Why a single raw row could not become a `YearRecord`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("missing or non-numeric field `{0}`")]
    Missing(&'static str),

    #[error("negative count in `{field}`: {value}")]
    NegativeCount { field: &'static str, value: i64 },

    #[error("neutering rate is not a finite number")]
    NonFiniteRate,

    #[error("empty region name")]
    EmptyRegion,
}

/// Failure of one region's aggregation task. The region is dropped from the
/// snapshot; the build carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    #[error("region {region}: duplicate year {year}")]
    DuplicateYear { region: String, year: i32 },

    #[error("region {region}: task panicked: {message}")]
    Panicked { region: String, message: String },
}

/// Fatal outcome of a build. The cache keeps whatever it had before.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("input record set is empty")]
    EmptyInput,

    #[error("no usable records ({skipped} malformed rows skipped)")]
    NoUsableRecords { skipped: usize },

    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure of one year's rollup task. The year is dropped from the snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum YearError {
    #[error("year {year}: total `{field}` overflows")]
    Overflow { year: i32, field: &'static str },

    #[error("year {year}: task panicked: {message}")]
    Panicked { year: i32, message: String },
}
