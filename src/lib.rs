//! Regional pet-registration statistics: a parallel snapshot builder and a
//! generation-scoped query cache on top of it.

pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod runtime;
pub mod stats;

pub use config::Settings;
pub use error::{BuildError, RecordError, RegionError, YearError};
pub use stats::{
    BuildOptions, BuildReport, Builder, CanonicalOrder, RawRecord, RegionSeries, Snapshot,
    StatsCache, YearRecord, YearSummary,
};
