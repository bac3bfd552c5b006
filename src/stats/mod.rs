pub mod builder;
pub mod cache;
pub mod order;
pub mod types;

pub use builder::{BuildOptions, Builder};
pub use cache::{MemoStats, StatsCache};
pub use order::CanonicalOrder;
pub use types::*;
