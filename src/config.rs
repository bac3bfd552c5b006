use crate::runtime::{self, ThreadConfig};
use crate::stats::{BuildOptions, CanonicalOrder};

/// Name of the pre-aggregated nationwide row in the source data.
pub const DEFAULT_SENTINEL: &str = "全臺";

pub const ENV_SENTINEL: &str = "REGSTATS_SENTINEL";
pub const ENV_REGION_ORDER: &str = "REGSTATS_REGION_ORDER";

#[derive(Debug, Clone)]
pub struct Settings {
    pub threads: ThreadConfig,
    pub sentinel: String,
    pub order: CanonicalOrder,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let threads = runtime::detect_with(&lookup);
        let sentinel = lookup(ENV_SENTINEL)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SENTINEL.to_string());
        let order = lookup(ENV_REGION_ORDER)
            .map(|s| CanonicalOrder::parse_list(&s))
            .filter(|o| !o.is_empty())
            .unwrap_or_default();
        Self {
            threads,
            sentinel,
            order,
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            workers: self.threads.count,
            sentinel: self.sentinel.clone(),
            progress: false,
        }
    }
}
