use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadConfig {
    pub count: usize,
    pub source: String,
}

pub const ENV_HINTS: [&str; 2] = ["REGSTATS_THREADS", "RAYON_NUM_THREADS"];

fn parse_env_threads<F>(keys: &[&str], lookup: F) -> Option<ThreadConfig>
where
    F: Fn(&str) -> Option<String>,
{
    for &key in keys {
        if let Some(v) = lookup(key) {
            if let Ok(val) = v.trim().parse::<usize>() {
                if val > 0 {
                    return Some(ThreadConfig {
                        count: val,
                        source: key.to_string(),
                    });
                }
            }
        }
    }
    None
}

pub(crate) fn detect_with<F>(lookup: F) -> ThreadConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(cfg) = parse_env_threads(&ENV_HINTS, lookup) {
        return cfg;
    }

    let fallback = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1);

    ThreadConfig {
        count: fallback,
        source: "available_parallelism".to_string(),
    }
}

/// Worker count from the environment, else hardware parallelism.
pub fn detect_thread_config() -> ThreadConfig {
    detect_with(|k| std::env::var(k).ok())
}

/// Dedicated pool for one build. Not the global pool, so tests can pin the
/// worker count per call.
pub fn build_pool(workers: usize) -> Result<ThreadPool, ThreadPoolBuildError> {
    let workers = workers.max(1);
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("regstats-worker-{i}"))
        .build()?;
    tracing::debug!(workers, "rayon pool ready");
    Ok(pool)
}
