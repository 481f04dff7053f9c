use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::model::Metric;
use crate::scoring::Weights;
use crate::source::DEFAULT_BASE_URL;
use crate::ttl_cache::CacheTtls;

const DEFAULT_PREDICTIONS_DIR: &str = "data/predictions";
const DEFAULT_OFFSETS_MIN: &[i64] = &[120, 60, 30, 10, 5];

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub poll_interval: Duration,
    pub parallelism: usize,
    pub offsets_min: Vec<i64>,
    pub due_window_secs: i64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            parallelism: 4,
            offsets_min: DEFAULT_OFFSETS_MIN.to_vec(),
            due_window_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch_parallelism: usize,
    /// 0 means follow `hasNextPage` until the provider stops.
    pub max_match_pages: u32,
    pub stats_years: i32,
    pub cache_ttls: CacheTtls,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_parallelism: 6,
            max_match_pages: 0,
            stats_years: 3,
            cache_ttls: CacheTtls::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub dir: PathBuf,
    pub lock_timeout: Duration,
    pub lock_stale_after: Duration,
}

impl StoreConfig {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout: Duration::from_secs(10),
            lock_stale_after: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub upstream_base_url: String,
    pub upstream_timeout: Duration,
    pub agent: AgentConfig,
    pub pipeline: PipelineConfig,
    pub store: StoreConfig,
    pub weights: Weights,
}

impl Settings {
    pub fn from_env() -> Self {
        let upstream_base_url = env::var("UPSTREAM_BASE_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let upstream_timeout = Duration::from_secs(env_u64("UPSTREAM_TIMEOUT_SECS", 20).clamp(5, 60));

        let agent = AgentConfig {
            poll_interval: Duration::from_secs(env_u64("AGENT_POLL_SECS", 30).max(5)),
            parallelism: env_u64("AGENT_PARALLELISM", 4).clamp(1, 32) as usize,
            offsets_min: env::var("AGENT_OFFSETS_MIN")
                .ok()
                .map(|raw| parse_offsets(&raw))
                .filter(|offsets| !offsets.is_empty())
                .unwrap_or_else(|| DEFAULT_OFFSETS_MIN.to_vec()),
            due_window_secs: env_u64("AGENT_DUE_WINDOW_SECS", 30).clamp(1, 600) as i64,
        };

        let pipeline = PipelineConfig {
            fetch_parallelism: env_u64("FETCH_PARALLELISM", 6).clamp(2, 32) as usize,
            max_match_pages: env_u64("MATCH_HISTORY_MAX_PAGES", 0).min(200) as u32,
            stats_years: env_u64("STATS_YEARS", 3).clamp(1, 10) as i32,
            cache_ttls: CacheTtls::default(),
        };

        let dir = env::var("PREDICTIONS_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PREDICTIONS_DIR.to_string());
        let store = StoreConfig {
            dir: PathBuf::from(dir),
            lock_timeout: Duration::from_secs(env_u64("STORE_LOCK_TIMEOUT_SECS", 10).clamp(1, 600)),
            lock_stale_after: Duration::from_secs(
                env_u64("STORE_LOCK_STALE_SECS", 60).clamp(5, 3600),
            ),
        };

        Self {
            upstream_base_url,
            upstream_timeout,
            agent,
            pipeline,
            store,
            weights: weights_from_env(),
        }
    }
}

/// Defaults with any `TGS_WEIGHT_<METRIC>` overrides applied, normalized once.
pub fn weights_from_env() -> Weights {
    let mut raw: BTreeMap<Metric, f64> = Weights::default_raw();
    for metric in Metric::ALL {
        let var = format!("TGS_WEIGHT_{}", metric.key().to_ascii_uppercase());
        if let Some(value) = env::var(&var).ok().and_then(|v| v.trim().parse::<f64>().ok()) {
            raw.insert(metric, value);
        }
    }
    Weights::from_raw(&raw)
}

pub fn parse_offsets(raw: &str) -> Vec<i64> {
    let mut offsets: Vec<i64> = raw
        .split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .filter(|m| *m > 0)
        .collect();
    offsets.sort_unstable_by(|a, b| b.cmp(a));
    offsets.dedup();
    offsets
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
