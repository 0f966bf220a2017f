use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings of a `TenantManager`, read from `SLOTWISE_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding one `<tenant>.wal` per tenant.
    pub data_dir: PathBuf,
    /// Appends after which the compactor rewrites a tenant's WAL.
    pub compact_threshold: u64,
    /// How often the compactor checks the threshold.
    pub compact_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparseable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let data_dir = lookup("SLOTWISE_DATA_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let compact_threshold = lookup("SLOTWISE_COMPACT_THRESHOLD")
            .and_then(|s| s.trim().parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.compact_threshold);
        let compact_interval = lookup("SLOTWISE_COMPACT_INTERVAL_SECS")
            .and_then(|s| s.trim().parse().ok())
            .filter(|n| *n > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.compact_interval);
        Self {
            data_dir,
            compact_threshold,
            compact_interval,
        }
    }
}
