//! Server configuration with environment variable overrides.
//!
//! Defaults keep a single-host deployment working with no configuration
//! at all. Format: `EGRESS_<SETTING>=value`.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Delay between local sampling passes.
    pub poll_interval: Duration,
    /// Per-partition event store capacity.
    pub store_capacity: usize,
    /// Trust policy file; a missing file means the built-in default policy.
    pub policy_path: PathBuf,
    /// How long a loaded policy is served before the file is re-read.
    /// Zero re-reads on every query.
    pub policy_refresh: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 3000,
            poll_interval: Duration::from_secs(2),
            store_capacity: crate::store::DEFAULT_CAPACITY,
            policy_path: PathBuf::from("trust_config.json"),
            policy_refresh: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Build a config from defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(port) = parse_env("EGRESS_SERVER_PORT") {
            cfg.port = port;
        }
        if let Some(ms) = parse_env::<u64>("EGRESS_POLL_INTERVAL_MS") {
            cfg.poll_interval = Duration::from_millis(ms.max(100));
        }
        if let Some(capacity) = parse_env("EGRESS_STORE_CAPACITY") {
            cfg.store_capacity = capacity;
        }
        if let Ok(path) = std::env::var("EGRESS_TRUST_CONFIG") {
            if !path.is_empty() {
                cfg.policy_path = PathBuf::from(path);
            }
        }
        if let Some(secs) = parse_env::<u64>("EGRESS_POLICY_REFRESH_SECS") {
            cfg.policy_refresh = Duration::from_secs(secs);
        }

        cfg
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
