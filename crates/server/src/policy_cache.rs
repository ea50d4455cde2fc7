//! Cached trust policy with a bounded refresh interval.
//!
//! The original behavior re-read the policy file on every query; under
//! load that is per-request disk I/O for a file that rarely changes. The
//! cache serves a snapshot and re-reads once the refresh interval
//! elapses. A refresh of zero restores read-per-query. Either way a
//! missing or malformed file silently yields the built-in default.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use egress_core::TrustPolicy;

#[derive(Debug)]
struct CacheInner {
    policy: TrustPolicy,
    loaded_at: Instant,
}

#[derive(Debug)]
pub struct PolicyCache {
    path: PathBuf,
    refresh: Duration,
    inner: Mutex<CacheInner>,
}

impl PolicyCache {
    pub fn new(path: PathBuf, refresh: Duration) -> Self {
        let policy = TrustPolicy::load_or_default(&path);
        PolicyCache {
            path,
            refresh,
            inner: Mutex::new(CacheInner {
                policy,
                loaded_at: Instant::now(),
            }),
        }
    }

    /// Current policy snapshot, re-reading the file when stale.
    pub fn current(&self) -> TrustPolicy {
        let mut inner = self.inner.lock().expect("policy cache lock poisoned");
        if inner.loaded_at.elapsed() >= self.refresh {
            inner.policy = TrustPolicy::load_or_default(&self.path);
            inner.loaded_at = Instant::now();
        }
        inner.policy.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_policy_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("egresswatch_{}_{}", std::process::id(), name))
    }

    #[test]
    fn missing_file_serves_default_policy() {
        let path = temp_policy_path("cache_missing.json");
        let _ = fs::remove_file(&path);

        let cache = PolicyCache::new(path, Duration::from_secs(60));
        let policy = cache.current();
        assert!(policy.trusted.iter().any(|p| p == "google.com"));
    }

    #[test]
    fn zero_refresh_picks_up_edits_immediately() {
        let path = temp_policy_path("cache_zero.json");
        fs::write(&path, r#"{"trusted": ["first.com"], "risky": []}"#).unwrap();

        let cache = PolicyCache::new(path.clone(), Duration::ZERO);
        assert_eq!(cache.current().trusted, vec!["first.com"]);

        fs::write(&path, r#"{"trusted": ["second.com"], "risky": []}"#).unwrap();
        assert_eq!(cache.current().trusted, vec!["second.com"]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn long_refresh_serves_the_cached_snapshot() {
        let path = temp_policy_path("cache_long.json");
        fs::write(&path, r#"{"trusted": ["first.com"], "risky": []}"#).unwrap();

        let cache = PolicyCache::new(path.clone(), Duration::from_secs(3600));
        assert_eq!(cache.current().trusted, vec!["first.com"]);

        fs::write(&path, r#"{"trusted": ["second.com"], "risky": []}"#).unwrap();
        assert_eq!(cache.current().trusted, vec!["first.com"]);
        let _ = fs::remove_file(&path);
    }
}
