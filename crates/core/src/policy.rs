//! Trust policy: ordered substring pattern lists for remote hosts.
//!
//! Loaded from a JSON file (`{"trusted": [...], "risky": [...]}`); any
//! read or parse failure falls back to the built-in default so a broken
//! config file can never take the pipeline down.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse policy file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Substring patterns matched case-insensitively against the remote host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustPolicy {
    #[serde(default)]
    pub trusted: Vec<String>,
    #[serde(default)]
    pub risky: Vec<String>,
}

impl TrustPolicy {
    /// Read a policy file strictly. Callers that want the fallback
    /// behavior use [`TrustPolicy::load_or_default`].
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let contents = fs::read_to_string(path)?;
        let policy: TrustPolicy = serde_json::from_str(&contents)?;
        Ok(policy)
    }

    /// Read a policy file, substituting the built-in default on any
    /// failure. Missing or malformed configuration is never a hard error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(policy) => policy,
            Err(e) => {
                tracing::warn!("using default trust policy ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }
}

impl Default for TrustPolicy {
    fn default() -> Self {
        TrustPolicy {
            trusted: [
                "google.com",
                "gstatic.com",
                "googleapis.com",
                "microsoft.com",
                "windowsupdate.com",
                "live.com",
                "github.com",
                "githubusercontent.com",
                "amazonaws.com",
                "cloudflare.com",
                "akadns.net",
                "office365.com",
                "office.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            risky: [
                "doubleclick.net",
                "adservice.google.com",
                "adsystem.com",
                "tracking",
                "tracker",
                "pixel",
                "coinhive",
                "cryptominer",
                "malware",
                "phishing",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}
