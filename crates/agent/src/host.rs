//! Host context for the push agent.
//! Provides the stable device identifier query and ingest batches are
//! keyed by.

/// Minimal host metadata resolved once at agent startup.
#[derive(Clone, Debug)]
pub struct HostCtx {
    pub hostname: String,
    pub device_id: String,
}

impl HostCtx {
    pub fn new() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.to_str().map(|s| s.to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        let device_id = derive_device_id(&hostname);

        HostCtx {
            hostname,
            device_id,
        }
    }
}

impl Default for HostCtx {
    fn default() -> Self {
        Self::new()
    }
}

/// Short stable identifier: first 12 hex chars of the hostname digest.
fn derive_device_id(hostname: &str) -> String {
    if hostname.is_empty() || hostname == "unknown" {
        return "unknown-device".to_string();
    }
    let digest = format!("{:x}", md5::compute(hostname.as_bytes()));
    digest[..12].to_string()
}
