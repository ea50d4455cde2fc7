use serde::{Deserialize, Serialize};

/// One observed outbound TCP connection.
///
/// Wire field names (`laddr`, `raddr`, `device_id`) match the JSON schema
/// agents and dashboards already speak. A record carries no verdict; the
/// classifier annotates query responses so policy edits apply retroactively
/// to buffered history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEvent {
    /// Owning process, if it could be attributed. The process may have
    /// exited between snapshot and resolution.
    #[serde(default)]
    pub pid: Option<u32>,

    #[serde(default)]
    pub process_name: Option<String>,

    /// `host:port` of the local socket.
    #[serde(default, rename = "laddr")]
    pub local_addr: Option<String>,

    /// `host:port` of the remote endpoint.
    #[serde(default, rename = "raddr")]
    pub remote_addr: Option<String>,

    /// TCP state string, e.g. `ESTABLISHED`.
    pub status: String,

    /// Capture time, UTC seconds. One shared stamp per sampling pass.
    pub timestamp: f64,

    /// Partition key for multi-source deployments; absent in single-host
    /// mode.
    #[serde(default, rename = "device_id", skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    /// Server receipt time, stamped at ingestion for pushed batches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<f64>,
}

impl ConnectionEvent {
    /// Whether `status` denotes a live connection.
    pub fn is_established(&self) -> bool {
        is_established_status(&self.status)
    }

    /// Remote host with the port stripped, split on the last `:` so IPv6
    /// addresses keep their colons.
    pub fn remote_host(&self) -> Option<&str> {
        let raddr = self.remote_addr.as_deref()?;
        if raddr.is_empty() {
            return None;
        }
        match raddr.rsplit_once(':') {
            Some((host, _)) => Some(host),
            None => Some(raddr),
        }
    }

    /// Remote port, if the address carries a parsable one.
    pub fn remote_port(&self) -> Option<u16> {
        let raddr = self.remote_addr.as_deref()?;
        raddr.rsplit_once(':').and_then(|(_, port)| port.parse().ok())
    }

    /// Identity key for within-pass deduplication.
    pub fn dedup_key(&self) -> (Option<u32>, Option<String>, Option<String>, String) {
        (
            self.pid,
            self.local_addr.clone(),
            self.remote_addr.clone(),
            self.status.clone(),
        )
    }
}

/// True for the connection states the pipeline treats as live.
pub fn is_established_status(status: &str) -> bool {
    matches!(status.to_ascii_uppercase().as_str(), "ESTABLISHED" | "CONNECTED")
}
