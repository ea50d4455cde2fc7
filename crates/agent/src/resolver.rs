//! Process-name resolution with a pass-local cache.
//!
//! One `/proc/<pid>/comm` read per pid per sampling pass; failures (process
//! exited, access denied) are cached as absent so a dead pid is not probed
//! once per connection.

use std::collections::HashMap;

/// Pid -> name cache scoped to a single sampling pass.
#[derive(Debug, Default)]
pub struct NameCache {
    names: HashMap<u32, Option<String>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a pid to its process name, consulting the OS at most once
    /// per pid for the lifetime of this cache.
    pub fn resolve(&mut self, pid: u32) -> Option<String> {
        self.names
            .entry(pid)
            .or_insert_with(|| read_process_name(pid))
            .clone()
    }
}

#[cfg(target_os = "linux")]
fn read_process_name(pid: u32) -> Option<String> {
    let raw = std::fs::read_to_string(format!("/proc/{}/comm", pid)).ok()?;
    clean_comm(raw)
}

#[cfg(not(target_os = "linux"))]
fn read_process_name(_pid: u32) -> Option<String> {
    None
}

fn clean_comm(raw: String) -> Option<String> {
    let name = raw.trim_end_matches('\n').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
