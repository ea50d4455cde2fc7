//! Point-in-time snapshot of established outbound TCP connections.
//!
//! `sample` never fails: any OS-level refusal degrades to a smaller or
//! empty snapshot. On Linux the socket table comes from `/proc/net/tcp`
//! and `/proc/net/tcp6`, and ownership is recovered by walking process fd
//! tables for `socket:[inode]` links. A full walk needs privilege to see
//! other users' processes; when it yields nothing, a second walk
//! restricted to the current user's processes runs as the degraded
//! fallback. Other platforms compile to the documented empty-result
//! terminal case.

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, Ipv6Addr};

use egress_core::event::{is_established_status, ConnectionEvent};

use crate::resolver::NameCache;

/// One row of a kernel socket table, decoded but not yet attributed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SockEntry {
    pub local_addr: String,
    pub remote_addr: String,
    pub remote_port: u16,
    pub status: &'static str,
    pub inode: u64,
}

/// Snapshot current outbound TCP connections.
///
/// Holds no cross-call state; the name cache lives and dies with the pass,
/// and every retained record shares the pass's capture timestamp.
#[cfg(target_os = "linux")]
pub fn sample() -> Vec<ConnectionEvent> {
    let now = unix_now();
    let entries = collect_sockets();
    if entries.is_empty() {
        return Vec::new();
    }

    let mut owners = socket_owners(ProcScope::AllProcesses);
    if owners.is_empty() {
        owners = socket_owners(ProcScope::CurrentUser);
    }

    let mut names = NameCache::new();
    assemble_events(&entries, &owners, now, &mut names)
}

#[cfg(not(target_os = "linux"))]
pub fn sample() -> Vec<ConnectionEvent> {
    Vec::new()
}

/// Read every available kernel TCP table. A table that cannot be read is
/// simply absent from the snapshot.
#[cfg(target_os = "linux")]
fn collect_sockets() -> Vec<SockEntry> {
    let mut entries = Vec::new();
    for path in ["/proc/net/tcp", "/proc/net/tcp6"] {
        if let Ok(content) = std::fs::read_to_string(path) {
            entries.extend(parse_proc_net_tcp(&content));
        }
    }
    entries
}

/// Filter, deduplicate, attribute, and stamp raw socket rows.
pub(crate) fn assemble_events(
    entries: &[SockEntry],
    owners: &HashMap<u64, u32>,
    timestamp: f64,
    names: &mut NameCache,
) -> Vec<ConnectionEvent> {
    let mut seen = HashSet::new();
    let mut events = Vec::new();

    for entry in entries {
        // Retention filter: live state with an actual peer.
        if !is_established_status(entry.status) || entry.remote_port == 0 {
            continue;
        }

        let pid = owners.get(&entry.inode).copied();
        let mut event = ConnectionEvent {
            pid,
            process_name: None,
            local_addr: Some(entry.local_addr.clone()),
            remote_addr: Some(entry.remote_addr.clone()),
            status: entry.status.to_string(),
            timestamp,
            source_id: None,
            received_at: None,
        };

        if !seen.insert(event.dedup_key()) {
            continue;
        }

        event.process_name = pid.and_then(|p| names.resolve(p));
        events.push(event);
    }

    events
}

/// Parse a `/proc/net/tcp`-format table. Rows that fail to decode are
/// skipped, not errors.
pub(crate) fn parse_proc_net_tcp(content: &str) -> Vec<SockEntry> {
    let mut entries = Vec::new();

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }

        let Some((local_addr, _)) = decode_hex_addr(fields[1]) else {
            continue;
        };
        let Some((remote_addr, remote_port)) = decode_hex_addr(fields[2]) else {
            continue;
        };
        let Ok(state) = u8::from_str_radix(fields[3], 16) else {
            continue;
        };
        let Ok(inode) = fields[9].parse::<u64>() else {
            continue;
        };

        entries.push(SockEntry {
            local_addr,
            remote_addr,
            remote_port,
            status: tcp_state_name(state),
            inode,
        });
    }

    entries
}

/// Decode a kernel `ADDR:PORT` hex pair into `host:port` plus the port.
///
/// The address is one or four 32-bit words, each in host byte order.
pub(crate) fn decode_hex_addr(raw: &str) -> Option<(String, u16)> {
    let (addr_hex, port_hex) = raw.split_once(':')?;
    let port = u16::from_str_radix(port_hex, 16).ok()?;

    let host = match addr_hex.len() {
        8 => {
            let word = u32::from_str_radix(addr_hex, 16).ok()?;
            let b = word.to_le_bytes();
            Ipv4Addr::new(b[0], b[1], b[2], b[3]).to_string()
        }
        32 => {
            let mut bytes = [0u8; 16];
            for (i, chunk) in bytes.chunks_exact_mut(4).enumerate() {
                let word = u32::from_str_radix(&addr_hex[i * 8..i * 8 + 8], 16).ok()?;
                chunk.copy_from_slice(&word.to_le_bytes());
            }
            Ipv6Addr::from(bytes).to_string()
        }
        _ => return None,
    };

    Some((format!("{}:{}", host, port), port))
}

fn tcp_state_name(state: u8) -> &'static str {
    match state {
        0x01 => "ESTABLISHED",
        0x02 => "SYN_SENT",
        0x03 => "SYN_RECV",
        0x04 => "FIN_WAIT1",
        0x05 => "FIN_WAIT2",
        0x06 => "TIME_WAIT",
        0x07 => "CLOSE",
        0x08 => "CLOSE_WAIT",
        0x09 => "LAST_ACK",
        0x0A => "LISTEN",
        0x0B => "CLOSING",
        _ => "UNKNOWN",
    }
}

#[cfg(target_os = "linux")]
fn unix_now() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcScope {
    AllProcesses,
    CurrentUser,
}

/// Map socket inodes to owning pids by walking `/proc/*/fd`.
///
/// Processes whose fd tables are unreadable are skipped silently; absence
/// of privilege is "no data", not an error.
#[cfg(target_os = "linux")]
fn socket_owners(scope: ProcScope) -> HashMap<u64, u32> {
    use std::fs;
    use std::os::unix::fs::MetadataExt;

    let mut owners = HashMap::new();

    let current_uid = match scope {
        ProcScope::AllProcesses => None,
        ProcScope::CurrentUser => match fs::metadata("/proc/self") {
            Ok(md) => Some(md.uid()),
            Err(_) => return owners,
        },
    };

    let Ok(proc_entries) = fs::read_dir("/proc") else {
        return owners;
    };

    for entry in proc_entries.flatten() {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };

        if let Some(uid) = current_uid {
            match entry.metadata() {
                Ok(md) if md.uid() == uid => {}
                _ => continue,
            }
        }

        let Ok(fds) = fs::read_dir(format!("/proc/{}/fd", pid)) else {
            continue;
        };
        for fd in fds.flatten() {
            if let Ok(target) = fs::read_link(fd.path()) {
                if let Some(inode) = parse_socket_inode(&target) {
                    owners.entry(inode).or_insert(pid);
                }
            }
        }
    }

    owners
}

#[cfg(target_os = "linux")]
fn parse_socket_inode(target: &std::path::Path) -> Option<u64> {
    target
        .to_str()?
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}
