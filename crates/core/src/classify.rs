//! Rule-based trust classification.
//!
//! `classify` is pure and total: every record gets a verdict, and a
//! malformed address or unparsable port degrades to `Caution` instead of
//! erroring. The rule order is a compatibility contract with existing
//! dashboards and must not be rearranged.

use crate::event::ConnectionEvent;
use crate::policy::TrustPolicy;
use crate::verdict::Verdict;

/// Ports with a history of abuse (FTP, telnet, SMTP, RPC, SMB, RDP).
const RISKY_PORTS: [u16; 7] = [21, 23, 25, 135, 139, 445, 3389];

/// Plain web traffic.
const WEB_PORTS: [u16; 2] = [80, 443];

/// Classify one connection record against a trust policy.
///
/// Decision order, first match wins:
/// 1. no remote host -> Caution
/// 2. host matches a trusted pattern -> Safe when established, else Caution
/// 3. host matches a risky pattern -> Risk regardless of state
/// 4. not established -> Caution
/// 5. risky port -> Risk
/// 6. web port -> Safe
/// 7. default -> Caution (unknown is worth a second look, never Safe)
pub fn classify(event: &ConnectionEvent, policy: &TrustPolicy) -> Verdict {
    let host = match event.remote_host() {
        Some(host) => host.to_lowercase(),
        None => return Verdict::Caution,
    };
    let established = event.is_established();

    if matches_any(&host, &policy.trusted) {
        return if established {
            Verdict::Safe
        } else {
            Verdict::Caution
        };
    }
    if matches_any(&host, &policy.risky) {
        return Verdict::Risk;
    }
    if !established {
        return Verdict::Caution;
    }

    match event.remote_port() {
        Some(port) if RISKY_PORTS.contains(&port) => Verdict::Risk,
        Some(port) if WEB_PORTS.contains(&port) => Verdict::Safe,
        _ => Verdict::Caution,
    }
}

fn matches_any(host: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pat| !pat.is_empty() && host.contains(&pat.to_lowercase()))
}
