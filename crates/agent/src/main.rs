// egress-agent main.rs
// Samples local outbound connections and pushes batches to an
// egress-server for centralized classification.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use egress_agent::host::HostCtx;
use egress_agent::sampler;
use egress_core::ConnectionEvent;

/// Local buffer cap between sends; oldest events fall off first.
const MAX_BUFFERED_EVENTS: usize = 100;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "egress_agent=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let server_url: String = args
        .iter()
        .position(|a| a == "--server" || a == "-s")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .or_else(|| std::env::var("EGRESS_AGENT_SERVER").ok())
        .unwrap_or_else(|| "http://127.0.0.1:3000".to_string());

    let interval_secs: u64 = args
        .iter()
        .position(|a| a == "--interval" || a == "-i")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .or_else(|| {
            std::env::var("EGRESS_AGENT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .unwrap_or(5);

    let host = HostCtx::new();
    let endpoint = format!("{}/api/device-events", server_url.trim_end_matches('/'));

    tracing::info!("device {} ({}) reporting to {}", host.device_id, host.hostname, endpoint);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build http client");

    let mut buffer: VecDeque<ConnectionEvent> = VecDeque::new();
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let events = tokio::task::spawn_blocking(sampler::sample)
                    .await
                    .unwrap_or_default();

                for mut event in events {
                    event.source_id = Some(host.device_id.clone());
                    buffer.push_back(event);
                    while buffer.len() > MAX_BUFFERED_EVENTS {
                        buffer.pop_front();
                    }
                }

                if !buffer.is_empty() {
                    send_batch(&client, &endpoint, &host.device_id, &mut buffer).await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }
}

/// Push the buffered events; the buffer is cleared only on a 2xx response
/// so a flaky network retries the same batch next tick.
async fn send_batch(
    client: &reqwest::Client,
    endpoint: &str,
    device_id: &str,
    buffer: &mut VecDeque<ConnectionEvent>,
) {
    let events: Vec<&ConnectionEvent> = buffer.iter().collect();
    let payload = serde_json::json!({
        "device_id": device_id,
        "timestamp": unix_now(),
        "events": events,
    });

    match client.post(endpoint).json(&payload).send().await {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("sent {} events", buffer.len());
            buffer.clear();
        }
        Ok(resp) => {
            tracing::warn!("server rejected batch: {}", resp.status());
        }
        Err(e) => {
            tracing::warn!("failed to send batch: {}", e);
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
