//! Background poll loop driving the local connection sampler.
//!
//! One dedicated task per process, guarded against duplicate starts. The
//! inter-pass wait is interruptible so shutdown does not sit out a full
//! interval, and a failed pass is logged and skipped, never fatal to the
//! loop. An in-flight pass is allowed to finish before the stop flag is
//! observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::store::{EventStore, LOCAL_SOURCE};

/// Bound on how long shutdown waits for the loop to finish its pass.
const JOIN_TIMEOUT: Duration = Duration::from_secs(3);

pub struct PollScheduler {
    started: AtomicBool,
    stop: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        PollScheduler {
            started: AtomicBool::new(false),
            stop,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the poll loop. Returns false if it was already running; the
    /// guard makes repeated calls harmless.
    pub fn start(&self, store: Arc<EventStore>, interval: Duration) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let mut stop_rx = self.stop.subscribe();
        let handle = tokio::spawn(async move {
            tracing::info!("poll loop started (interval {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // The sampler does blocking /proc I/O; a panicking
                        // pass surfaces as a JoinError and is dropped.
                        match tokio::task::spawn_blocking(egress_agent::sampler::sample).await {
                            Ok(events) if !events.is_empty() => {
                                tracing::debug!("sampled {} connections", events.len());
                                store.append(LOCAL_SOURCE, events);
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!("sampling pass failed: {}", e),
                        }
                    }
                    _ = stop_rx.changed() => {
                        tracing::info!("poll loop stopping");
                        break;
                    }
                }
            }
        });

        *self.handle.lock().expect("scheduler lock poisoned") = Some(handle);
        true
    }

    /// Signal the loop and join it with a bounded timeout. A loop that
    /// fails to stop in time is logged and abandoned, not an error.
    pub async fn shutdown(&self) {
        let _ = self.stop.send(true);

        let handle = self
            .handle
            .lock()
            .expect("scheduler lock poisoned")
            .take();
        if let Some(handle) = handle {
            if tokio::time::timeout(JOIN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("poll loop did not stop within {:?}", JOIN_TIMEOUT);
            }
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}
