//! Bounded, insertion-ordered event buffers, partitioned by source.
//!
//! One mutex guards the whole partition map and is held only for the
//! insert+evict step or a read snapshot; classification and response
//! formatting happen outside the lock. Events are append-only and
//! eviction is FIFO, so there is no update-in-place contention to manage.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use egress_core::ConnectionEvent;

/// Partition key for events produced by this host's own poll scheduler.
pub const LOCAL_SOURCE: &str = "local";

/// Per-partition sliding-window size.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Bounds applied to every `latest` request regardless of caller input.
pub const MIN_QUERY: usize = 1;
pub const MAX_QUERY: usize = 500;

#[derive(Debug)]
struct StoredEvent {
    /// Global arrival counter; breaks wall-clock ties across partitions.
    seq: u64,
    event: ConnectionEvent,
}

#[derive(Debug, Default)]
struct StoreInner {
    partitions: HashMap<String, VecDeque<StoredEvent>>,
    next_seq: u64,
}

/// Thread-safe sliding window of connection events.
#[derive(Debug)]
pub struct EventStore {
    capacity: usize,
    inner: Mutex<StoreInner>,
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        EventStore {
            capacity: capacity.max(1),
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Append a batch under one partition, evicting the oldest records
    /// once the partition exceeds capacity.
    pub fn append(&self, source_id: &str, events: Vec<ConnectionEvent>) {
        if events.is_empty() {
            return;
        }

        let mut inner = self.inner.lock().expect("event store lock poisoned");
        let StoreInner {
            partitions,
            next_seq,
        } = &mut *inner;
        let partition = partitions.entry(source_id.to_string()).or_default();

        for event in events {
            let seq = *next_seq;
            *next_seq += 1;
            partition.push_back(StoredEvent { seq, event });
            while partition.len() > self.capacity {
                partition.pop_front();
            }
        }
    }

    /// Return up to `n` records newest-first, with `n` clamped into
    /// [`MIN_QUERY`, `MAX_QUERY`]. With a source, newest-first is reverse
    /// arrival order; across all partitions records merge by timestamp
    /// with arrival order breaking ties, since wall clocks may collide
    /// across sources.
    pub fn latest(&self, source_id: Option<&str>, n: usize) -> Vec<ConnectionEvent> {
        let n = n.clamp(MIN_QUERY, MAX_QUERY);
        let inner = self.inner.lock().expect("event store lock poisoned");

        match source_id {
            Some(source) => match inner.partitions.get(source) {
                Some(partition) => partition
                    .iter()
                    .rev()
                    .take(n)
                    .map(|stored| stored.event.clone())
                    .collect(),
                None => Vec::new(),
            },
            None => {
                let mut all: Vec<&StoredEvent> =
                    inner.partitions.values().flatten().collect();
                all.sort_unstable_by(|a, b| {
                    b.event
                        .timestamp
                        .partial_cmp(&a.event.timestamp)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(b.seq.cmp(&a.seq))
                });
                all.into_iter()
                    .take(n)
                    .map(|stored| stored.event.clone())
                    .collect()
            }
        }
    }

    /// Number of records currently buffered for one partition.
    pub fn partition_len(&self, source_id: &str) -> usize {
        let inner = self.inner.lock().expect("event store lock poisoned");
        inner
            .partitions
            .get(source_id)
            .map(|p| p.len())
            .unwrap_or(0)
    }

    /// Total records across all partitions.
    pub fn total_len(&self) -> usize {
        let inner = self.inner.lock().expect("event store lock poisoned");
        inner.partitions.values().map(|p| p.len()).sum()
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn event(n: u32, timestamp: f64) -> ConnectionEvent {
        ConnectionEvent {
            pid: Some(n),
            process_name: Some(format!("proc-{}", n)),
            local_addr: Some(format!("10.0.0.1:{}", 40000 + (n % 20000))),
            remote_addr: Some("example.com:443".to_string()),
            status: "ESTABLISHED".to_string(),
            timestamp,
            source_id: None,
            received_at: None,
        }
    }

    #[test]
    fn append_beyond_capacity_evicts_oldest_fifo() {
        let store = EventStore::new(1000);
        for i in 0..1200u32 {
            store.append(LOCAL_SOURCE, vec![event(i, i as f64)]);
        }

        assert_eq!(store.partition_len(LOCAL_SOURCE), 1000);

        // Newest survive; records 0..200 are gone.
        let newest = store.latest(Some(LOCAL_SOURCE), 1);
        assert_eq!(newest[0].pid, Some(1199));
        let page = store.latest(Some(LOCAL_SOURCE), 500);
        assert!(page.iter().all(|ev| ev.pid.unwrap() >= 200));
    }

    #[test]
    fn small_capacity_keeps_exactly_the_tail() {
        let store = EventStore::new(5);
        store.append("dev-a", (0..8u32).map(|i| event(i, i as f64)).collect());

        let got = store.latest(Some("dev-a"), 10);
        let pids: Vec<u32> = got.iter().map(|ev| ev.pid.unwrap()).collect();
        assert_eq!(pids, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn latest_is_newest_first_and_does_not_pad() {
        let store = EventStore::new(1000);
        store.append(LOCAL_SOURCE, (0..10u32).map(|i| event(i, i as f64)).collect());

        let got = store.latest(Some(LOCAL_SOURCE), 500);
        assert_eq!(got.len(), 10);
        assert_eq!(got[0].pid, Some(9));
        assert_eq!(got[9].pid, Some(0));
    }

    #[test]
    fn query_size_is_clamped_into_bounds() {
        let store = EventStore::new(1000);
        store.append(LOCAL_SOURCE, (0..10u32).map(|i| event(i, i as f64)).collect());

        assert_eq!(store.latest(Some(LOCAL_SOURCE), 0).len(), 1);
        assert_eq!(store.latest(Some(LOCAL_SOURCE), 10_000).len(), 10);

        store.append(LOCAL_SOURCE, (10..800u32).map(|i| event(i, i as f64)).collect());
        assert_eq!(store.latest(Some(LOCAL_SOURCE), 10_000).len(), MAX_QUERY);
    }

    #[test]
    fn unknown_partition_is_empty_not_an_error() {
        let store = EventStore::default();
        assert!(store.latest(Some("no-such-device"), 50).is_empty());
    }

    #[test]
    fn all_sources_merge_newest_first_by_timestamp() {
        let store = EventStore::new(1000);
        store.append("dev-a", vec![event(1, 100.0), event(2, 300.0)]);
        store.append("dev-b", vec![event(3, 200.0)]);

        let got = store.latest(None, 50);
        let pids: Vec<u32> = got.iter().map(|ev| ev.pid.unwrap()).collect();
        assert_eq!(pids, vec![2, 3, 1]);
    }

    #[test]
    fn timestamp_ties_break_by_arrival_order() {
        let store = EventStore::new(1000);
        store.append("dev-a", vec![event(1, 100.0)]);
        store.append("dev-b", vec![event(2, 100.0)]);
        store.append("dev-a", vec![event(3, 100.0)]);

        // Same wall-clock second everywhere: latest arrival wins.
        let got = store.latest(None, 50);
        let pids: Vec<u32> = got.iter().map(|ev| ev.pid.unwrap()).collect();
        assert_eq!(pids, vec![3, 2, 1]);
    }

    #[test]
    fn concurrent_producers_and_readers_lose_nothing() {
        let store = Arc::new(EventStore::new(10_000));
        let producers: u32 = 4;
        let per_producer: u32 = 250;

        let mut handles = Vec::new();
        for p in 0..producers {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..per_producer {
                    let n = p * 1000 + i;
                    store.append(LOCAL_SOURCE, vec![event(n, n as f64)]);
                }
            }));
        }
        for _ in 0..2 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    for ev in store.latest(Some(LOCAL_SOURCE), 100) {
                        // A torn append would break the pid/name pairing.
                        let pid = ev.pid.unwrap();
                        assert_eq!(ev.process_name.as_deref(), Some(format!("proc-{}", pid).as_str()));
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.partition_len(LOCAL_SOURCE),
            (producers * per_producer) as usize
        );
    }
}
