//! Worker pool that splits the node list into contiguous shards
//!
//! Each worker owns one shard and checks its nodes one after another, so at
//! most `workers` nodes are in flight at any time.

use crate::proxy::models::NodeDefinition;
use async_trait::async_trait;
use std::ops::Range;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Processes a single node on behalf of a worker
#[async_trait]
pub trait NodeHandler: Send + Sync + 'static {
    async fn handle(&self, node: NodeDefinition);
}

/// Contiguous shard ranges for `len` items over `workers` workers.
///
/// Every shard has `len / workers` items except the last one, which also
/// takes the remainder. Shards may be empty when there are more workers than
/// items. `workers` is clamped to at least one.
pub fn shard_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let size = len / workers;
    (0..workers)
        .map(|i| {
            let start = i * size;
            let end = if i == workers - 1 { len } else { start + size };
            start..end
        })
        .collect()
}

/// Split `items` into owned shards following [`shard_ranges`]
fn split_into_shards<T>(mut items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let ranges = shard_ranges(items.len(), workers);
    let mut shards: Vec<Vec<T>> = ranges
        .iter()
        .rev()
        .map(|range| items.split_off(range.start))
        .collect();
    shards.reverse();
    shards
}

/// Fixed-size pool of shard workers
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every node through `handler` and wait for all workers to finish.
    ///
    /// A worker that panics loses the rest of its shard; the other workers
    /// keep going.
    pub async fn run<H: NodeHandler>(&self, nodes: Vec<NodeDefinition>, handler: Arc<H>) {
        let mut set = JoinSet::new();

        for (index, shard) in split_into_shards(nodes, self.workers)
            .into_iter()
            .enumerate()
        {
            let handler = Arc::clone(&handler);
            set.spawn(async move {
                tracing::trace!(worker = index, nodes = shard.len(), "worker started");
                for node in shard {
                    handler.handle(node).await;
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_shard_ranges_example() {
        assert_eq!(shard_ranges(5, 2), vec![0..2, 2..5]);
    }

    #[test]
    fn test_shard_ranges_cover_without_gaps() {
        for len in 0..40 {
            for workers in 1..=len.max(1) {
                let ranges = shard_ranges(len, workers);
                assert_eq!(ranges.len(), workers);

                let mut next = 0;
                for range in &ranges {
                    assert_eq!(range.start, next, "gap or overlap for len={} workers={}", len, workers);
                    assert!(range.end >= range.start);
                    next = range.end;
                }
                assert_eq!(next, len);

                let size = len / workers;
                for range in &ranges[..workers - 1] {
                    assert_eq!(range.len(), size);
                }
                assert_eq!(ranges[workers - 1].len(), size + len % workers);
            }
        }
    }

    #[test]
    fn test_more_workers_than_items() {
        assert_eq!(shard_ranges(2, 4), vec![0..0, 0..0, 0..0, 0..2]);
        assert_eq!(shard_ranges(0, 3), vec![0..0, 0..0, 0..0]);
    }

    #[test]
    fn test_zero_workers_clamped() {
        assert_eq!(shard_ranges(3, 0), vec![0..3]);
        assert_eq!(WorkerPool::new(0).workers(), 1);
    }

    #[test]
    fn test_split_into_shards_keeps_order() {
        let shards = split_into_shards((0..7).collect::<Vec<_>>(), 3);
        assert_eq!(shards, vec![vec![0, 1], vec![2, 3], vec![4, 5, 6]]);
    }

    /// Records handled node names and the peak number of concurrent handles
    #[derive(Default)]
    struct Recorder {
        handled: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl NodeHandler for Recorder {
        async fn handle(&self, node: NodeDefinition) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.handled
                .lock()
                .unwrap()
                .push(node.name().unwrap_or_default().to_string());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn nodes(count: usize) -> Vec<NodeDefinition> {
        (0..count)
            .map(|i| NodeDefinition::new().with("name", format!("node-{}", i)))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_handles_every_node_once() {
        let recorder = Arc::new(Recorder::default());
        WorkerPool::new(3).run(nodes(10), recorder.clone()).await;

        let mut handled = recorder.handled.lock().unwrap().clone();
        handled.sort();
        let mut expected: Vec<_> = (0..10).map(|i| format!("node-{}", i)).collect();
        expected.sort();
        assert_eq!(handled, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bounds_concurrency() {
        let recorder = Arc::new(Recorder::default());
        WorkerPool::new(2).run(nodes(8), recorder.clone()).await;

        assert!(recorder.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(recorder.handled.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_pool_with_no_nodes() {
        let recorder = Arc::new(Recorder::default());
        WorkerPool::new(4).run(Vec::new(), recorder.clone()).await;
        assert!(recorder.handled.lock().unwrap().is_empty());
    }
}
