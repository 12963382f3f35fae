//! Bounded FIFO event queue (spec.md §4.1).

use monitor_core::model::MonitorData;
use std::collections::VecDeque;

pub const DEFAULT_MAX_SIZE: usize = 500;

/// Signals a caller should react to: `QueueFull` when `add` evicted the
/// oldest item, `FlushError` when a failed batch was returned to the head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSignal {
    QueueFull,
    FlushError,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueStats {
    pub success_count: u64,
    pub failed_count: u64,
}

/// A bounded FIFO of `MonitorData` (spec.md §4.1). All operations are
/// O(1) amortized and synchronous — the SDK runtime is single-threaded
/// cooperative (spec.md §5), so no internal locking is needed here;
/// callers that need persistence or cross-task sharing wrap this in
/// `PersistentQueue`/an `Arc<Mutex<_>>` themselves.
#[derive(Debug)]
pub struct EventQueue {
    items: VecDeque<MonitorData>,
    max_size: usize,
    stats: QueueStats,
}

impl EventQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(max_size.min(64)),
            max_size: max_size.max(1),
            stats: QueueStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// `add(item)`: always appends; if at capacity, evicts the oldest
    /// (head) item first and returns `QueueSignal::QueueFull`
    /// (spec.md §4.1, §8 property 3).
    pub fn add(&mut self, item: MonitorData) -> Option<QueueSignal> {
        let signal = if self.items.len() >= self.max_size {
            self.items.pop_front();
            Some(QueueSignal::QueueFull)
        } else {
            None
        };
        self.items.push_back(item);
        signal
    }

    /// Removes up to `n` items from the head, preserving insertion order
    /// (spec.md §4.1, §8 properties 4/5).
    pub fn get_batch(&mut self, n: usize) -> Vec<MonitorData> {
        let take = n.min(self.items.len());
        self.items.drain(..take).collect()
    }

    /// Returns and clears all items.
    pub fn flush(&mut self) -> Vec<MonitorData> {
        self.items.drain(..).collect()
    }

    /// No-op beyond stats bookkeeping (spec.md §4.1).
    pub fn on_send_success(&mut self, batch: &[MonitorData]) {
        self.stats.success_count += batch.len() as u64;
    }

    /// Unshifts the failed batch back to the head (so the next `get_batch`
    /// sees it again, preserving order), then truncates to `max_size`
    /// keeping the newest items on overflow, and reports
    /// `QueueSignal::FlushError` (spec.md §4.1, §8 property 5).
    pub fn on_send_error(&mut self, batch: Vec<MonitorData>) -> QueueSignal {
        self.stats.failed_count += batch.len() as u64;
        for item in batch.into_iter().rev() {
            self.items.push_front(item);
        }
        while self.items.len() > self.max_size {
            // Newest-wins: the tail holds the most recently added items,
            // so overflow trims from the front first... but the batch we
            // just unshifted is itself the oldest-by-origin data. Spec
            // says "truncates to maxSize (newest-wins on overflow)":
            // drop from the front (the oldest entries) to keep the
            // newest-appended items.
            self.items.pop_front();
        }
        QueueSignal::FlushError
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitorData> {
        self.items.iter()
    }

    /// Used by the persistence layer to snapshot up to `max_cache_size`
    /// most-recent items.
    pub fn snapshot(&self, max_cache_size: usize) -> Vec<MonitorData>
    where
        MonitorData: Clone,
    {
        let skip = self.items.len().saturating_sub(max_cache_size);
        self.items.iter().skip(skip).cloned().collect()
    }

    pub fn restore(&mut self, items: Vec<MonitorData>) {
        for item in items {
            self.add(item);
        }
    }
}
