//! Bounded intake queue with drop-oldest overflow.
//!
//! Producers never block: when the queue is full the oldest entry is
//! discarded to admit the new one. A single consumer awaits entries in
//! FIFO order.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

/// Counters for queue monitoring
#[derive(Default)]
pub struct QueueMetrics {
    /// Total entries pushed
    pub pushed: AtomicU64,
    /// Total entries discarded to make room
    pub dropped: AtomicU64,
}

pub struct BatchQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    available: Notify,
    metrics: QueueMetrics,
}

impl<T> BatchQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");

        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            available: Notify::new(),
            metrics: QueueMetrics::default(),
        }
    }

    /// Push an entry. Returns true if the oldest entry was discarded to make room.
    pub fn push(&self, item: T) -> bool {
        let dropped = {
            let mut items = self.items.lock();
            let dropped = if items.len() >= self.capacity {
                items.pop_front();
                true
            } else {
                false
            };
            items.push_back(item);
            dropped
        };

        self.metrics.pushed.fetch_add(1, Ordering::Relaxed);
        if dropped {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.available.notify_one();
        dropped
    }

    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Wait for the next entry. Cancel-safe: nothing is removed until it is returned.
    pub async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            self.available.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_pushed(&self) -> u64 {
        self.metrics.pushed.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.metrics.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_push_and_pop_fifo() {
        let queue = BatchQueue::new(10);
        for i in 0..5 {
            assert!(!queue.push(i));
        }

        assert_eq!(queue.len(), 5);
        assert_eq!(queue.try_pop(), Some(0));
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = BatchQueue::new(3);
        let dropped: Vec<bool> = (0..5).map(|i| queue.push(i)).collect();

        assert_eq!(dropped, vec![false, false, false, true, true]);
        assert_eq!(queue.total_dropped(), 2);
        assert_eq!(queue.total_pushed(), 5);

        let remaining: Vec<i32> = std::iter::from_fn(|| queue.try_pop()).collect();
        assert_eq!(remaining, vec![2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        BatchQueue::<u8>::new(0);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(BatchQueue::new(4));
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push("batch");

        assert_eq!(consumer.await.unwrap(), "batch");
    }
}
