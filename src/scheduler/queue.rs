//! Priority-ordered operation queue

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::Operation;

/// An operation waiting in the queue
#[derive(Debug, Clone)]
pub struct QueuedOperation {
    pub operation: Operation,
    /// Monotonic instant at which the operation becomes eligible
    pub ready_at: Instant,
    /// Insertion sequence, breaks priority ties FIFO
    seq: u64,
}

impl Eq for QueuedOperation {}

impl PartialEq for QueuedOperation {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Ord for QueuedOperation {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first, then earlier insertion
        self.operation
            .priority
            .cmp(&other.operation.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedOperation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Convert a wall-clock schedule time into a monotonic eligibility instant
///
/// Times in the past map to `now`.
pub fn ready_instant(scheduled_at: DateTime<Utc>, now_utc: DateTime<Utc>, now: Instant) -> Instant {
    match (scheduled_at - now_utc).to_std() {
        Ok(delay) => now + delay,
        Err(_) => now,
    }
}

/// Per-campaign holding area for pending and retrying operations
#[derive(Debug, Default)]
pub struct OperationQueue {
    heap: BinaryHeap<QueuedOperation>,
    next_seq: u64,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an operation that becomes eligible at `ready_at`
    pub fn push(&mut self, operation: Operation, ready_at: Instant) {
        debug!(id = %operation.id, priority = operation.priority, "OperationQueue::push: called");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedOperation {
            operation,
            ready_at,
            seq,
        });
    }

    /// Remove up to `max_count` eligible operations in dispatch order
    ///
    /// Operations not yet eligible keep their position.
    pub fn dequeue_eligible(&mut self, max_count: usize, now: Instant) -> Vec<Operation> {
        debug!(max_count, queued = self.heap.len(), "OperationQueue::dequeue_eligible: called");
        let mut taken = Vec::new();
        let mut deferred = Vec::new();

        while taken.len() < max_count {
            match self.heap.pop() {
                Some(entry) if entry.ready_at <= now => taken.push(entry.operation),
                Some(entry) => deferred.push(entry),
                None => break,
            }
        }

        // Original sequence numbers are kept, so deferred entries return to the same spot
        self.heap.extend(deferred);

        debug!(taken = taken.len(), remaining = self.heap.len(), "OperationQueue::dequeue_eligible: done");
        taken
    }

    /// Remove a queued operation by id
    pub fn remove(&mut self, id: &str) -> Option<Operation> {
        debug!(%id, "OperationQueue::remove: called");
        let mut removed = None;
        let entries: Vec<_> = self.heap.drain().collect();
        for entry in entries {
            if removed.is_none() && entry.operation.id == id {
                removed = Some(entry.operation);
            } else {
                self.heap.push(entry);
            }
        }
        removed
    }

    /// Queued operations in dispatch order (ignoring eligibility)
    pub fn snapshot(&self) -> Vec<Operation> {
        let mut entries: Vec<_> = self.heap.iter().collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|e| e.operation.clone()).collect()
    }

    /// Remove everything, returning the discarded operations
    pub fn clear(&mut self) -> Vec<Operation> {
        self.heap.drain().map(|e| e.operation).collect()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationType;
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn op(priority: i32) -> Operation {
        Operation::new("camp-1", OperationType::CreatePlacement, json!({}), priority, 3, None)
    }

    #[test]
    fn test_priority_ordering() {
        let mut queue = OperationQueue::new();
        let now = Instant::now();
        queue.push(op(1), now);
        queue.push(op(9), now);
        queue.push(op(5), now);

        let priorities: Vec<_> = queue.dequeue_eligible(10, now).iter().map(|o| o.priority).collect();
        assert_eq!(priorities, vec![9, 5, 1]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_priority_fifo() {
        let mut queue = OperationQueue::new();
        let now = Instant::now();
        let first = op(3);
        let second = op(3);
        let (first_id, second_id) = (first.id.clone(), second.id.clone());
        queue.push(first, now);
        queue.push(second, now);

        let ids: Vec<_> = queue.dequeue_eligible(2, now).into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![first_id, second_id]);
    }

    #[test]
    fn test_max_count_respected() {
        let mut queue = OperationQueue::new();
        let now = Instant::now();
        for p in 0..5 {
            queue.push(op(p), now);
        }
        assert_eq!(queue.dequeue_eligible(2, now).len(), 2);
        assert_eq!(queue.len(), 3);
        assert!(queue.dequeue_eligible(0, now).is_empty());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_future_operations_are_skipped() {
        let mut queue = OperationQueue::new();
        let now = Instant::now();
        let later = op(10);
        let later_id = later.id.clone();
        queue.push(later, now + Duration::from_secs(5));
        queue.push(op(1), now);

        let taken = queue.dequeue_eligible(5, now);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].priority, 1);
        assert_eq!(queue.len(), 1);

        let taken = queue.dequeue_eligible(5, now + Duration::from_secs(5));
        assert_eq!(taken[0].id, later_id);
    }

    #[test]
    fn test_deferred_entries_keep_fifo_position() {
        let mut queue = OperationQueue::new();
        let now = Instant::now();
        let a = op(2);
        let b = op(2);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        queue.push(a, now + Duration::from_secs(1));
        queue.push(b, now + Duration::from_secs(1));
        assert!(queue.dequeue_eligible(2, now).is_empty());

        let ids: Vec<_> = queue
            .dequeue_eligible(2, now + Duration::from_secs(1))
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![a_id, b_id]);
    }

    #[test]
    fn test_remove_and_snapshot() {
        let mut queue = OperationQueue::new();
        let now = Instant::now();
        let keep = op(1);
        let drop_me = op(7);
        let drop_id = drop_me.id.clone();
        queue.push(keep, now);
        queue.push(drop_me, now);

        assert_eq!(queue.snapshot()[0].id, drop_id);
        assert!(queue.remove(&drop_id).is_some());
        assert!(queue.remove(&drop_id).is_none());
        assert_eq!(queue.snapshot().len(), 1);
        assert_eq!(queue.clear().len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ready_instant_past_and_future() {
        let now = Instant::now();
        let now_utc = Utc::now();
        assert_eq!(ready_instant(now_utc - chrono::Duration::seconds(10), now_utc, now), now);
        assert_eq!(
            ready_instant(now_utc + chrono::Duration::seconds(10), now_utc, now),
            now + Duration::from_secs(10)
        );
    }

    proptest! {
        #[test]
        fn prop_dequeue_is_stable_priority_sort(priorities in proptest::collection::vec(-5i32..5, 0..40)) {
            let mut queue = OperationQueue::new();
            let now = Instant::now();
            let mut expected = Vec::new();
            for (idx, p) in priorities.iter().enumerate() {
                let operation = op(*p);
                expected.push((*p, idx, operation.id.clone()));
                queue.push(operation, now);
            }
            // Descending priority, ascending insertion index
            expected.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

            let got: Vec<_> = queue.dequeue_eligible(priorities.len(), now).into_iter().map(|o| o.id).collect();
            let want: Vec<_> = expected.into_iter().map(|(_, _, id)| id).collect();
            prop_assert_eq!(got, want);
        }
    }
}
