//! Pending reservation queue.
//!
//! Insertion-ordered FIFO with removal by id for cancellation. Removal is
//! an O(n) scan over a queue bounded by how many reservations peers keep
//! outstanding.

use std::collections::VecDeque;

use crate::request::QueuedRequest;

/// Ordered collection of admitted, not-yet-granted reservation requests.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<QueuedRequest>,
}

impl RequestQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an admitted request.
    pub fn push(&mut self, entry: QueuedRequest) {
        debug_assert!(
            !self.contains_id(&entry.request.id),
            "duplicate request id in pending queue"
        );
        self.entries.push_back(entry);
    }

    /// Remove and return the head of the queue.
    pub fn pop_front(&mut self) -> Option<QueuedRequest> {
        self.entries.pop_front()
    }

    /// Peek at the head of the queue.
    pub fn front(&self) -> Option<&QueuedRequest> {
        self.entries.front()
    }

    /// Remove the entry with the given id, preserving the relative order
    /// of everything else. Returns the removed entry if one matched.
    pub fn remove_by_id(&mut self, id: &str) -> Option<QueuedRequest> {
        let pos = self.entries.iter().position(|e| e.request.id == id)?;
        self.entries.remove(pos)
    }

    /// Whether an entry with the given id is queued.
    pub fn contains_id(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.request.id == id)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ReservationRequest;

    fn entry(id: &str) -> QueuedRequest {
        QueuedRequest {
            request: ReservationRequest::new(5.0).with_id(id),
            deadline: None,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut q = RequestQueue::new();
        q.push(entry("a"));
        q.push(entry("b"));
        q.push(entry("c"));
        assert_eq!(q.len(), 3);
        assert_eq!(q.front().unwrap().request.id, "a");
        assert_eq!(q.pop_front().unwrap().request.id, "a");
        assert_eq!(q.pop_front().unwrap().request.id, "b");
        assert_eq!(q.pop_front().unwrap().request.id, "c");
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn test_remove_by_id_preserves_order_of_rest() {
        let mut q = RequestQueue::new();
        q.push(entry("a"));
        q.push(entry("b"));
        q.push(entry("c"));

        let removed = q.remove_by_id("b").unwrap();
        assert_eq!(removed.request.id, "b");
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop_front().unwrap().request.id, "a");
        assert_eq!(q.pop_front().unwrap().request.id, "c");
    }

    #[test]
    fn test_remove_unknown_id_is_none() {
        let mut q = RequestQueue::new();
        q.push(entry("a"));
        assert!(q.remove_by_id("nope").is_none());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_contains_id() {
        let mut q = RequestQueue::new();
        assert!(!q.contains_id("a"));
        q.push(entry("a"));
        assert!(q.contains_id("a"));
        q.pop_front();
        assert!(!q.contains_id("a"));
    }
}
