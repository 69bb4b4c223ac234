//! Piggy-backed gossip queue keyed by subject node name.

use std::collections::HashMap;

use parking_lot::Mutex;

/// A serialized gossip message ready to piggy-back onto an outgoing
/// datagram.
#[derive(Debug, Clone)]
pub struct BroadcastItem {
    /// Node name this item concerns; used for dedup/replacement.
    pub subject: String,
    /// Already-encoded message bytes.
    pub payload: Vec<u8>,
    /// Number of times this item has been sent so far.
    pub transmits: u32,
}

/// Gossip disseminator: a priority queue of pending items, fetched in
/// lowest-transmit-count-first order and retired once they have been sent
/// `maxTransmits` times.
#[derive(Default)]
pub struct BroadcastQueue {
    items: Mutex<HashMap<String, BroadcastItem>>,
}

impl BroadcastQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Enqueue a new item. Any existing item with the same subject is
    /// replaced outright (superseded by freshest state), including its
    /// transmit count, which resets to 0.
    pub fn push(&self, subject: impl Into<String>, payload: Vec<u8>) {
        let subject = subject.into();
        self.items.lock().insert(
            subject.clone(),
            BroadcastItem {
                subject,
                payload,
                transmits: 0,
            },
        );
    }

    /// Return an ordered batch of payloads whose combined length is at most
    /// `max_bytes`, preferring the lowest transmit count first and breaking
    /// ties lexicographically by subject for determinism. Each returned
    /// item's transmit count is incremented; items whose count then exceeds
    /// `max_transmits` are evicted from the queue. `fetch(0, _)` and
    /// `fetch(_, 0)` both return an empty batch without touching the queue.
    pub fn fetch(&self, max_transmits: u32, max_bytes: usize) -> Vec<Vec<u8>> {
        if max_bytes == 0 || max_transmits == 0 {
            return Vec::new();
        }

        let mut items = self.items.lock();
        let mut candidates: Vec<String> = items.keys().cloned().collect();
        candidates.sort_by(|a, b| {
            let ta = items[a].transmits;
            let tb = items[b].transmits;
            ta.cmp(&tb).then_with(|| a.cmp(b))
        });

        let mut out = Vec::new();
        let mut used = 0usize;
        for subject in candidates {
            let len = items[&subject].payload.len();
            if used + len > max_bytes {
                continue;
            }
            used += len;
            let item = items.get_mut(&subject).expect("subject present");
            out.push(item.payload.clone());
            item.transmits += 1;
            if item.transmits > max_transmits {
                items.remove(&subject);
            }
        }
        out
    }

    /// Number of items currently queued (mainly for tests/diagnostics).
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_zero_transmits_or_zero_bytes_is_empty() {
        let queue = BroadcastQueue::new();
        queue.push("a", vec![1, 2, 3]);
        assert!(queue.fetch(4, 0).is_empty());
        assert!(queue.fetch(0, 64).is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn push_replaces_existing_subject() {
        let queue = BroadcastQueue::new();
        queue.push("a", vec![1]);
        queue.fetch(4, 64);
        queue.push("a", vec![2, 2]);
        let batch = queue.fetch(4, 64);
        assert_eq!(batch, vec![vec![2, 2]]);
    }

    #[test]
    fn evicts_past_max_transmits() {
        let queue = BroadcastQueue::new();
        queue.push("a", vec![1]);
        for _ in 0..3 {
            queue.fetch(2, 64);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn respects_max_bytes_budget() {
        let queue = BroadcastQueue::new();
        queue.push("a", vec![0u8; 10]);
        queue.push("b", vec![0u8; 10]);
        let batch = queue.fetch(4, 15);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn ties_break_lexicographically_by_subject() {
        let queue = BroadcastQueue::new();
        queue.push("b", vec![1]);
        queue.push("a", vec![1]);
        let batch = queue.fetch(4, 64);
        assert_eq!(batch, vec![vec![1], vec![1]]);
    }

    proptest::proptest! {
        #[test]
        fn fetch_never_exceeds_max_bytes_budget(
            sizes in proptest::collection::vec(1usize..40, 1..12),
            max_bytes in 0usize..200,
        ) {
            let queue = BroadcastQueue::new();
            for (i, size) in sizes.iter().enumerate() {
                queue.push(format!("node-{i}"), vec![0u8; *size]);
            }
            let batch = queue.fetch(u32::MAX, max_bytes);
            let total: usize = batch.iter().map(Vec::len).sum();
            prop_assert!(total <= max_bytes);
        }

        #[test]
        fn fetch_evicts_exactly_past_max_transmits(max_transmits in 1u32..6) {
            let queue = BroadcastQueue::new();
            queue.push("a", vec![1, 2, 3]);
            for _ in 0..=max_transmits {
                queue.fetch(max_transmits, 64);
            }
            prop_assert!(queue.is_empty());
        }
    }

    #[test]
    fn fetch_with_zero_max_transmits_never_sends_or_evicts() {
        let queue = BroadcastQueue::new();
        queue.push("a", vec![1, 2, 3]);
        for _ in 0..5 {
            assert!(queue.fetch(0, 64).is_empty());
        }
        assert_eq!(queue.len(), 1);
    }
}
