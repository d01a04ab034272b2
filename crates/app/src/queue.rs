//! Request queue — FIFO, unbounded, in-memory.
//!
//! This is the single synchronization boundary of the pipeline: adapters
//! and timers append concurrently through the rule engine while the driver
//! loop drains. A plain mutex around the deque is all the locking the core
//! needs.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::request::Request;

/// An ordered buffer of validated requests awaiting execution.
#[derive(Debug, Default)]
pub struct RequestQueue {
    inner: Mutex<VecDeque<Request>>,
}

impl RequestQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request. Ordering across all targets is strictly insertion
    /// order; there is no priority and no dedup.
    pub fn enqueue(&self, request: Request) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(request);
    }

    /// Pop the oldest request, or `None` when empty.
    pub fn dequeue(&self) -> Option<Request> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use homeguard_domain::command::Command;
    use homeguard_domain::id::ItemId;
    use homeguard_domain::item::{ElementSettings, ItemSettings};

    use super::*;
    use crate::item::{Item, ItemRef};

    fn request(tag: &str) -> Request {
        let sender = ItemRef::new(Arc::new(Item::new(
            ItemId::new(tag),
            ItemSettings::Element(ElementSettings::default()),
        )));
        Request::new(sender).with_command(Command::Dummy)
    }

    #[test]
    fn should_drain_in_insertion_order() {
        let queue = RequestQueue::new();
        queue.enqueue(request("first"));
        queue.enqueue(request("second"));
        queue.enqueue(request("third"));

        let drained: Vec<_> = std::iter::from_fn(|| queue.dequeue())
            .map(|r| r.sender.id().unwrap().to_string())
            .collect();
        assert_eq!(drained, ["first", "second", "third"]);
    }

    #[test]
    fn should_return_none_when_empty() {
        let queue = RequestQueue::new();
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn should_accept_appends_from_multiple_threads() {
        let queue = Arc::new(RequestQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        queue.enqueue(request("producer"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 400);
    }
}
