//! Bounded hand-off queue between request dispatch and forwarding.
//!
//! Many dispatcher tasks push, one forward stage pops. Producers never wait:
//! a push against a full queue fails immediately and the caller drops the
//! response.

use crate::types::Handoff;
use std::fmt;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Why a push was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    Full,
    Closed,
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full => write!(f, "hand-off queue is full"),
            PushError::Closed => write!(f, "hand-off queue is closed"),
        }
    }
}

impl std::error::Error for PushError {}

/// Producer side of the queue. Cheap to clone, one clone per dispatch.
#[derive(Clone)]
pub struct HandoffQueue {
    tx: mpsc::Sender<Handoff>,
}

/// Consumer side of the queue, owned by the forward stage.
pub struct HandoffReceiver {
    rx: mpsc::Receiver<Handoff>,
}

/// Creates a queue holding at most `capacity` handoffs (minimum 1).
pub fn handoff_queue(capacity: usize) -> (HandoffQueue, HandoffReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (HandoffQueue { tx }, HandoffReceiver { rx })
}

impl HandoffQueue {
    /// Enqueues without waiting.
    pub fn try_push(&self, handoff: Handoff) -> Result<(), PushError> {
        self.tx.try_send(handoff).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Number of handoffs currently queued.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.tx.capacity() == 0
    }

    /// Maximum number of queued handoffs.
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl HandoffReceiver {
    /// Dequeues the oldest handoff, or `None` if the queue is empty.
    pub fn try_pop(&mut self) -> Option<Handoff> {
        match self.rx.try_recv() {
            Ok(handoff) => Some(handoff),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::raw::RawConverter;
    use crate::types::Payload;
    use std::sync::Arc;

    fn handoff(url: &str) -> Handoff {
        Handoff {
            url: url.to_string(),
            converter: Arc::new(RawConverter::new("device", "default")),
            payload: Payload::Raw(Vec::new()),
        }
    }

    #[test]
    fn test_push_until_full() {
        let (queue, _rx) = handoff_queue(2);
        assert!(queue.is_empty());
        assert!(queue.try_push(handoff("a")).is_ok());
        assert!(queue.try_push(handoff("b")).is_ok());
        assert!(queue.is_full());
        assert_eq!(queue.try_push(handoff("c")), Err(PushError::Full));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_full_push_does_not_grow_queue() {
        let (queue, _rx) = handoff_queue(1);
        queue.try_push(handoff("first")).unwrap();
        let before = queue.len();

        assert_eq!(queue.try_push(handoff("second")), Err(PushError::Full));
        assert_eq!(queue.len(), before);
    }

    #[test]
    fn test_pop_is_fifo() {
        let (queue, mut rx) = handoff_queue(10);
        for url in ["a", "b", "c"] {
            queue.try_push(handoff(url)).unwrap();
        }

        let order: Vec<String> = std::iter::from_fn(|| rx.try_pop().map(|h| h.url)).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_frees_capacity() {
        let (queue, mut rx) = handoff_queue(1);
        queue.try_push(handoff("a")).unwrap();
        assert!(rx.try_pop().is_some());
        assert!(queue.try_push(handoff("b")).is_ok());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (queue, _rx) = handoff_queue(0);
        assert_eq!(queue.capacity(), 1);
    }

    #[test]
    fn test_push_after_receiver_dropped() {
        let (queue, rx) = handoff_queue(1);
        drop(rx);
        assert_eq!(queue.try_push(handoff("a")), Err(PushError::Closed));
    }
}
