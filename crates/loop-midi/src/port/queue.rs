//! The bounded, minimally-locked queue a backend's input callback thread
//! pushes decoded events onto (§5, §10.5). `crossbeam_channel::bounded`
//! stands in for the design notes' "bounded lock-free queue": it is a
//! real, bounded MPSC queue without a hand-rolled ring buffer.

use crate::error::OverflowError;
use crate::event::Event;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// A clonable producer handle, given to a backend's callback thread; the
/// consumer side stays with the port object itself.
#[derive(Debug, Clone)]
pub struct InboundProducer {
    sender: Sender<Event>,
    dropped: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl InboundProducer {
    /// Pushes `event`. When the queue is full the event is dropped and the
    /// running drop count is incremented rather than blocking the
    /// callback thread (§5 "callbacks must push... and return").
    pub fn push(&self, event: Event) -> Result<(), OverflowError> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                let dropped = self
                    .dropped
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
                    + 1;
                Err(OverflowError { dropped })
            }
        }
    }
}

#[derive(Debug)]
pub struct InboundQueue {
    receiver: Receiver<Event>,
    producer: InboundProducer,
}

impl InboundQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        InboundQueue {
            receiver,
            producer: InboundProducer {
                sender,
                dropped: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0)),
            },
        }
    }

    /// A cloneable handle callback threads can hold independently of the
    /// queue's consumer side.
    pub fn producer(&self) -> InboundProducer {
        self.producer.clone()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn pop(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    pub fn dropped_count(&self) -> u64 {
        self.producer.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }
}
