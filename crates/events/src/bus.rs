//! Fan-out of published events to collaborators.
//!
//! The bus only carries notifications: the books are the source of truth, so
//! a subscriber that falls behind can always re-read balances and logs. A
//! failed publish never rolls back the voucher or movement it announces.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// One subscriber's queue. Every subscriber receives its own copy of each
/// message published after it subscribed.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub(crate) fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait up to `timeout` for the next message; `None` on timeout or when
    /// the bus is gone.
    pub fn next_within(&self, timeout: Duration) -> Option<M> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Everything queued right now, in publication order.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Publisher side of the bus.
///
/// Engines are shared across request threads, hence `Send + Sync`.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
