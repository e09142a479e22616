//! Cancelable producer/consumer pairs.
//!
//! A source creates a [`Publisher`] / [`Subscription`] pair with
//! [`subscription`] and keeps the publisher in the task that drives the
//! underlying listener. Cancelling or dropping the [`Subscription`] fires
//! the shared [`CancellationToken`]; the producing task must watch
//! [`Publisher::closed`] and unregister its listener when it resolves.

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default buffer between a producer and its subscriber.
pub const DEFAULT_CAPACITY: usize = 16;

/// Create a connected publisher/subscription pair.
pub fn subscription<T>(capacity: usize) -> (Publisher<T>, Subscription<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancel = CancellationToken::new();
    (
        Publisher {
            tx,
            cancel: cancel.clone(),
        },
        Subscription { rx, cancel },
    )
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Producing half, owned by the task that feeds a subscription.
#[derive(Debug)]
pub struct Publisher<T> {
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
}

impl<T> Publisher<T> {
    /// Deliver one value. Returns `false` once the subscriber has cancelled
    /// or gone away; the producer should stop.
    pub async fn send(&self, value: T) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(value) => sent.is_ok(),
        }
    }

    /// Resolves when the subscriber cancels or is dropped.
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Consuming half of a push stream. Dropping it cancels the producer.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancellationToken,
}

impl<T> Subscription<T> {
    /// Next value, or `None` once cancelled or the producer finished.
    pub async fn recv(&mut self) -> Option<T> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            value = self.rx.recv() => value,
        }
    }

    /// Stop the producer. Further [`recv`](Self::recv) calls return `None`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn into_stream(self) -> impl Stream<Item = T>
    where
        T: Send + 'static,
    {
        futures::stream::unfold(self, |mut subscription| async move {
            let value = subscription.recv().await?;
            Some((value, subscription))
        })
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// SubscriptionSlot
// ---------------------------------------------------------------------------

/// Holds at most one active subscription to a stream.
#[derive(Debug)]
pub struct SubscriptionSlot<T> {
    current: Option<Subscription<T>>,
}

impl<T> Default for SubscriptionSlot<T> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<T> SubscriptionSlot<T> {
    /// Install `next`, cancelling the previous subscription first.
    pub fn replace(&mut self, next: Subscription<T>) {
        self.cancel();
        self.current = Some(next);
    }

    /// Cancel and clear the active subscription, if any.
    pub fn cancel(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|s| !s.is_cancelled())
    }

    /// Next value of the active subscription. Pends forever while the slot
    /// is empty, so it can sit in a `select!` next to other sources.
    pub async fn recv(&mut self) -> Option<T> {
        match self.current.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => std::future::pending().await,
        }
    }
}
