use std::sync::Arc;

use tokio::sync::broadcast;

use beacon_types::events::ChannelEvent;

/// Default bound for each subscriber's delivery queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out hub for the alert channel.
///
/// Built on a single `tokio::sync::broadcast` channel: every subscription
/// gets an independent queue bounded by the channel capacity. A subscriber
/// that falls behind overflows alone: its oldest undelivered events are
/// dropped (drop-oldest) and surfaced as [`Delivery::Lagged`], while the
/// publisher and every other subscriber proceed unaffected. Events from a
/// single publisher reach each subscriber in publish order; nothing is
/// guaranteed across publishers.
#[derive(Clone)]
pub struct AlertDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    tx: broadcast::Sender<ChannelEvent>,
}

impl AlertDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(DispatcherInner { tx }),
        }
    }

    /// Publish an event to every currently-open subscription. Best-effort,
    /// at-most-once per subscriber, no acknowledgment. Returns the number
    /// of subscribers the event was offered to; zero when nobody listens,
    /// which is not an error.
    pub fn publish(&self, event: ChannelEvent) -> usize {
        self.inner.tx.send(event).unwrap_or(0)
    }

    /// Open a new subscription, observing only events published after this
    /// call. Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> AlertSubscription {
        AlertSubscription {
            rx: self.inner.tx.subscribe(),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }
}

/// A live subscription: a lazy, conceptually infinite sequence of events.
/// It cannot be restarted; a replacement subscription starts fresh from
/// its own open point.
pub struct AlertSubscription {
    rx: broadcast::Receiver<ChannelEvent>,
}

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(ChannelEvent),
    /// The subscriber fell behind; this many of its oldest undelivered
    /// events were dropped. The sequence resumes with the oldest retained.
    Lagged(u64),
}

impl AlertSubscription {
    /// Wait for the next event, suspending indefinitely while the channel
    /// is open. Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        match self.rx.recv().await {
            Ok(event) => Some(Delivery::Event(event)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => Some(Delivery::Lagged(skipped)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}
