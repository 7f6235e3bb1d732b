//! Delivery seams between the scheduler and the outside world.
//!
//! The scheduler only knows two things about subscribers: who is currently
//! eligible ([`SubscriberSource`]) and how to hand a frame to one of them
//! ([`Transport`]). Sends are fire-and-forget; a transport must not block
//! waiting on the remote side.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Identifier of a replication subscriber.
pub type SubscriberId = String;

/// Failure to hand a frame to a subscriber.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No live connection for this subscriber.
    #[error("subscriber {0} is not connected")]
    Disconnected(SubscriberId),

    /// The outbound queue is saturated.
    #[error("outbound queue for {0} is full")]
    Full(SubscriberId),

    /// The frame can never be carried by this transport. Retrying the same
    /// frame will fail the same way.
    #[error("frame of {len} bytes for {subscriber} exceeds the transport limit")]
    TooLarge { subscriber: SubscriberId, len: usize },

    /// Socket-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sink that accepts framed messages for a subscriber.
pub trait Transport: Send + Sync {
    /// Queue `frame` for delivery to `subscriber`.
    fn send(&self, subscriber: &str, frame: Bytes) -> Result<(), TransportError>;
}

/// Provider of the subscribers that should currently receive updates.
pub trait SubscriberSource: Send + Sync {
    fn eligible(&self) -> BTreeSet<SubscriberId>;
}

/// In-process transport over unbounded tokio channels.
///
/// Each connected subscriber owns the receiving half. A subscriber stays
/// eligible while its receiver is alive; dropping the receiver is the same
/// as disconnecting.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    senders: Mutex<HashMap<SubscriberId, mpsc::UnboundedSender<Bytes>>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a subscriber, replacing any previous connection under the
    /// same id.
    pub fn connect(&self, subscriber: impl Into<SubscriberId>) -> mpsc::UnboundedReceiver<Bytes> {
        let subscriber = subscriber.into();
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(subscriber = %subscriber, "channel subscriber connected");
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subscriber, tx);
        rx
    }

    /// Disconnect a subscriber. Returns whether it was connected.
    pub fn disconnect(&self, subscriber: &str) -> bool {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subscriber)
            .is_some()
    }

    /// Number of registered subscribers, closed or not.
    pub fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for ChannelTransport {
    fn send(&self, subscriber: &str, frame: Bytes) -> Result<(), TransportError> {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = senders.get(subscriber) else {
            return Err(TransportError::Disconnected(subscriber.to_string()));
        };
        if tx.send(frame).is_err() {
            senders.remove(subscriber);
            return Err(TransportError::Disconnected(subscriber.to_string()));
        }
        Ok(())
    }
}

impl SubscriberSource for ChannelTransport {
    fn eligible(&self) -> BTreeSet<SubscriberId> {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|_, tx| !tx.is_closed());
        senders.keys().cloned().collect()
    }
}
