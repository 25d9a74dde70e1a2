//! Opaque handles used to hand a capture result back to whoever asked.

use std::sync::mpsc::Sender;

use thiserror::Error;

/// Terminal result of a capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Base64 image data exactly as the agent sent it.
    Image {
        /// Encoded payload.
        payload: String,
    },
    /// Failure or timeout text.
    Text(String),
}

impl Delivery {
    /// Wraps a plain message.
    pub fn text(message: impl Into<String>) -> Self {
        Self::Text(message.into())
    }
}

/// Errors reported by a caller handle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The receiving side has gone away.
    #[error("caller is no longer reachable")]
    CallerGone,
}

/// Capability to deliver exactly one result to the original requester.
///
/// The broker never inspects a handle beyond this call.
pub trait CallerHandle: Send + Sync {
    /// Hands over a result.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the requester can no longer be reached.
    fn deliver(&self, delivery: Delivery) -> Result<(), DeliveryError>;
}

/// Caller handle backed by a channel; the receiver is usually a control
/// connection waiting for its capture result.
#[derive(Debug)]
pub struct ChannelCaller {
    sender: Sender<Delivery>,
}

impl ChannelCaller {
    /// Wraps the sending half of a channel.
    #[must_use]
    pub const fn new(sender: Sender<Delivery>) -> Self {
        Self { sender }
    }
}

impl CallerHandle for ChannelCaller {
    fn deliver(&self, delivery: Delivery) -> Result<(), DeliveryError> {
        self.sender
            .send(delivery)
            .map_err(|_| DeliveryError::CallerGone)
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingCaller;
