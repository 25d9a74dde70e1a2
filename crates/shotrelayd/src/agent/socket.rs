//! Handle onto an agent connection's outbound queue.
//!
//! The connection thread owns the WebSocket. Everyone else talks to it through
//! an [`AgentSocket`], which only enqueues work and reads an open flag, so no
//! caller ever blocks on network I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use thiserror::Error;

use crate::protocol::{CloseReason, OutboundFrame};

/// Error returned when sending to a connection that has closed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("agent socket is closed")]
pub struct SocketClosed;

/// Send-side view of an agent connection.
pub trait AgentSocket: Send + Sync {
    /// Whether the connection still accepts frames.
    fn is_open(&self) -> bool;

    /// Queues a frame for the agent.
    ///
    /// # Errors
    ///
    /// Returns [`SocketClosed`] once the connection is closing or gone.
    fn send(&self, frame: OutboundFrame) -> Result<(), SocketClosed>;

    /// Asks the connection to close with the given reason.
    fn close(&self, reason: CloseReason);
}

/// Work items consumed by the connection thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outgoing {
    Frame(OutboundFrame),
    Close(CloseReason),
}

/// [`AgentSocket`] backed by an in-process channel.
#[derive(Debug)]
pub struct ChannelSocket {
    sender: Sender<Outgoing>,
    open: Arc<AtomicBool>,
}

/// Receiving half owned by the connection thread.
#[derive(Debug)]
pub(crate) struct SocketQueue {
    receiver: Receiver<Outgoing>,
    open: Arc<AtomicBool>,
}

/// Creates a connected socket handle and queue.
pub(crate) fn channel() -> (Arc<ChannelSocket>, SocketQueue) {
    let (sender, receiver) = mpsc::channel();
    let open = Arc::new(AtomicBool::new(true));
    let socket = Arc::new(ChannelSocket {
        sender,
        open: Arc::clone(&open),
    });
    (socket, SocketQueue { receiver, open })
}

impl AgentSocket for ChannelSocket {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send(&self, frame: OutboundFrame) -> Result<(), SocketClosed> {
        if !self.is_open() {
            return Err(SocketClosed);
        }
        self.sender
            .send(Outgoing::Frame(frame))
            .map_err(|_| SocketClosed)
    }

    fn close(&self, reason: CloseReason) {
        if self.open.swap(false, Ordering::SeqCst) {
            // The queue may already be gone; the flag is what callers observe.
            let _ = self.sender.send(Outgoing::Close(reason));
        }
    }
}

impl SocketQueue {
    /// Next queued item, if any.
    pub(crate) fn try_next(&self) -> Option<Outgoing> {
        match self.receiver.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Marks the connection as no longer accepting frames.
    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
