//! Connection handle held by the registry.
//!
//! The socket itself lives in the connection's writer task (UI layer). The
//! registry only holds the sending half of that task's channel, together
//! with the room it belongs to and its liveness flag.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::{ConnectionId, EventId};

/// Command for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Pre-serialized text frame, shared between all recipients of a broadcast
    Text(Arc<str>),
    /// Heartbeat ping
    Ping,
    /// Close handshake with the given code and reason
    Close { code: u16, reason: String },
    /// Drop the transport without a close handshake
    Terminate,
}

/// Sending side of one viewer connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { id, sender }
    }

    /// Create a handle with a fresh id, returning the receiver the writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(ConnectionId::generate(), sender), receiver)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The writer task is still running
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a command; `false` if the writer task is gone.
    pub fn send(&self, command: Outbound) -> bool {
        self.sender.send(command).is_ok()
    }
}

/// A joined connection as tracked inside a room
#[derive(Debug)]
pub(crate) struct TrackedConnection {
    pub(crate) handle: ConnectionHandle,
    pub(crate) room: EventId,
    /// Cleared on every heartbeat tick, set again by a pong
    pub(crate) alive: bool,
    pub(crate) joined_at: i64,
}

impl TrackedConnection {
    pub(crate) fn new(handle: ConnectionHandle, room: EventId, joined_at: i64) -> Self {
        Self {
            handle,
            room,
            alive: true,
            joined_at,
        }
    }
}
