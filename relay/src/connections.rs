//! Live connection set held by the relay
//!
//! This module tracks every open inbound WebSocket session:
//! - Connection registration and id assignment
//! - Per-connection writable state
//! - Broadcast fan-out with per-connection failure isolation
//! - Orderly close of all sessions at shutdown
//!
//! The set is only ever touched from the relay's event loop, so it needs no
//! locking. Each connection is written through an unbounded queue drained by
//! that connection's writer task.

use log::{info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

pub type ConnectionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Open,
    Closing,
}

/// One inbound session.
#[derive(Debug)]
pub struct Connection {
    /// Identifier assigned by the relay, starting at 1
    pub id: ConnectionId,
    /// Remote peer address
    pub addr: SocketAddr,
    /// When the handshake completed
    pub connected_at: Instant,
    state: LinkState,
    sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            state: LinkState::Open,
            sender,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Open and still has a live writer behind its queue.
    pub fn is_writable(&self) -> bool {
        self.state == LinkState::Open && !self.sender.is_closed()
    }

    pub fn send(&self, message: Message) -> bool {
        self.sender.send(message).is_ok()
    }

    /// Queues a close frame and stops accepting further writes.
    pub fn close(&mut self) {
        if self.is_writable() {
            let _ = self.sender.send(Message::Close(None));
        }
        self.state = LinkState::Closing;
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the line was queued for
    pub delivered: usize,
    /// Connections skipped because they were not writable
    pub skipped: usize,
    /// Connections whose send failed; these have been removed from the set
    pub failed: Vec<ConnectionId>,
}

/// Every connection currently held by the relay.
pub struct ConnectionSet {
    connections: HashMap<ConnectionId, Connection>,
    next_id: ConnectionId,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, addr: SocketAddr, sender: mpsc::UnboundedSender<Message>) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;

        self.connections.insert(id, Connection::new(id, addr, sender));
        id
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn send_to(&self, id: ConnectionId, message: Message) -> bool {
        self.connections
            .get(&id)
            .is_some_and(|connection| connection.is_writable() && connection.send(message))
    }

    /// Sends `line` as a text frame to every writable connection.
    ///
    /// A failed send only affects its own connection, which is dropped from
    /// the set once the pass is complete.
    pub fn broadcast(&mut self, line: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for connection in self.connections.values() {
            if !connection.is_writable() {
                report.skipped += 1;
                continue;
            }

            if connection.send(Message::text(line.to_string())) {
                report.delivered += 1;
            } else {
                warn!(
                    "Failed to send to client {} ({})",
                    connection.id, connection.addr
                );
                report.failed.push(connection.id);
            }
        }

        for id in &report.failed {
            if let Some(connection) = self.connections.remove(id) {
                info!("Removing client {} from set", connection.id);
            }
        }

        report
    }

    /// Queues a close frame for every connection and empties the set.
    pub fn close_all(&mut self) -> usize {
        let count = self.connections.len();
        for (_, mut connection) in self.connections.drain() {
            connection.close();
        }
        count
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionSet {
    fn default() -> Self {
        Self::new()
    }
}
