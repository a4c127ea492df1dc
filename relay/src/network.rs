//! Relay network layer: WebSocket accept loop, per-connection IO tasks and
//! operator-driven broadcast.

use crate::connections::{ConnectionId, ConnectionSet};
use crate::error::RelayError;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{OperatorCommand, GREETING};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Messages sent from connection tasks to the relay loop
pub enum RelayEvent {
    Accepted {
        stream: WebSocketStream<TcpStream>,
        addr: SocketAddr,
    },
    ClientMessage {
        id: ConnectionId,
        text: String,
    },
    ClientDisconnected {
        id: ConnectionId,
    },
}

/// Command relay server.
///
/// Accept, read, disconnect and operator events all funnel into one loop in
/// [`RelayServer::run`], which is the only place the connection set changes.
pub struct RelayServer {
    listener: TcpListener,
    connections: ConnectionSet,
    writers: Vec<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<RelayEvent>,
    events_rx: mpsc::UnboundedReceiver<RelayEvent>,
}

impl RelayServer {
    pub async fn bind(addr: &str) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("WebSocket server running on ws://{}", listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            listener,
            connections: ConnectionSet::new(),
            writers: Vec::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs until the operator sends `quit`.
    ///
    /// If the operator channel closes the relay keeps serving; it then stops
    /// only when dropped.
    pub async fn run(
        mut self,
        mut operator: mpsc::Receiver<OperatorCommand>,
    ) -> Result<(), RelayError> {
        info!("Waiting for game clients to connect...");
        let mut operator_open = true;

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_handshake(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                },

                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                },

                command = operator.recv(), if operator_open => {
                    match command {
                        Some(OperatorCommand::Broadcast(line)) => self.broadcast(&line),
                        Some(OperatorCommand::Quit) => break,
                        None => {
                            debug!("Operator input closed");
                            operator_open = false;
                        }
                    }
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Sends `line` to every writable connection and logs the outcome.
    pub fn broadcast(&mut self, line: &str) {
        let report = self.connections.broadcast(line);
        info!(
            "Sent command: {} ({} clients, {} skipped)",
            line, report.delivered, report.skipped
        );
    }

    fn spawn_handshake(&self, stream: TcpStream, addr: SocketAddr) {
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            match accept_async(stream).await {
                Ok(stream) => {
                    let _ = events.send(RelayEvent::Accepted { stream, addr });
                }
                Err(e) => warn!("WebSocket handshake with {} failed: {}", addr, e),
            }
        });
    }

    fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Accepted { stream, addr } => self.on_connect(stream, addr),
            RelayEvent::ClientMessage { id, text } => {
                // Observed only; the relay does not answer clients
                info!("Received from client {}: {}", id, text);
            }
            RelayEvent::ClientDisconnected { id } => {
                if self.connections.remove(id).is_some() {
                    info!("Client {} disconnected", id);
                }
            }
        }
    }

    fn on_connect(&mut self, stream: WebSocketStream<TcpStream>, addr: SocketAddr) {
        let (mut sink, mut stream) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let id = self.connections.add(addr, tx);
        info!("Client {} connected from {}", id, addr);

        self.writers.retain(|writer| !writer.is_finished());
        self.writers.push(tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    warn!("Send to client {} failed: {}", id, e);
                    break;
                }
                if closing {
                    break;
                }
            }
        }));

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let text = text.as_str().to_string();
                        if events.send(RelayEvent::ClientMessage { id, text }).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Binary(data)) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        if events.send(RelayEvent::ClientMessage { id, text }).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Client {} read error: {}", id, e);
                        break;
                    }
                }
            }
            let _ = events.send(RelayEvent::ClientDisconnected { id });
        });

        self.connections.send_to(id, Message::text(GREETING));
    }

    /// Stops accepting, closes every connection and waits briefly for the
    /// close frames to be written.
    async fn shutdown(self) {
        info!("Shutting down server...");
        let RelayServer {
            listener,
            mut connections,
            writers,
            ..
        } = self;
        drop(listener);

        let closed = connections.close_all();
        debug!("Closing {} client connections", closed);

        for writer in writers {
            if timeout(SHUTDOWN_FLUSH_TIMEOUT, writer).await.is_err() {
                warn!("Timed out flushing client connection");
            }
        }
    }
}
