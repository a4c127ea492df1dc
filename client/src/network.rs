//! Outbound WebSocket connection to the relay.
//!
//! The channel is driven from the host's frame loop: transport completions and
//! inbound frames are queued by background tasks and only acted upon inside
//! [`CommandChannel::tick`], so dispatch never runs concurrently with
//! game-state mutation and a tick never waits on the network.

use crate::dispatcher::CommandDispatcher;
use crate::error::ChannelError;
use crate::game::GameActions;
use crate::lifecycle::{ConnectAttempt, ConnectionState, Lifecycle};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ChannelConfig, Command};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Events queued for the next tick. Transport events carry the generation of
/// the attempt or connection that produced them so late events from a
/// replaced one can be discarded.
enum TransportEvent {
    Opened { generation: u64, stream: WsStream },
    ConnectFailed { generation: u64, error: ChannelError },
    Frame { generation: u64, payload: Vec<u8> },
    Closed { generation: u64, reason: String },
    Failed { generation: u64, error: String },
    ReconnectDue { id: u64 },
}

/// Notifications delivered to observers registered with
/// [`CommandChannel::observe`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelNotice {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    Opened {
        url: String,
    },
    Closed {
        reason: String,
    },
    Error {
        message: String,
    },
    ReconnectScheduled {
        delay: Duration,
    },
    CommandDispatched(Command),
}

type Observer = Box<dyn FnMut(&ChannelNotice) + Send>;

/// A single pending delayed retry. Dropping it cancels the retry.
struct ReconnectTask {
    id: u64,
    handle: JoinHandle<()>,
}

impl ReconnectTask {
    fn schedule(id: u64, delay: Duration, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let _ = events.send(TransportEvent::ReconnectDue { id });
        });
        Self { id, handle }
    }
}

impl Drop for ReconnectTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn open_stream(url: &str) -> Result<WsStream, ChannelError> {
    match timeout(CONNECT_TIMEOUT, connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(ChannelError::Transport(e)),
        Err(_) => Err(ChannelError::Timeout(CONNECT_TIMEOUT)),
    }
}

pub struct CommandChannel {
    config: ChannelConfig,
    lifecycle: Lifecycle,
    dispatcher: CommandDispatcher,

    generation: u64,
    sink: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
    handshake: Option<JoinHandle<()>>,
    reconnect: Option<ReconnectTask>,
    reconnect_seq: u64,

    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    observers: Vec<Observer>,
}

impl CommandChannel {
    pub fn new(config: ChannelConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            lifecycle: Lifecycle::new(config.reconnect_delay()),
            dispatcher: CommandDispatcher::new(config.enable_logging),
            config,
            generation: 0,
            sink: None,
            reader: None,
            handshake: None,
            reconnect: None,
            reconnect_seq: 0,
            events_tx,
            events_rx,
            observers: Vec::new(),
        }
    }

    /// Registers a callback for lifecycle and dispatch notifications.
    pub fn observe(&mut self, observer: impl FnMut(&ChannelNotice) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    pub fn status(&self) -> &'static str {
        self.lifecycle.state().as_str()
    }

    pub fn is_connected(&self) -> bool {
        self.lifecycle.state() == ConnectionState::Open
    }

    /// A retry is scheduled and has not been consumed by a tick yet.
    pub fn has_pending_reconnect(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Whether the owning component is live. Retries are skipped while inactive.
    pub fn set_active(&mut self, active: bool) {
        self.lifecycle.set_active(active);
    }

    /// Connects immediately when autoconnect is configured.
    pub async fn start(&mut self) {
        self.log("Command channel initialized.");
        if self.config.autoconnect {
            let _ = self.connect().await;
        }
    }

    /// Performs one connection attempt and waits for the handshake.
    ///
    /// On failure the reconnect policy has already been applied by the time
    /// this returns; the error is reported for the caller's information only.
    pub async fn connect(&mut self) -> Result<(), ChannelError> {
        let Some(url) = self.begin_attempt() else {
            return Ok(());
        };

        let result = open_stream(&url).await;
        self.finish_connect(url, result)
    }

    /// Explicit teardown. Reconnection stays disabled until [`resume`].
    ///
    /// [`resume`]: CommandChannel::resume
    pub async fn disconnect(&mut self) -> Result<(), ChannelError> {
        self.reconnect = None;
        self.abort_handshake();

        if !self.transition(|lifecycle| lifecycle.begin_close()) {
            self.release_transport();
            return Ok(());
        }

        // Anything the old reader or handshake still reports is stale from here on
        self.generation += 1;

        let result = match self.sink.take() {
            Some(mut sink) => match timeout(CLOSE_TIMEOUT, sink.close()).await {
                Ok(result) => result.map_err(ChannelError::Transport),
                Err(_) => Err(ChannelError::Timeout(CLOSE_TIMEOUT)),
            },
            None => Ok(()),
        };

        if let Some(mut reader) = self.reader.take() {
            if timeout(CLOSE_TIMEOUT, &mut reader).await.is_err() {
                reader.abort();
            }
        }

        self.transition(|lifecycle| lifecycle.closed());

        match result {
            Ok(()) => {
                self.log("Disconnected from WebSocket server");
                Ok(())
            }
            Err(e) => {
                error!("Error disconnecting: {}", e);
                Err(e)
            }
        }
    }

    /// Host went to background: stop reconnecting and drop the connection.
    pub async fn pause(&mut self) {
        self.lifecycle.pause();
        let _ = self.disconnect().await;
    }

    /// Host came back: re-enable reconnection and connect if autoconnect is set.
    pub async fn resume(&mut self) {
        if self.lifecycle.resume(self.config.autoconnect) {
            let _ = self.connect().await;
        }
    }

    /// Sends an informational text frame to the relay.
    pub async fn send_text(&mut self, text: &str) -> Result<(), ChannelError> {
        if self.lifecycle.state() != ConnectionState::Open {
            return Err(ChannelError::NotConnected);
        }

        let sink = self.sink.as_mut().ok_or(ChannelError::NotConnected)?;
        sink.send(Message::text(text.to_string())).await?;
        Ok(())
    }

    /// Runs a command that did not come over the network (local test input)
    /// through the same dispatcher.
    pub fn process_command<A: GameActions + ?Sized>(&mut self, raw: &str, actions: &mut A) -> Command {
        let command = self.dispatcher.dispatch_text(raw, actions);
        self.notify(ChannelNotice::CommandDispatched(command.clone()));
        command
    }

    /// Delivers everything queued since the last tick, in arrival order.
    ///
    /// Call once per host frame. Returns the number of frames dispatched.
    /// Due retries start their handshake in the background; its outcome is
    /// applied on a later tick.
    pub async fn tick<A: GameActions + ?Sized>(&mut self, actions: &mut A) -> usize {
        let mut dispatched = 0;

        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                TransportEvent::Opened { generation, stream } => {
                    if !self.is_pending(generation) {
                        continue;
                    }

                    self.handshake = None;
                    let url = self.config.url.clone();
                    let _ = self.finish_connect(url, Ok(stream));
                }
                TransportEvent::ConnectFailed { generation, error } => {
                    if !self.is_pending(generation) {
                        continue;
                    }

                    self.handshake = None;
                    let url = self.config.url.clone();
                    let _ = self.finish_connect(url, Err(error));
                }
                TransportEvent::Frame {
                    generation,
                    payload,
                } => {
                    if !self.is_current(generation) {
                        continue;
                    }

                    self.log(&format!("Received: {}", String::from_utf8_lossy(&payload)));
                    let command = self.dispatcher.dispatch_bytes(&payload, actions);
                    self.notify(ChannelNotice::CommandDispatched(command));
                    dispatched += 1;
                }
                TransportEvent::Closed { generation, reason } => {
                    if !self.is_current(generation) {
                        continue;
                    }

                    self.log(&format!("WebSocket closed: {}", reason));
                    self.notify(ChannelNotice::Closed {
                        reason: reason.clone(),
                    });
                    self.handle_failure(reason);
                }
                TransportEvent::Failed { generation, error } => {
                    if !self.is_current(generation) {
                        continue;
                    }

                    error!("WebSocket error: {}", error);
                    self.handle_failure(error);
                }
                TransportEvent::ReconnectDue { id } => {
                    if self.reconnect.as_ref().map(|task| task.id) != Some(id) {
                        debug!("Ignoring superseded reconnect {}", id);
                        continue;
                    }

                    self.reconnect = None;
                    if self.lifecycle.reconnect_due() {
                        self.spawn_connect();
                    } else {
                        debug!("Scheduled reconnect skipped");
                    }
                }
            }
        }

        dispatched
    }

    fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.lifecycle.state() == ConnectionState::Open
    }

    fn is_pending(&self, generation: u64) -> bool {
        generation == self.generation && self.lifecycle.state() == ConnectionState::Connecting
    }

    /// Moves to `Connecting` and returns the URL to dial, or `None` when the
    /// lifecycle refuses a new attempt.
    fn begin_attempt(&mut self) -> Option<String> {
        match self.transition(|lifecycle| lifecycle.begin_connect()) {
            ConnectAttempt::Start => {}
            ConnectAttempt::AlreadyOpen => {
                self.log("Already connected");
                return None;
            }
            ConnectAttempt::Busy => {
                debug!("Connect ignored while {}", self.lifecycle.state());
                return None;
            }
            ConnectAttempt::Disabled => {
                debug!("Connect ignored, reconnection disabled");
                return None;
            }
        }

        // A new attempt supersedes any pending retry
        self.reconnect = None;
        self.generation += 1;

        let url = self.config.url.clone();
        self.log(&format!("Connecting to: {}", url));
        Some(url)
    }

    /// Starts a handshake on a background task; `tick` applies the outcome.
    fn spawn_connect(&mut self) {
        let Some(url) = self.begin_attempt() else {
            return;
        };

        let generation = self.generation;
        let events = self.events_tx.clone();
        self.handshake = Some(tokio::spawn(async move {
            let event = match open_stream(&url).await {
                Ok(stream) => TransportEvent::Opened { generation, stream },
                Err(error) => TransportEvent::ConnectFailed { generation, error },
            };
            let _ = events.send(event);
        }));
    }

    fn finish_connect(
        &mut self,
        url: String,
        result: Result<WsStream, ChannelError>,
    ) -> Result<(), ChannelError> {
        match result {
            Ok(stream) => {
                self.attach(stream);
                self.transition(|lifecycle| lifecycle.opened());
                self.log("Connected to WebSocket server!");
                self.notify(ChannelNotice::Opened { url });
                Ok(())
            }
            Err(e) => {
                error!("Connection failed: {}", e);
                self.handle_failure(e.to_string());
                Err(e)
            }
        }
    }

    fn attach(&mut self, stream: WsStream) {
        self.release_transport();

        let generation = self.generation;
        let events = self.events_tx.clone();
        let (sink, mut stream) = stream.split();

        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let event = match message {
                    Ok(Message::Text(text)) => TransportEvent::Frame {
                        generation,
                        payload: text.as_str().as_bytes().to_vec(),
                    },
                    Ok(Message::Binary(data)) => TransportEvent::Frame {
                        generation,
                        payload: data.to_vec(),
                    },
                    Ok(Message::Close(frame)) => {
                        let reason = match frame {
                            Some(frame) => {
                                format!("{} {}", u16::from(frame.code), frame.reason.as_str())
                            }
                            None => "closed by remote".to_string(),
                        };
                        let _ = events.send(TransportEvent::Closed { generation, reason });
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = events.send(TransportEvent::Failed {
                            generation,
                            error: e.to_string(),
                        });
                        return;
                    }
                };

                if events.send(event).is_err() {
                    return;
                }
            }

            let _ = events.send(TransportEvent::Closed {
                generation,
                reason: "stream ended".to_string(),
            });
        });

        self.sink = Some(sink);
        self.reader = Some(reader);
    }

    fn abort_handshake(&mut self) {
        if let Some(handshake) = self.handshake.take() {
            handshake.abort();
        }
    }

    fn release_transport(&mut self) {
        self.abort_handshake();
        self.sink = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    /// Applies the reconnect policy after a failed attempt or a dropped connection.
    fn handle_failure(&mut self, message: String) {
        self.release_transport();

        if !self.transition(|lifecycle| lifecycle.fail()) {
            return;
        }
        self.notify(ChannelNotice::Error { message });

        if let Some(delay) = self.transition(|lifecycle| lifecycle.recover()) {
            self.log(&format!(
                "Attempting to reconnect in {:.1} seconds...",
                delay.as_secs_f32()
            ));
            self.reconnect_seq += 1;
            self.reconnect = Some(ReconnectTask::schedule(
                self.reconnect_seq,
                delay,
                self.events_tx.clone(),
            ));
            self.notify(ChannelNotice::ReconnectScheduled { delay });
        } else {
            warn!("Not reconnecting: reconnection disabled or channel inactive");
        }
    }

    fn transition<R>(&mut self, change: impl FnOnce(&mut Lifecycle) -> R) -> R {
        let from = self.lifecycle.state();
        let result = change(&mut self.lifecycle);
        let to = self.lifecycle.state();

        if from != to {
            debug!("Channel state {} -> {}", from, to);
            self.notify(ChannelNotice::StateChanged { from, to });
        }

        result
    }

    fn notify(&mut self, notice: ChannelNotice) {
        for observer in &mut self.observers {
            observer(&notice);
        }
    }

    fn log(&self, message: &str) {
        if self.config.enable_logging {
            info!("{}", message);
        }
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.release_transport();
    }
}
