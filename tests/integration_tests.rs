//! Integration tests for the relay and the command channel client
//!
//! These tests run a real relay and real clients over loopback.

use client::game::{GameActions, RunnerState};
use client::lifecycle::ConnectionState;
use client::network::{ChannelNotice, CommandChannel};
use relay::network::RelayServer;
use relay::RelayError;
use shared::{ChannelConfig, OperatorCommand};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Counts collaborator calls.
#[derive(Debug, Default)]
struct CountingActions {
    lane_changes: Vec<i32>,
    jumps: usize,
    slides: usize,
    scenes: Vec<String>,
}

impl GameActions for CountingActions {
    fn change_lane(&mut self, direction: i32) {
        self.lane_changes.push(direction);
    }

    fn jump(&mut self) {
        self.jumps += 1;
    }

    fn slide(&mut self) {
        self.slides += 1;
    }

    fn load_scene(&mut self, name: &str) {
        self.scenes.push(name.to_string());
    }
}

struct TestRelay {
    url: String,
    operator: mpsc::Sender<OperatorCommand>,
    handle: JoinHandle<Result<(), RelayError>>,
}

impl TestRelay {
    async fn start(addr: &str) -> Self {
        let server = RelayServer::bind(addr).await.expect("Failed to bind relay");
        let url = format!("ws://{}", server.local_addr().unwrap());
        let (operator, rx) = mpsc::channel(64);
        let handle = tokio::spawn(server.run(rx));
        Self {
            url,
            operator,
            handle,
        }
    }

    async fn broadcast(&self, line: &str) {
        let command = OperatorCommand::parse(line).expect("blank line");
        self.operator.send(command).await.unwrap();
    }

    async fn quit(self) {
        self.operator.send(OperatorCommand::Quit).await.unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(3), self.handle).await;
    }
}

fn channel_config(url: &str, delay: Duration) -> ChannelConfig {
    ChannelConfig {
        url: url.to_string(),
        enable_logging: false,
        ..ChannelConfig::default()
    }
    .with_reconnect_delay(delay)
}

async fn free_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

/// Ticks the channel at roughly 100Hz until `done` holds.
async fn tick_until<A, F>(channel: &mut CommandChannel, actions: &mut A, done: F)
where
    A: GameActions,
    F: Fn(&CommandChannel, &A) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        channel.tick(actions).await;
        if done(channel, actions) {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("Condition not met, channel is {}", channel.status());
}

/// Listener that accepts TCP connections and drops them before the
/// WebSocket handshake, counting each attempt.
async fn failing_endpoint() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    (url, attempts)
}

/// END-TO-END TESTS
mod end_to_end_tests {
    use super::*;

    /// Relay broadcasts "jump" and the client invokes Jump exactly once
    #[tokio::test]
    async fn broadcast_jump_reaches_collaborator() {
        let relay = TestRelay::start("127.0.0.1:0").await;
        let mut channel = CommandChannel::new(channel_config(&relay.url, Duration::from_secs(5)));
        let mut actions = CountingActions::default();

        channel.connect().await.unwrap();
        assert!(channel.is_connected());

        // The greeting is the first frame; it dispatches as unrecognized
        let dispatched = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&dispatched);
        channel.observe(move |notice| {
            if let ChannelNotice::CommandDispatched(_) = notice {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        tick_until(&mut channel, &mut actions, |_, _| {
            dispatched.load(Ordering::SeqCst) >= 1
        })
        .await;

        relay.broadcast("  JUMP ").await;
        tick_until(&mut channel, &mut actions, |_, a| a.jumps > 0).await;

        sleep(Duration::from_millis(50)).await;
        channel.tick(&mut actions).await;

        assert_eq!(actions.jumps, 1);
        assert_eq!(actions.slides, 0);
        assert!(actions.lane_changes.is_empty());
        assert!(channel.is_connected());

        relay.quit().await;
    }

    /// Every command in the vocabulary maps to the expected action
    #[tokio::test]
    async fn full_vocabulary_over_the_wire() {
        let relay = TestRelay::start("127.0.0.1:0").await;
        let mut channel = CommandChannel::new(channel_config(&relay.url, Duration::from_secs(5)));
        let mut actions = CountingActions::default();

        channel.connect().await.unwrap();
        sleep(Duration::from_millis(50)).await;

        for line in ["left", "right", "jump", "up", "slide", "down", "start", "dance"] {
            relay.broadcast(line).await;
        }

        tick_until(&mut channel, &mut actions, |_, a| !a.scenes.is_empty()).await;

        assert_eq!(actions.lane_changes, vec![-1, 1]);
        assert_eq!(actions.jumps, 2);
        assert_eq!(actions.slides, 2);
        assert_eq!(actions.scenes, vec!["Main".to_string()]);
        assert!(channel.is_connected());

        relay.quit().await;
    }

    /// Lane changes through the relay respect the runner's bounds
    #[tokio::test]
    async fn lane_changes_are_bounded_end_to_end() {
        let relay = TestRelay::start("127.0.0.1:0").await;
        let mut channel = CommandChannel::new(channel_config(&relay.url, Duration::from_secs(5)));
        let mut runner = RunnerState::new();

        channel.connect().await.unwrap();
        sleep(Duration::from_millis(50)).await;

        relay.broadcast("left").await;
        relay.broadcast("left").await;
        relay.broadcast("left").await;
        relay.broadcast("start").await;
        relay.broadcast("right").await;

        tick_until(&mut channel, &mut runner, |_, r| r.lane() == 1).await;
        assert_eq!(runner.scene(), "Main");

        relay.quit().await;
    }

    /// One broadcast fans out to several independent clients
    #[tokio::test]
    async fn broadcast_reaches_all_clients() {
        let relay = TestRelay::start("127.0.0.1:0").await;

        let mut channels = Vec::new();
        for _ in 0..3 {
            let mut channel =
                CommandChannel::new(channel_config(&relay.url, Duration::from_secs(5)));
            channel.connect().await.unwrap();
            channels.push((channel, CountingActions::default()));
        }
        sleep(Duration::from_millis(50)).await;

        relay.broadcast("slide").await;

        for (channel, actions) in &mut channels {
            tick_until(channel, actions, |_, a| a.slides == 1).await;
        }

        relay.quit().await;
    }
}

/// RECONNECT POLICY TESTS
mod reconnect_tests {
    use super::*;

    /// A failed connect schedules exactly one retry no sooner than the delay
    #[tokio::test]
    async fn failed_connect_retries_once_after_delay() {
        let (url, attempts) = failing_endpoint().await;
        let delay = Duration::from_millis(400);
        let mut channel = CommandChannel::new(channel_config(&url, delay));
        let mut actions = CountingActions::default();

        let failed_at = Instant::now();
        assert!(channel.connect().await.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(channel.has_pending_reconnect());

        // Well inside the delay nothing fires
        while failed_at.elapsed() < Duration::from_millis(200) {
            channel.tick(&mut actions).await;
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        // The retry handshake runs in the background; wait for its failure
        // to be applied as well
        tick_until(&mut channel, &mut actions, |c, _| {
            attempts.load(Ordering::SeqCst) >= 2 && c.has_pending_reconnect()
        })
        .await;
        assert!(failed_at.elapsed() >= delay);

        // The second failure schedules one more retry, not several
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(channel.has_pending_reconnect());
    }

    /// An explicit disconnect before the delay elapses cancels the retry
    #[tokio::test]
    async fn disconnect_cancels_scheduled_retry() {
        let (url, attempts) = failing_endpoint().await;
        let mut channel = CommandChannel::new(channel_config(&url, Duration::from_millis(150)));
        let mut actions = CountingActions::default();

        assert!(channel.connect().await.is_err());
        channel.disconnect().await.unwrap();

        let started = Instant::now();
        while started.elapsed() < Duration::from_millis(450) {
            channel.tick(&mut actions).await;
            sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!channel.has_pending_reconnect());
    }

    /// The client keeps retrying until a relay appears on the address
    #[tokio::test]
    async fn client_connects_once_relay_starts() {
        let addr = free_addr().await;
        let url = format!("ws://{}", addr);
        let mut channel = CommandChannel::new(channel_config(&url, Duration::from_millis(100)));
        let mut actions = CountingActions::default();

        channel.start().await;
        assert!(!channel.is_connected());

        let relay = TestRelay::start(&addr).await;
        tick_until(&mut channel, &mut actions, |c, _| c.is_connected()).await;

        relay.broadcast("right").await;
        tick_until(&mut channel, &mut actions, |_, a| a.lane_changes == vec![1]).await;

        relay.quit().await;
    }

    /// Relay shutdown drops the connection and the client schedules a retry
    #[tokio::test]
    async fn relay_quit_triggers_client_retry() {
        let relay = TestRelay::start("127.0.0.1:0").await;
        let mut channel = CommandChannel::new(channel_config(&relay.url, Duration::from_secs(5)));
        let mut actions = CountingActions::default();

        channel.connect().await.unwrap();
        relay.quit().await;

        tick_until(&mut channel, &mut actions, |c, _| !c.is_connected()).await;
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(channel.has_pending_reconnect());
    }

    /// Pause drops the connection without retrying; resume reconnects
    #[tokio::test]
    async fn pause_and_resume() {
        let relay = TestRelay::start("127.0.0.1:0").await;
        let mut channel =
            CommandChannel::new(channel_config(&relay.url, Duration::from_millis(50)));
        let mut actions = CountingActions::default();

        channel.connect().await.unwrap();
        channel.pause().await;
        assert_eq!(channel.state(), ConnectionState::Disconnected);

        sleep(Duration::from_millis(150)).await;
        channel.tick(&mut actions).await;
        assert!(!channel.is_connected());
        assert!(!channel.has_pending_reconnect());

        channel.resume().await;
        assert!(channel.is_connected());

        relay.quit().await;
    }

    /// Client-originated text is accepted by the relay without a reply
    #[tokio::test]
    async fn client_text_is_informational() {
        let relay = TestRelay::start("127.0.0.1:0").await;
        let mut channel = CommandChannel::new(channel_config(&relay.url, Duration::from_secs(5)));
        let mut actions = CountingActions::default();

        channel.connect().await.unwrap();
        channel.send_text("score 1200").await.unwrap();

        relay.broadcast("up").await;
        tick_until(&mut channel, &mut actions, |_, a| a.jumps == 1).await;
        assert!(channel.is_connected());

        relay.quit().await;
    }
}
