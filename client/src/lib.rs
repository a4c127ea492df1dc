//! # Command Channel Client
//!
//! In-game side of the remote-command protocol. A [`network::CommandChannel`]
//! owns at most one outbound WebSocket connection to the relay, decodes each
//! inbound frame into a [`shared::Command`] and hands it to a
//! [`game::GameActions`] collaborator.
//!
//! ## Scheduling
//!
//! The channel is pumped from the host's frame loop. Connect and close are
//! the only operations that await the transport; frames, close notifications
//! and due retries are queued and processed in order on the next
//! [`network::CommandChannel::tick`]. Game state therefore never needs a lock.
//!
//! ## Reconnection
//!
//! Every failed attempt or dropped connection schedules exactly one retry
//! after a fixed delay (5 seconds by default). An explicit disconnect or a
//! pause clears the reconnect flag and cancels the pending retry.
//!
//! ## Module Organization
//!
//! - `lifecycle`: the pure connection state machine
//! - `network`: transport, retry task and per-tick pumping
//! - `dispatcher`: command token to game action mapping
//! - `game`: the collaborator trait and a headless runner model
//! - `input`: local console test commands
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::RunnerState;
//! use client::network::CommandChannel;
//! use shared::ChannelConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut runner = RunnerState::new();
//!     let mut channel = CommandChannel::new(ChannelConfig::default());
//!     channel.start().await;
//!
//!     let mut frame = tokio::time::interval(Duration::from_millis(16));
//!     loop {
//!         frame.tick().await;
//!         channel.tick(&mut runner).await;
//!         runner.update(1.0 / 60.0);
//!     }
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod game;
pub mod input;
pub mod lifecycle;
pub mod network;

pub use error::ChannelError;
