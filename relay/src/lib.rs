//! # Command Relay Server
//!
//! Long-running process that accepts any number of WebSocket connections
//! from game clients and rebroadcasts each command typed at its console to
//! every open connection.
//!
//! ## Core Responsibilities
//!
//! ### Connection Tracking
//! Each completed handshake adds a connection to the live set and receives
//! the greeting frame `Connected to WebSocket server`. A close or read error
//! removes it again.
//!
//! ### Broadcast
//! Operator lines are trimmed and lowercased, then sent verbatim to every
//! connection that is writable at that instant. Nothing is queued for
//! connections that join later, and a failed send to one connection never
//! interrupts delivery to the others.
//!
//! ### Client Messages
//! Text sent by clients is logged and otherwise ignored. There is no
//! request/response contract.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! Accepts, per-connection reads, disconnects and operator commands are all
//! delivered to one `tokio::select!` loop, the only code that mutates the
//! connection set. Handshakes and socket writes run on their own tasks so a
//! slow peer cannot stall the loop.
//!
//! ## Module Organization
//!
//! - `connections`: the live connection set and broadcast fan-out
//! - `network`: listener, handshake, per-connection tasks and the event loop
//! - `operator`: console line reader and help text
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use relay::network::RelayServer;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RelayServer::bind("127.0.0.1:8080").await?;
//!
//!     let (tx, rx) = mpsc::channel(64);
//!     relay::operator::spawn_stdin(tx);
//!
//!     // Returns once the operator types `quit`
//!     server.run(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod connections;
pub mod error;
pub mod network;
pub mod operator;

pub use error::RelayError;
