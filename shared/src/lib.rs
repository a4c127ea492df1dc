//! Vocabulary shared by the relay and the in-game command channel.
//!
//! Both processes agree on three things: the greeting frame the relay sends to
//! every new connection, the normalization applied to a command token (trim,
//! then lowercase), and the fixed set of tokens a game client acts upon.

use std::fmt;

pub mod config;

pub use config::{ChannelConfig, ConfigError};

pub const GREETING: &str = "Connected to WebSocket server";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_URL: &str = "ws://localhost:8080";
pub const DEFAULT_RECONNECT_DELAY_SECS: f32 = 5.0;
pub const QUIT_COMMAND: &str = "quit";
pub const START_SCENE: &str = "Main";

pub const LANE_MIN: i32 = -1;
pub const LANE_MAX: i32 = 1;
pub const RUN_SPEED: f32 = 10.0;
pub const JUMP_LENGTH: f32 = 7.5;
pub const JUMP_HEIGHT: f32 = 1.0;
pub const SLIDE_LENGTH: f32 = 10.0;
pub const FALL_SPEED: f32 = 5.0;

/// Trims surrounding whitespace and lowercases a raw token.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// A single normalized gameplay command.
///
/// Parsing is total: anything outside the vocabulary becomes
/// [`Command::Unrecognized`] carrying the normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Left,
    Right,
    Jump,
    Up,
    Slide,
    Down,
    Start,
    Unrecognized(String),
}

impl Command {
    pub const VOCABULARY: [&'static str; 7] =
        ["left", "right", "jump", "up", "slide", "down", "start"];

    pub fn parse(raw: &str) -> Self {
        let token = normalize(raw);
        match token.as_str() {
            "left" => Command::Left,
            "right" => Command::Right,
            "jump" => Command::Jump,
            "up" => Command::Up,
            "slide" => Command::Slide,
            "down" => Command::Down,
            "start" => Command::Start,
            _ => Command::Unrecognized(token),
        }
    }

    /// Decodes a raw frame payload as UTF-8 and parses it.
    ///
    /// Invalid byte sequences are replaced rather than rejected so that every
    /// frame still yields a command.
    pub fn from_bytes(raw: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(raw))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Command::Left => "left",
            Command::Right => "right",
            Command::Jump => "jump",
            Command::Up => "up",
            Command::Slide => "slide",
            Command::Down => "down",
            Command::Start => "start",
            Command::Unrecognized(token) => token,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Command::Unrecognized(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line typed at the relay console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Quit,
    Broadcast(String),
}

impl OperatorCommand {
    /// Returns `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let command = normalize(line);
        if command.is_empty() {
            None
        } else if command == QUIT_COMMAND {
            Some(OperatorCommand::Quit)
        } else {
            Some(OperatorCommand::Broadcast(command))
        }
    }
}
