//! Connection lifecycle state machine for the command channel.
//!
//! `Lifecycle` owns the current [`ConnectionState`] together with the two
//! flags that gate reconnection: `should_reconnect` (cleared by an explicit
//! disconnect or a pause) and `active` (whether the owning component is still
//! live). It performs no IO; the network layer reports transport outcomes to
//! it and acts on the decisions it returns.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    Errored,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
            ConnectionState::Closing => "Closing",
            ConnectionState::Errored => "Errored",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of asking to start a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAttempt {
    /// State moved to `Connecting`; the caller must perform the handshake.
    Start,
    AlreadyOpen,
    /// A handshake or close is already under way.
    Busy,
    /// Reconnection is disabled by an explicit disconnect or a pause.
    Disabled,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ConnectionState,
    should_reconnect: bool,
    active: bool,
    reconnect_delay: Duration,
}

impl Lifecycle {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            should_reconnect: true,
            active: true,
            reconnect_delay,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn should_reconnect(&self) -> bool {
        self.should_reconnect
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// `Disconnected --connect()--> Connecting`, guarded by `should_reconnect`.
    pub fn begin_connect(&mut self) -> ConnectAttempt {
        if !self.should_reconnect {
            return ConnectAttempt::Disabled;
        }

        match self.state {
            ConnectionState::Open => ConnectAttempt::AlreadyOpen,
            ConnectionState::Connecting | ConnectionState::Closing => ConnectAttempt::Busy,
            ConnectionState::Disconnected | ConnectionState::Errored => {
                self.state = ConnectionState::Connecting;
                ConnectAttempt::Start
            }
        }
    }

    /// `Connecting --transport success--> Open`
    pub fn opened(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Open;
        }
    }

    /// Failed handshake, remote close, or transport error. Ignored while an
    /// explicit close is in progress or once disconnected.
    pub fn fail(&mut self) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                self.state = ConnectionState::Errored;
                true
            }
            _ => false,
        }
    }

    /// `Errored --reconnect policy--> Disconnected`.
    ///
    /// Returns the delay after which a single retry should fire, or `None`
    /// when reconnection is disabled or the owner is inactive.
    pub fn recover(&mut self) -> Option<Duration> {
        if self.state != ConnectionState::Errored {
            return None;
        }

        self.state = ConnectionState::Disconnected;
        if self.should_reconnect && self.active {
            Some(self.reconnect_delay)
        } else {
            None
        }
    }

    /// Explicit teardown: clears `should_reconnect` first, then moves an open
    /// or connecting channel to `Closing`. Returns whether a close is needed.
    pub fn begin_close(&mut self) -> bool {
        self.should_reconnect = false;

        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => {
                self.state = ConnectionState::Closing;
                true
            }
            ConnectionState::Errored => {
                self.state = ConnectionState::Disconnected;
                false
            }
            _ => false,
        }
    }

    /// `Closing --close complete--> Disconnected`
    pub fn closed(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    /// Host went to background.
    pub fn pause(&mut self) {
        self.should_reconnect = false;
    }

    /// Host came back. Re-enables reconnection only when autoconnect is
    /// configured; returns whether the caller should connect now.
    pub fn resume(&mut self, autoconnect: bool) -> bool {
        if autoconnect {
            self.should_reconnect = true;
        }
        autoconnect
    }

    /// Checked when a scheduled retry fires.
    pub fn reconnect_due(&self) -> bool {
        self.should_reconnect && self.active && self.state == ConnectionState::Disconnected
    }
}
