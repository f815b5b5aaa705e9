//! Connection state machine states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::peer::Peer;

/// Current link state. Exactly one is active; owned by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Idle,
    Discovering,
    /// Connect accepted by the provider (or in flight); link not yet established.
    Connecting(Peer),
    Connected(Peer),
    Disconnecting,
    /// Terminal: the channel was lost after the single automatic retry.
    ChannelLost,
    /// Channel lost once; re-initialization in progress.
    ChannelRetrying,
}

impl ConnectionState {
    /// Peer of an in-progress or established link.
    pub fn active_peer(&self) -> Option<&Peer> {
        match self {
            ConnectionState::Connecting(p) | ConnectionState::Connected(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::ChannelLost)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    /// States a connect may be issued from; also the states a failed connect falls back to.
    pub fn accepts_connect(&self) -> bool {
        matches!(self, ConnectionState::Idle | ConnectionState::Discovering)
    }

    pub fn accepts_disconnect(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected(_) | ConnectionState::Connecting(_)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::Discovering => write!(f, "discovering"),
            ConnectionState::Connecting(p) => write!(f, "connecting to {}", p.id),
            ConnectionState::Connected(p) => write!(f, "connected to {}", p.id),
            ConnectionState::Disconnecting => write!(f, "disconnecting"),
            ConnectionState::ChannelLost => write!(f, "channel lost"),
            ConnectionState::ChannelRetrying => write!(f, "channel retrying"),
        }
    }
}
