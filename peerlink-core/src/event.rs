//! Everything the provider pushes at the core: unsolicited notifications and command completions.

use serde::{Deserialize, Serialize};

use crate::command::{ChannelHandle, CommandId, ReasonCode};
use crate::peer::{GroupInfo, LocalDevice, Peer};

/// Unsolicited state-change notification from the transport provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    TransportEnabledChanged(bool),
    PeerListChanged(Vec<Peer>),
    ConnectivityChanged {
        connected: bool,
        group: Option<GroupInfo>,
    },
    LocalDeviceChanged(LocalDevice),
    ChannelLost,
}

/// Successful completion payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ack {
    Done,
    /// Only for channel initialization.
    Channel(ChannelHandle),
}

/// One item on the core's single event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Notification(Notification),
    Completed {
        id: CommandId,
        result: Result<Ack, ReasonCode>,
    },
}

impl From<Notification> for Event {
    fn from(n: Notification) -> Self {
        Event::Notification(n)
    }
}
