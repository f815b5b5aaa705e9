//! Commands the core issues to the transport provider, and the values that come back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::peer::PeerConfig;

/// Opaque handle for the control link to the transport subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelHandle(pub u64);

/// Identity of one issued command. Completions echo it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(pub u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Provider failure reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReasonCode(pub i32);

impl ReasonCode {
    pub const ERROR: ReasonCode = ReasonCode(0);
    pub const P2P_UNSUPPORTED: ReasonCode = ReasonCode(1);
    pub const BUSY: ReasonCode = ReasonCode(2);
    pub const NO_SERVICE_REQUESTS: ReasonCode = ReasonCode(3);

    fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("error"),
            1 => Some("p2p unsupported"),
            2 => Some("busy"),
            3 => Some("no service requests"),
            _ => None,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

/// A command for the transport provider. All are asynchronous; each completes with success or a reason code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    InitializeChannel,
    DiscoverPeers { channel: ChannelHandle },
    Connect { channel: ChannelHandle, config: PeerConfig },
    CancelConnect { channel: ChannelHandle },
    RemoveGroup { channel: ChannelHandle },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::InitializeChannel => CommandKind::InitializeChannel,
            Command::DiscoverPeers { .. } => CommandKind::DiscoverPeers,
            Command::Connect { .. } => CommandKind::Connect,
            Command::CancelConnect { .. } => CommandKind::CancelConnect,
            Command::RemoveGroup { .. } => CommandKind::RemoveGroup,
        }
    }
}

/// Command without payload, for bookkeeping and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    InitializeChannel,
    DiscoverPeers,
    Connect,
    CancelConnect,
    RemoveGroup,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::InitializeChannel => write!(f, "initialize channel"),
            CommandKind::DiscoverPeers => write!(f, "discover peers"),
            CommandKind::Connect => write!(f, "connect"),
            CommandKind::CancelConnect => write!(f, "cancel connect"),
            CommandKind::RemoveGroup => write!(f, "remove group"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_code_display() {
        assert_eq!(ReasonCode::BUSY.to_string(), "busy (2)");
        assert_eq!(ReasonCode(17).to_string(), "17");
    }

    #[test]
    fn command_kind() {
        let ch = ChannelHandle(1);
        assert_eq!(
            Command::RemoveGroup { channel: ch }.kind(),
            CommandKind::RemoveGroup
        );
        assert_eq!(Command::InitializeChannel.kind(), CommandKind::InitializeChannel);
    }
}
