//! Error taxonomy for link operations.

use crate::command::{CommandKind, ReasonCode};
use crate::peer::PeerId;
use crate::state::ConnectionState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// Provider refused a command.
    #[error("{command} rejected: {reason}")]
    CommandRejected {
        command: CommandKind,
        reason: ReasonCode,
    },
    /// Control channel lost twice; needs manual remediation (toggle the transport off and on).
    #[error("channel is probably lost permanently; disable and re-enable the transport")]
    ChannelPermanentlyLost,
    /// Command not valid in the current state. Provider was not contacted.
    #[error("{op} not allowed while {state}")]
    InvalidTransition {
        op: &'static str,
        state: ConnectionState,
    },
    /// Another mutating command is still waiting for its completion.
    #[error("{pending} still in flight")]
    CommandPending { pending: CommandKind },
    #[error("transport is disabled")]
    TransportDisabled,
    #[error("peer {0} not found")]
    PeerNotFound(PeerId),
    #[error("link manager is not running")]
    NotRunning,
    #[error("invalid peer configuration: {0}")]
    InvalidConfig(String),
}
