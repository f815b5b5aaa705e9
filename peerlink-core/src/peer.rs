//! Peer data model: hardware address, handshake status, connect configuration, local device and group info.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Peer identifier: 6-byte hardware address. Text form is `aa:bb:cc:dd:ee:ff`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId([u8; 6]);

impl PeerId {
    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        PeerId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for PeerId {
    type Err = PeerIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.trim().split(':');
        for slot in out.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| PeerIdParseError(s.to_string()))?;
            if part.len() != 2 {
                return Err(PeerIdParseError(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| PeerIdParseError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(PeerIdParseError(s.to_string()));
        }
        Ok(PeerId(out))
    }
}

impl TryFrom<String> for PeerId {
    type Error = PeerIdParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.to_string()
    }
}

/// Text that is not a `xx:xx:xx:xx:xx:xx` hardware address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid peer address: {0:?}")]
pub struct PeerIdParseError(pub String);

/// Handshake status reported by the transport for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerStatus {
    Connected,
    Invited,
    Failed,
    Available,
    Unavailable,
}

impl PeerStatus {
    /// Map a provider status code. Unknown codes are treated as unavailable.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => PeerStatus::Connected,
            1 => PeerStatus::Invited,
            2 => PeerStatus::Failed,
            3 => PeerStatus::Available,
            _ => PeerStatus::Unavailable,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            PeerStatus::Connected => 0,
            PeerStatus::Invited => 1,
            PeerStatus::Failed => 2,
            PeerStatus::Available => 3,
            PeerStatus::Unavailable => 4,
        }
    }

    /// True while a handshake can still be aborted with a cancel-connect.
    pub fn is_mid_handshake(self) -> bool {
        matches!(self, PeerStatus::Available | PeerStatus::Invited)
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerStatus::Connected => write!(f, "connected"),
            PeerStatus::Invited => write!(f, "invited"),
            PeerStatus::Failed => write!(f, "failed"),
            PeerStatus::Available => write!(f, "available"),
            PeerStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Immutable snapshot of one discovered peer, as reported in a peer-list notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub name: String,
    pub status: PeerStatus,
    #[serde(default)]
    pub primary_device_type: String,
}

impl Peer {
    pub fn new(id: PeerId, name: impl Into<String>, status: PeerStatus) -> Self {
        Self {
            id,
            name: name.into(),
            status,
            primary_device_type: String::new(),
        }
    }
}

/// How the WPS credentials are exchanged during link negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WpsSetup {
    #[default]
    PushButton,
    /// Local side displays a PIN the remote enters.
    DisplayPin,
    /// Local side enters the PIN displayed by the remote.
    KeypadPin(String),
}

/// Highest group-owner intent the transport accepts.
pub const MAX_GROUP_OWNER_INTENT: u8 = 15;

/// Argument to a connect command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    pub device_address: PeerId,
    #[serde(default)]
    pub wps: WpsSetup,
    /// 0 (prefer client) ..= 15 (prefer group owner). None lets the transport decide.
    #[serde(default)]
    pub group_owner_intent: Option<u8>,
}

impl PeerConfig {
    pub fn new(device_address: PeerId) -> Self {
        Self {
            device_address,
            wps: WpsSetup::default(),
            group_owner_intent: None,
        }
    }

    /// Check values the transport would reject. Returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(intent) = self.group_owner_intent {
            if intent > MAX_GROUP_OWNER_INTENT {
                return Err(format!(
                    "group owner intent {} out of range 0..={}",
                    intent, MAX_GROUP_OWNER_INTENT
                ));
            }
        }
        if let WpsSetup::KeypadPin(pin) = &self.wps {
            if pin.is_empty() || !pin.chars().all(|c| c.is_ascii_digit()) {
                return Err(format!("keypad pin must be digits, got {:?}", pin));
            }
        }
        Ok(())
    }
}

/// This device as the transport describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDevice {
    pub name: String,
    pub address: PeerId,
    pub status: PeerStatus,
}

/// Group information carried by a connectivity change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupInfo {
    pub is_group_owner: bool,
    pub owner_address: Option<IpAddr>,
    pub interface: Option<String>,
}
