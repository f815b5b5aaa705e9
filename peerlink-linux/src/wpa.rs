//! wpa_supplicant control via `wpa_cli`: request runner and reply parsers.
//!
//! Peer status is not reported directly by the supplicant; it is derived from the per-peer
//! fields: the peer we are associated with is connected, a pending GO negotiation or
//! invitation means invited, a non-zero last P2P status means failed, anything else available.

use std::collections::HashMap;
use std::net::IpAddr;

use peerlink_core::{
    Command, GroupInfo, LocalDevice, Peer, PeerId, PeerStatus, ReasonCode, WpsSetup,
};
use tokio::process::Command as Process;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("failed to run wpa_cli: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("wpa_cli exited with {status}: {stderr}")]
    Exit { status: i32, stderr: String },
}

/// Runs `wpa_cli -i <interface> <args..>` and returns stdout.
#[derive(Debug, Clone)]
pub struct WpaCli {
    program: String,
    interface: String,
}

impl WpaCli {
    pub fn new(program: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            interface: interface.into(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub async fn request<S: AsRef<str>>(&self, args: &[S]) -> Result<String, ProviderError> {
        let out = Process::new(&self.program)
            .arg("-i")
            .arg(&self.interface)
            .args(args.iter().map(|a| a.as_ref()))
            .kill_on_drop(true)
            .output()
            .await?;
        if !out.status.success() {
            return Err(ProviderError::Exit {
                status: out.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

/// wpa_cli arguments for a provider command.
pub fn command_args(command: &Command) -> Vec<String> {
    match command {
        Command::InitializeChannel => vec!["ping".into()],
        Command::DiscoverPeers { .. } => vec!["p2p_find".into()],
        Command::Connect { config, .. } => {
            let mut args = vec!["p2p_connect".to_string(), config.device_address.to_string()];
            match &config.wps {
                WpsSetup::PushButton => args.push("pbc".into()),
                WpsSetup::DisplayPin => {
                    args.push("pin".into());
                    args.push("display".into());
                }
                WpsSetup::KeypadPin(pin) => {
                    args.push(pin.clone());
                    args.push("keypad".into());
                }
            }
            if let Some(intent) = config.group_owner_intent {
                args.push(format!("go_intent={}", intent));
            }
            args
        }
        Command::CancelConnect { .. } => vec!["p2p_cancel".into()],
        Command::RemoveGroup { .. } => vec!["p2p_group_remove".into(), "*".into()],
    }
}

/// Map a control reply to the provider's two outcomes.
pub fn parse_reply(reply: &str) -> Result<(), ReasonCode> {
    let reply = reply.trim();
    match reply {
        "OK" | "PONG" => Ok(()),
        "FAIL-BUSY" => Err(ReasonCode::BUSY),
        "UNKNOWN COMMAND" => Err(ReasonCode::P2P_UNSUPPORTED),
        // Generated PIN for display-pin connects.
        r if !r.is_empty() && r.chars().all(|c| c.is_ascii_digit()) => Ok(()),
        _ => Err(ReasonCode::ERROR),
    }
}

/// `key=value` lines. Lines without `=` are skipped.
pub fn parse_kv(text: &str) -> HashMap<&str, &str> {
    text.lines()
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

/// Output of `p2p_peers`: one address per line.
pub fn parse_peer_list(text: &str) -> Vec<PeerId> {
    text.lines().filter_map(|l| l.trim().parse().ok()).collect()
}

fn nonzero(fields: &HashMap<&str, &str>, key: &str) -> bool {
    fields
        .get(key)
        .and_then(|v| v.parse::<i64>().ok())
        .map(|n| n != 0)
        .unwrap_or(false)
}

/// Output of `p2p_peer <addr>`.
pub fn parse_peer(id: PeerId, text: &str, associated: Option<PeerId>) -> Peer {
    let fields = parse_kv(text);
    let interface_addr = fields
        .get("interface_addr")
        .and_then(|v| v.parse::<PeerId>().ok());
    let status = if associated.is_some() && (associated == Some(id) || associated == interface_addr)
    {
        PeerStatus::Connected
    } else if nonzero(&fields, "go_neg_req_sent") || nonzero(&fields, "invitation_reqs") {
        PeerStatus::Invited
    } else if nonzero(&fields, "status") {
        PeerStatus::Failed
    } else {
        PeerStatus::Available
    };
    let mut peer = Peer::new(
        id,
        fields.get("device_name").copied().unwrap_or_default(),
        status,
    );
    peer.primary_device_type = fields
        .get("pri_dev_type")
        .copied()
        .unwrap_or_default()
        .to_string();
    peer
}

/// What `status` says about the transport and the current group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplicantStatus {
    pub enabled: bool,
    pub connected: bool,
    pub group: Option<GroupInfo>,
    /// Address of the peer we are associated with, if any.
    pub associated: Option<PeerId>,
    pub local: Option<LocalDevice>,
}

pub fn parse_status(text: &str, interface: &str) -> SupplicantStatus {
    let fields = parse_kv(text);
    let wpa_state = fields.get("wpa_state").copied().unwrap_or("");
    let enabled = !matches!(wpa_state, "INTERFACE_DISABLED" | "DISABLED" | "");
    let mode = fields.get("mode").copied().unwrap_or("");
    let connected = wpa_state == "COMPLETED" && mode.starts_with("P2P");
    let group = connected.then(|| {
        let is_group_owner = mode == "P2P GO";
        GroupInfo {
            is_group_owner,
            owner_address: if is_group_owner {
                fields.get("ip_address").and_then(|v| v.parse::<IpAddr>().ok())
            } else {
                None
            },
            interface: Some(interface.to_string()),
        }
    });
    let associated = if connected {
        fields.get("bssid").and_then(|v| v.parse().ok())
    } else {
        None
    };
    let local = fields
        .get("p2p_device_address")
        .and_then(|v| v.parse::<PeerId>().ok())
        .map(|address| LocalDevice {
            name: fields
                .get("device_name")
                .copied()
                .unwrap_or_default()
                .to_string(),
            address,
            status: if connected {
                PeerStatus::Connected
            } else {
                PeerStatus::Available
            },
        });
    SupplicantStatus {
        enabled,
        connected,
        group,
        associated,
        local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_core::{ChannelHandle, PeerConfig};

    fn id(s: &str) -> PeerId {
        s.parse().unwrap()
    }

    #[test]
    fn connect_args() {
        let ch = ChannelHandle(1);
        let mut config = PeerConfig::new(id("02:00:00:00:01:00"));
        let cmd = Command::Connect {
            channel: ch,
            config: config.clone(),
        };
        assert_eq!(command_args(&cmd), vec!["p2p_connect", "02:00:00:00:01:00", "pbc"]);

        config.wps = WpsSetup::KeypadPin("12345670".into());
        config.group_owner_intent = Some(7);
        let cmd = Command::Connect { channel: ch, config };
        assert_eq!(
            command_args(&cmd),
            vec!["p2p_connect", "02:00:00:00:01:00", "12345670", "keypad", "go_intent=7"]
        );
        assert_eq!(
            command_args(&Command::RemoveGroup { channel: ch }),
            vec!["p2p_group_remove", "*"]
        );
    }

    #[test]
    fn replies() {
        assert_eq!(parse_reply("OK\n"), Ok(()));
        assert_eq!(parse_reply("PONG"), Ok(()));
        assert_eq!(parse_reply("12345670"), Ok(()));
        assert_eq!(parse_reply("FAIL-BUSY"), Err(ReasonCode::BUSY));
        assert_eq!(parse_reply("FAIL"), Err(ReasonCode::ERROR));
        assert_eq!(parse_reply("UNKNOWN COMMAND"), Err(ReasonCode::P2P_UNSUPPORTED));
        assert_eq!(parse_reply(""), Err(ReasonCode::ERROR));
    }

    #[test]
    fn peer_list() {
        let text = "02:00:00:00:01:00\nnot-a-peer\n02:00:00:00:02:00\n";
        assert_eq!(
            parse_peer_list(text),
            vec![id("02:00:00:00:01:00"), id("02:00:00:00:02:00")]
        );
    }

    #[test]
    fn peer_fields() {
        let text = "02:00:00:00:01:00\npri_dev_type=10-0050F204-5\ndevice_name=Printer\n\
                    interface_addr=02:00:00:00:01:01\ngo_neg_req_sent=0\nstatus=0\ninvitation_reqs=0\n";
        let p = parse_peer(id("02:00:00:00:01:00"), text, None);
        assert_eq!(p.name, "Printer");
        assert_eq!(p.primary_device_type, "10-0050F204-5");
        assert_eq!(p.status, PeerStatus::Available);

        let p = parse_peer(
            id("02:00:00:00:01:00"),
            text,
            Some(id("02:00:00:00:01:01")),
        );
        assert_eq!(p.status, PeerStatus::Connected);

        let invited = text.replace("go_neg_req_sent=0", "go_neg_req_sent=1");
        assert_eq!(
            parse_peer(id("02:00:00:00:01:00"), &invited, None).status,
            PeerStatus::Invited
        );
        let failed = text.replace("status=0", "status=1");
        assert_eq!(
            parse_peer(id("02:00:00:00:01:00"), &failed, None).status,
            PeerStatus::Failed
        );
    }

    #[test]
    fn status_connected_client() {
        let text = "bssid=02:00:00:00:01:01\nmode=P2P client\nwpa_state=COMPLETED\n\
                    p2p_device_address=02:00:00:00:aa:00\naddress=02:00:00:00:aa:01\n";
        let s = parse_status(text, "p2p-wlan0-0");
        assert!(s.enabled);
        assert!(s.connected);
        assert_eq!(s.associated, Some(id("02:00:00:00:01:01")));
        let group = s.group.unwrap();
        assert!(!group.is_group_owner);
        assert_eq!(group.interface.as_deref(), Some("p2p-wlan0-0"));
        assert_eq!(s.local.unwrap().address, id("02:00:00:00:aa:00"));
    }

    #[test]
    fn status_group_owner_and_idle() {
        let text = "mode=P2P GO\nwpa_state=COMPLETED\nip_address=192.168.49.1\n";
        let s = parse_status(text, "p2p-wlan0-0");
        let group = s.group.unwrap();
        assert!(group.is_group_owner);
        assert_eq!(group.owner_address, Some("192.168.49.1".parse().unwrap()));

        let s = parse_status("wpa_state=DISCONNECTED\n", "p2p-dev-wlan0");
        assert!(s.enabled);
        assert!(!s.connected);
        assert!(s.group.is_none());

        let s = parse_status("wpa_state=INTERFACE_DISABLED\n", "p2p-dev-wlan0");
        assert!(!s.enabled);
    }
}
