//! Supplicant monitor: polls wpa_cli and turns observed changes into provider notifications.

use std::sync::Arc;
use std::time::Duration;

use peerlink_core::{GroupInfo, LocalDevice, Notification, Peer};

use crate::service::EventSink;
use crate::wpa::{parse_peer, parse_peer_list, parse_status, ProviderError, WpaCli};

/// One poll's view of the supplicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub enabled: bool,
    pub connected: bool,
    pub group: Option<GroupInfo>,
    pub local: Option<LocalDevice>,
    pub peers: Vec<Peer>,
}

/// What was last reported, so only changes become notifications.
#[derive(Debug, Default)]
pub struct Observed {
    alive: bool,
    enabled: Option<bool>,
    connectivity: Option<(bool, Option<GroupInfo>)>,
    local: Option<LocalDevice>,
    peers: Option<Vec<Peer>>,
}

/// Notifications for the difference between `observed` and `probe`. `None` means the control
/// interface did not answer; the first miss after a live period is a channel loss. A loss makes
/// the core drop its link data, so everything observed is forgotten and the next live probe
/// reports the full picture again.
pub fn diff(observed: &mut Observed, probe: Option<Probe>) -> Vec<Notification> {
    let mut out = Vec::new();
    let Some(probe) = probe else {
        if observed.alive {
            *observed = Observed::default();
            out.push(Notification::ChannelLost);
        }
        return out;
    };
    observed.alive = true;

    if observed.enabled != Some(probe.enabled) {
        observed.enabled = Some(probe.enabled);
        out.push(Notification::TransportEnabledChanged(probe.enabled));
    }
    if let Some(local) = probe.local {
        if observed.local.as_ref() != Some(&local) {
            observed.local = Some(local.clone());
            out.push(Notification::LocalDeviceChanged(local));
        }
    }
    if observed.peers.as_ref() != Some(&probe.peers) {
        observed.peers = Some(probe.peers.clone());
        out.push(Notification::PeerListChanged(probe.peers));
    }
    let connectivity = (probe.connected, probe.group);
    if observed.connectivity.as_ref() != Some(&connectivity) {
        observed.connectivity = Some(connectivity.clone());
        out.push(Notification::ConnectivityChanged {
            connected: connectivity.0,
            group: connectivity.1,
        });
    }
    out
}

/// Query the supplicant once. `Ok(None)` when the control interface is unreachable.
pub async fn probe(cli: &WpaCli) -> Result<Option<Probe>, ProviderError> {
    match cli.request(&["ping"]).await {
        Ok(reply) if reply.trim() == "PONG" => {}
        Ok(_) | Err(ProviderError::Exit { .. }) => return Ok(None),
        Err(e) => return Err(e),
    }
    let status = parse_status(&cli.request(&["status"]).await?, cli.interface());
    let ids = parse_peer_list(&cli.request(&["p2p_peers"]).await?);
    let mut peers = Vec::with_capacity(ids.len());
    for id in ids {
        let text = cli.request(&["p2p_peer".to_string(), id.to_string()]).await?;
        peers.push(parse_peer(id, &text, status.associated));
    }
    Ok(Some(Probe {
        enabled: status.enabled,
        connected: status.connected,
        group: status.group,
        local: status.local,
        peers,
    }))
}

pub async fn run_monitor(cli: Arc<WpaCli>, sink: EventSink, poll_interval: Duration) {
    let mut observed = Observed::default();
    let mut timer = tokio::time::interval(poll_interval);
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        timer.tick().await;
        let probe = match probe(&cli).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "supplicant poll failed");
                continue;
            }
        };
        for notification in diff(&mut observed, probe) {
            tracing::debug!(?notification, "supplicant change");
            if !sink.send(notification.into()) {
                return;
            }
        }
    }
}
