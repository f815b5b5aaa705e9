//! Event dispatcher: single entry point for provider events and operator commands.
//! Classifies each event, routes it to the manager, registry or views, and hands the host
//! back only what it must perform (provider commands and operator notices).

use crate::error::LinkError;
use crate::event::{Event, Notification};
use crate::manager::{Action, ConnectionManager, ViewUpdate};
use crate::peer::PeerConfig;
use crate::view::{DeviceDetailView, PeerListView};

pub struct EventDispatcher<L, D> {
    manager: ConnectionManager,
    peer_list: L,
    detail: D,
}

impl<L: PeerListView, D: DeviceDetailView> EventDispatcher<L, D> {
    pub fn new(manager: ConnectionManager, peer_list: L, detail: D) -> Self {
        Self {
            manager,
            peer_list,
            detail,
        }
    }

    pub fn start(&mut self) -> Vec<Action> {
        let actions = self.manager.start();
        self.apply(actions)
    }

    pub fn stop(&mut self) -> Vec<Action> {
        let actions = self.manager.stop();
        self.apply(actions)
    }

    /// Handle one event. Callers must feed events strictly in arrival order.
    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        if !self.manager.is_running() {
            tracing::debug!(?event, "not running, event ignored");
            return vec![];
        }
        let actions = match event {
            Event::Completed { id, result } => self.manager.on_command_completed(id, result),
            Event::Notification(n) => self.route(n),
        };
        self.apply(actions)
    }

    fn route(&mut self, notification: Notification) -> Vec<Action> {
        match notification {
            Notification::TransportEnabledChanged(enabled) => {
                self.manager.on_transport_enabled_changed(enabled);
                if enabled {
                    vec![]
                } else {
                    self.manager.registry_mut().clear();
                    vec![Action::View(ViewUpdate::Reset)]
                }
            }
            Notification::PeerListChanged(peers) => {
                if peers.is_empty() {
                    tracing::debug!("no devices found");
                }
                self.manager.registry_mut().update(peers);
                let snapshot = self.manager.peers();
                self.peer_list.show_peers(&snapshot);
                vec![]
            }
            Notification::ConnectivityChanged { connected, group } => {
                let actions = self.manager.on_connectivity_changed(connected, group);
                self.detail
                    .show_connection(self.manager.state(), self.manager.group());
                actions
            }
            Notification::LocalDeviceChanged(device) => {
                self.peer_list.show_local_device(&device);
                vec![]
            }
            Notification::ChannelLost => self.manager.on_channel_lost(),
        }
    }

    pub fn start_discovery(&mut self) -> Result<Vec<Action>, LinkError> {
        let actions = self.manager.start_discovery()?;
        Ok(self.apply(actions))
    }

    pub fn connect(&mut self, config: PeerConfig) -> Result<Vec<Action>, LinkError> {
        let actions = self.manager.connect(config)?;
        Ok(self.apply(actions))
    }

    pub fn disconnect(&mut self) -> Result<Vec<Action>, LinkError> {
        let actions = self.manager.disconnect()?;
        Ok(self.apply(actions))
    }

    pub fn cancel_active(&mut self) -> Result<Vec<Action>, LinkError> {
        let actions = self.manager.cancel_active()?;
        Ok(self.apply(actions))
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn peer_list(&self) -> &L {
        &self.peer_list
    }

    pub fn detail(&self) -> &D {
        &self.detail
    }

    /// Render view updates; return the rest in order.
    fn apply(&mut self, actions: Vec<Action>) -> Vec<Action> {
        let mut out = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                Action::View(ViewUpdate::DiscoveryStarted) => self.peer_list.discovery_started(),
                Action::View(ViewUpdate::Reset) => {
                    self.peer_list.clear_peers();
                    self.detail.reset();
                }
                Action::View(ViewUpdate::ResetDetail) => self.detail.reset(),
                other => out.push(other),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ChannelHandle, Command, CommandId, CommandKind, ReasonCode};
    use crate::event::Ack;
    use crate::manager::Notice;
    use crate::peer::{GroupInfo, LocalDevice, Peer, PeerId, PeerStatus};
    use crate::state::ConnectionState;

    #[derive(Default)]
    struct ListRecorder {
        shown: Vec<Vec<PeerId>>,
        cleared: usize,
        discovery_started: usize,
        local: Option<LocalDevice>,
    }

    impl PeerListView for ListRecorder {
        fn discovery_started(&mut self) {
            self.discovery_started += 1;
        }
        fn show_peers(&mut self, peers: &[Peer]) {
            self.shown.push(peers.iter().map(|p| p.id).collect());
        }
        fn clear_peers(&mut self) {
            self.cleared += 1;
        }
        fn show_local_device(&mut self, device: &LocalDevice) {
            self.local = Some(device.clone());
        }
    }

    #[derive(Default)]
    struct DetailRecorder {
        states: Vec<ConnectionState>,
        resets: usize,
    }

    impl DeviceDetailView for DetailRecorder {
        fn show_connection(&mut self, state: &ConnectionState, _group: Option<&GroupInfo>) {
            self.states.push(state.clone());
        }
        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    type Harness = EventDispatcher<ListRecorder, DetailRecorder>;

    fn p(n: u8) -> Peer {
        Peer::new(
            PeerId::from_bytes([0x0a, 0, 0, 0, 0, n]),
            format!("p{}", n),
            PeerStatus::Available,
        )
    }

    fn issues(actions: &[Action]) -> Vec<(CommandId, Command)> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Issue { id, command } => Some((*id, command.clone())),
                _ => None,
            })
            .collect()
    }

    fn ok(d: &mut Harness, actions: &[Action]) -> Vec<Action> {
        let (id, cmd) = issues(actions).remove(0);
        let ack = match cmd {
            Command::InitializeChannel => Ack::Channel(ChannelHandle(1)),
            _ => Ack::Done,
        };
        d.handle(Event::Completed { id, result: Ok(ack) })
    }

    fn started() -> Harness {
        let mut d = EventDispatcher::new(
            ConnectionManager::new(),
            ListRecorder::default(),
            DetailRecorder::default(),
        );
        let a = d.start();
        ok(&mut d, &a);
        d.handle(Notification::TransportEnabledChanged(true).into());
        d
    }

    #[test]
    fn view_updates_never_reach_host() {
        let mut d = started();
        let a = d.start_discovery().unwrap();
        assert!(a.iter().all(|a| !matches!(a, Action::View(_))));
        assert_eq!(d.peer_list().discovery_started, 1);
    }

    #[test]
    fn scenario_discover_connect_establish() {
        let mut d = started();
        let a = d.start_discovery().unwrap();
        let out = ok(&mut d, &a);
        assert!(matches!(&out[..], [Action::Notice(Notice::Info(_))]));

        d.handle(Notification::PeerListChanged(vec![p(1)]).into());
        assert_eq!(d.peer_list().shown, vec![vec![p(1).id]]);

        let a = d.connect(PeerConfig::new(p(1).id)).unwrap();
        ok(&mut d, &a);
        d.handle(
            Notification::ConnectivityChanged {
                connected: true,
                group: Some(GroupInfo::default()),
            }
            .into(),
        );
        match d.manager().state() {
            ConnectionState::Connected(peer) => assert_eq!(peer.id, p(1).id),
            other => panic!("expected connected, got {}", other),
        }
        assert!(matches!(
            d.detail().states.last(),
            Some(ConnectionState::Connected(_))
        ));
    }

    #[test]
    fn scenario_connect_failure_surfaces_reason() {
        let mut d = started();
        d.handle(Notification::PeerListChanged(vec![p(1)]).into());
        let a = d.connect(PeerConfig::new(p(1).id)).unwrap();
        let (id, _) = issues(&a).remove(0);
        let out = d.handle(Event::Completed {
            id,
            result: Err(ReasonCode(2)),
        });
        assert_eq!(d.manager().state(), &ConnectionState::Idle);
        assert_eq!(
            out,
            vec![Action::Notice(Notice::Failure(LinkError::CommandRejected {
                command: CommandKind::Connect,
                reason: ReasonCode(2),
            }))]
        );
    }

    #[test]
    fn scenario_channel_lost_twice() {
        let mut d = started();
        d.handle(Notification::PeerListChanged(vec![p(1)]).into());
        let a = d.connect(PeerConfig::new(p(1).id)).unwrap();
        ok(&mut d, &a);
        d.handle(
            Notification::ConnectivityChanged {
                connected: true,
                group: None,
            }
            .into(),
        );

        let first = d.handle(Notification::ChannelLost.into());
        let second = d.handle(Notification::ChannelLost.into());
        let reinit: Vec<_> = issues(&first)
            .into_iter()
            .chain(issues(&second))
            .filter(|(_, c)| *c == Command::InitializeChannel)
            .collect();
        assert_eq!(reinit.len(), 1);
        assert_eq!(d.manager().state(), &ConnectionState::ChannelLost);
        assert!(second.contains(&Action::Notice(Notice::Failure(
            LinkError::ChannelPermanentlyLost
        ))));
        assert!(d.manager().peers().is_empty());
        assert_eq!(d.peer_list().cleared, 2);
    }

    #[test]
    fn peer_list_replaced_wholesale() {
        let mut d = started();
        d.handle(Notification::PeerListChanged(vec![p(1), p(2)]).into());
        d.handle(Notification::PeerListChanged(vec![p(3)]).into());
        let reg = d.manager().registry();
        assert!(reg.lookup(&p(3).id).is_ok());
        assert!(reg.lookup(&p(1).id).is_err());
        assert!(reg.lookup(&p(2).id).is_err());
        assert_eq!(d.peer_list().shown.len(), 2);
    }

    #[test]
    fn local_device_goes_to_views_only() {
        let mut d = started();
        let me = LocalDevice {
            name: "laptop".into(),
            address: PeerId::from_bytes([1; 6]),
            status: PeerStatus::Available,
        };
        let out = d.handle(Notification::LocalDeviceChanged(me.clone()).into());
        assert!(out.is_empty());
        assert_eq!(d.peer_list().local, Some(me));
        assert_eq!(d.manager().state(), &ConnectionState::Idle);
        assert!(d.manager().peers().is_empty());
    }

    #[test]
    fn transport_disable_resets_views() {
        let mut d = started();
        d.handle(Notification::TransportEnabledChanged(false).into());
        assert!(!d.manager().is_transport_enabled());
        assert_eq!(d.peer_list().cleared, 1);
        assert_eq!(d.detail().resets, 1);
        assert_eq!(d.manager().state(), &ConnectionState::Idle);
        assert_eq!(d.start_discovery(), Err(LinkError::TransportDisabled));
    }

    #[test]
    fn transport_disable_drops_known_peers() {
        let mut d = started();
        d.handle(Notification::PeerListChanged(vec![p(1), p(2)]).into());
        d.handle(Notification::TransportEnabledChanged(false).into());
        assert!(d.manager().peers().is_empty());
        assert_eq!(
            d.connect(PeerConfig::new(p(1).id)),
            Err(LinkError::PeerNotFound(p(1).id))
        );
    }

    fn connecting(d: &mut Harness) {
        d.handle(Notification::PeerListChanged(vec![p(1)]).into());
        let a = d.connect(PeerConfig::new(p(1).id)).unwrap();
        ok(d, &a);
    }

    fn peer_list_connected(d: &mut Harness) {
        let mut linked = p(1);
        linked.status = PeerStatus::Connected;
        d.handle(Notification::PeerListChanged(vec![linked]).into());
    }

    fn established(d: &mut Harness) {
        d.handle(
            Notification::ConnectivityChanged {
                connected: true,
                group: None,
            }
            .into(),
        );
    }

    #[test]
    fn cancel_after_peer_list_reports_link_before_connectivity() {
        let mut d = started();
        connecting(&mut d);
        peer_list_connected(&mut d);
        assert!(matches!(d.manager().state(), ConnectionState::Connecting(_)));
        let a = d.cancel_active().unwrap();
        assert!(matches!(
            issues(&a).as_slice(),
            [(_, Command::RemoveGroup { .. })]
        ));
        assert_eq!(d.manager().state(), &ConnectionState::Disconnecting);
    }

    #[test]
    fn cancel_after_connectivity_before_peer_list_refresh() {
        let mut d = started();
        connecting(&mut d);
        established(&mut d);
        // Registry still lists the peer as available.
        let a = d.cancel_active().unwrap();
        assert!(matches!(
            issues(&a).as_slice(),
            [(_, Command::RemoveGroup { .. })]
        ));
    }

    #[test]
    fn cancel_after_both_orders_converge() {
        let mut first = started();
        connecting(&mut first);
        peer_list_connected(&mut first);
        established(&mut first);

        let mut second = started();
        connecting(&mut second);
        established(&mut second);
        peer_list_connected(&mut second);

        for d in [&mut first, &mut second] {
            assert!(d.manager().state().is_connected());
            let a = d.cancel_active().unwrap();
            assert!(matches!(
                issues(&a).as_slice(),
                [(_, Command::RemoveGroup { .. })]
            ));
        }
    }

    #[test]
    fn cancel_mid_handshake_is_cancel_connect() {
        let mut d = started();
        connecting(&mut d);
        let a = d.cancel_active().unwrap();
        assert!(matches!(
            issues(&a).as_slice(),
            [(_, Command::CancelConnect { .. })]
        ));
        let out = ok(&mut d, &a);
        assert!(matches!(&out[..], [Action::Notice(Notice::Info(_))]));
        assert_eq!(d.manager().state(), &ConnectionState::Idle);
    }

    #[test]
    fn connectivity_refreshes_detail_in_order() {
        let mut d = started();
        d.handle(Notification::PeerListChanged(vec![p(1)]).into());
        let a = d.connect(PeerConfig::new(p(1).id)).unwrap();
        ok(&mut d, &a);
        // Arrival order decides: established first, then dropped.
        for connected in [true, false] {
            d.handle(
                Notification::ConnectivityChanged {
                    connected,
                    group: None,
                }
                .into(),
            );
        }
        let states = &d.detail().states;
        assert_eq!(states.len(), 2);
        assert!(matches!(states[0], ConnectionState::Connected(_)));
        assert_eq!(states[1], ConnectionState::Idle);
    }

    #[test]
    fn disconnect_resets_detail_immediately() {
        let mut d = started();
        d.handle(Notification::PeerListChanged(vec![p(1)]).into());
        let a = d.connect(PeerConfig::new(p(1).id)).unwrap();
        ok(&mut d, &a);
        let a = d.disconnect().unwrap();
        assert_eq!(d.detail().resets, 1);
        assert!(matches!(
            issues(&a).as_slice(),
            [(_, Command::RemoveGroup { .. })]
        ));
    }

    #[test]
    fn stopped_dispatcher_ignores_events() {
        let mut d = started();
        d.stop();
        let out = d.handle(Notification::PeerListChanged(vec![p(1)]).into());
        assert!(out.is_empty());
        assert!(d.manager().peers().is_empty());
    }
}
