//! Connection manager: owns the link state machine, issues provider commands, applies the
//! single channel-retry policy. Host-driven like the rest of the core: calls return actions.

use std::sync::Arc;

use crate::command::{ChannelHandle, Command, CommandId, CommandKind, ReasonCode};
use crate::error::LinkError;
use crate::event::Ack;
use crate::peer::{GroupInfo, Peer, PeerConfig, PeerStatus};
use crate::registry::PeerRegistry;
use crate::state::ConnectionState;

/// Something the host (or the dispatcher, for view updates) must do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send to the transport provider; its completion must come back tagged with `id`.
    Issue { id: CommandId, command: Command },
    /// Operator-facing message.
    Notice(Notice),
    /// View refresh. Consumed by the dispatcher, never returned to the host.
    View(ViewUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Failure(LinkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdate {
    DiscoveryStarted,
    /// Clear the peer list and the device detail.
    Reset,
    ResetDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub id: CommandId,
    pub kind: CommandKind,
}

pub struct ConnectionManager {
    state: ConnectionState,
    registry: PeerRegistry,
    transport_enabled: bool,
    /// Channel re-initialization already attempted. Never refilled.
    retry_spent: bool,
    channel: Option<ChannelHandle>,
    pending: Option<Pending>,
    /// Where a failed or cancelled connect falls back to.
    resume: ConnectionState,
    group: Option<GroupInfo>,
    next_id: u64,
    running: bool,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            registry: PeerRegistry::new(),
            transport_enabled: false,
            retry_spent: false,
            channel: None,
            pending: None,
            resume: ConnectionState::Idle,
            group: None,
            next_id: 1,
            running: false,
        }
    }

    /// Start: issue the initial channel initialization. No-op when already running.
    pub fn start(&mut self) -> Vec<Action> {
        if self.running {
            return vec![];
        }
        self.running = true;
        tracing::info!("link manager starting");
        vec![self.issue(Command::InitializeChannel)]
    }

    /// Stop: drop every piece of link state. Completions for commands issued before are ignored.
    pub fn stop(&mut self) -> Vec<Action> {
        if !self.running {
            return vec![];
        }
        self.running = false;
        self.reset_link();
        self.state = ConnectionState::Idle;
        self.retry_spent = false;
        tracing::info!("link manager stopped");
        vec![Action::View(ViewUpdate::Reset)]
    }

    pub fn start_discovery(&mut self) -> Result<Vec<Action>, LinkError> {
        let allowed = matches!(
            self.state,
            ConnectionState::Idle | ConnectionState::Discovering
        );
        let channel = self.guard("start discovery", allowed)?;
        if !self.transport_enabled {
            return Err(LinkError::TransportDisabled);
        }
        self.state = ConnectionState::Discovering;
        Ok(vec![
            Action::View(ViewUpdate::DiscoveryStarted),
            self.issue(Command::DiscoverPeers { channel }),
        ])
    }

    pub fn connect(&mut self, config: PeerConfig) -> Result<Vec<Action>, LinkError> {
        let channel = self.guard("connect", self.state.accepts_connect())?;
        config.validate().map_err(LinkError::InvalidConfig)?;
        let peer = self.registry.lookup(&config.device_address)?.clone();
        tracing::info!(peer = %peer.id, name = %peer.name, "connecting");
        self.resume = self.state.clone();
        self.state = ConnectionState::Connecting(peer);
        Ok(vec![self.issue(Command::Connect { channel, config })])
    }

    pub fn disconnect(&mut self) -> Result<Vec<Action>, LinkError> {
        let channel = self.guard("disconnect", self.state.accepts_disconnect())?;
        self.state = ConnectionState::Disconnecting;
        Ok(vec![
            Action::View(ViewUpdate::ResetDetail),
            self.issue(Command::RemoveGroup { channel }),
        ])
    }

    /// Abort whatever the active link is doing. An established link is torn down; a link still
    /// in handshake gets a cancel-connect, which may supersede a connect still in flight.
    /// While connecting, the registry entry for the peer decides: the provider may list it as
    /// connected before the connectivity change arrives.
    pub fn cancel_active(&mut self) -> Result<Vec<Action>, LinkError> {
        self.check_running()?;
        let status = match &self.state {
            ConnectionState::Connected(_) => PeerStatus::Connected,
            ConnectionState::Connecting(active) => self
                .registry
                .lookup(&active.id)
                .map(|p| p.status)
                .unwrap_or(active.status),
            _ => {
                return Err(LinkError::InvalidTransition {
                    op: "cancel",
                    state: self.state.clone(),
                })
            }
        };
        if status == PeerStatus::Connected {
            return self.disconnect();
        }
        if !status.is_mid_handshake() {
            return Err(LinkError::InvalidTransition {
                op: "cancel",
                state: self.state.clone(),
            });
        }
        match self.pending {
            Some(p) if p.kind == CommandKind::Connect => {
                tracing::debug!(superseded = %p.id, "cancel supersedes in-flight connect");
                self.pending = None;
            }
            Some(p) => return Err(LinkError::CommandPending { pending: p.kind }),
            None => {}
        }
        let channel = self.channel.ok_or(LinkError::CommandPending {
            pending: CommandKind::InitializeChannel,
        })?;
        Ok(vec![self.issue(Command::CancelConnect { channel })])
    }

    pub fn on_transport_enabled_changed(&mut self, enabled: bool) {
        if self.transport_enabled != enabled {
            tracing::info!(enabled, "transport enabled changed");
        }
        self.transport_enabled = enabled;
    }

    pub fn on_connectivity_changed(
        &mut self,
        connected: bool,
        group: Option<GroupInfo>,
    ) -> Vec<Action> {
        if !self.running {
            return vec![];
        }
        self.group = group;
        match (&self.state, connected) {
            (ConnectionState::Connecting(peer), true) => {
                let mut peer = peer.clone();
                peer.status = PeerStatus::Connected;
                tracing::info!(peer = %peer.id, "link established");
                self.state = ConnectionState::Connected(peer);
                self.resume = ConnectionState::Idle;
                vec![]
            }
            (ConnectionState::Connected(peer), false) => {
                tracing::info!(peer = %peer.id, "link dropped");
                self.state = ConnectionState::Idle;
                self.group = None;
                vec![Action::View(ViewUpdate::Reset)]
            }
            _ => {
                tracing::debug!(connected, state = %self.state, "connectivity change without transition");
                vec![]
            }
        }
    }

    /// Control channel gone. The first loss spends the retry budget and re-initializes; any
    /// later loss is terminal.
    pub fn on_channel_lost(&mut self) -> Vec<Action> {
        if !self.running || self.state.is_terminal() {
            return vec![];
        }
        self.reset_link();
        if !self.retry_spent {
            self.retry_spent = true;
            self.state = ConnectionState::ChannelRetrying;
            tracing::warn!("channel lost, trying again");
            vec![
                Action::Notice(Notice::Info("Channel lost. Trying again".into())),
                Action::View(ViewUpdate::Reset),
                self.issue(Command::InitializeChannel),
            ]
        } else {
            self.state = ConnectionState::ChannelLost;
            tracing::error!("channel lost permanently");
            vec![
                Action::View(ViewUpdate::Reset),
                Action::Notice(Notice::Failure(LinkError::ChannelPermanentlyLost)),
            ]
        }
    }

    /// Apply a provider completion. Completions that do not match the command in flight are
    /// stale (superseded by cancel, channel reset or stop) and are dropped.
    pub fn on_command_completed(
        &mut self,
        id: CommandId,
        result: Result<Ack, ReasonCode>,
    ) -> Vec<Action> {
        let pending = match self.pending {
            Some(p) if p.id == id && self.running => p,
            _ => {
                tracing::debug!(command = %id, "dropping stale completion");
                return vec![];
            }
        };
        self.pending = None;
        match (pending.kind, result) {
            (CommandKind::InitializeChannel, Ok(Ack::Channel(handle))) => {
                self.channel = Some(handle);
                if self.state == ConnectionState::ChannelRetrying {
                    self.state = ConnectionState::Idle;
                }
                tracing::info!(channel = handle.0, "channel initialized");
                vec![]
            }
            (CommandKind::InitializeChannel, other) => {
                let reason = match other {
                    Err(reason) => reason,
                    Ok(_) => ReasonCode::ERROR,
                };
                tracing::warn!(%reason, "channel initialization failed");
                self.on_channel_lost()
            }
            (CommandKind::DiscoverPeers, Ok(_)) => {
                vec![Action::Notice(Notice::Info("Discovery Initiated".into()))]
            }
            (CommandKind::DiscoverPeers, Err(reason)) => {
                if self.state == ConnectionState::Discovering {
                    self.state = ConnectionState::Idle;
                }
                vec![self.rejected(CommandKind::DiscoverPeers, reason)]
            }
            (CommandKind::Connect, Ok(_)) => {
                // Accepted only; the link itself is reported by a connectivity change.
                tracing::debug!("connect accepted");
                vec![]
            }
            (CommandKind::Connect, Err(reason)) => {
                if matches!(self.state, ConnectionState::Connecting(_)) {
                    self.state = std::mem::take(&mut self.resume);
                }
                vec![self.rejected(CommandKind::Connect, reason)]
            }
            (CommandKind::CancelConnect, Ok(_)) => {
                if matches!(self.state, ConnectionState::Connecting(_)) {
                    self.state = std::mem::take(&mut self.resume);
                }
                vec![Action::Notice(Notice::Info("Aborting connection".into()))]
            }
            (CommandKind::CancelConnect, Err(reason)) => {
                vec![self.rejected(CommandKind::CancelConnect, reason)]
            }
            (CommandKind::RemoveGroup, result) => {
                if let Err(reason) = result {
                    tracing::warn!(%reason, "disconnect failed");
                }
                if self.state == ConnectionState::Disconnecting {
                    self.state = ConnectionState::Idle;
                    self.group = None;
                }
                vec![]
            }
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn active_peer(&self) -> Option<&Peer> {
        self.state.active_peer()
    }

    pub fn peers(&self) -> Arc<[Peer]> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut PeerRegistry {
        &mut self.registry
    }

    pub fn group(&self) -> Option<&GroupInfo> {
        self.group.as_ref()
    }

    pub fn is_transport_enabled(&self) -> bool {
        self.transport_enabled
    }

    pub fn retry_spent(&self) -> bool {
        self.retry_spent
    }

    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn check_running(&self) -> Result<(), LinkError> {
        if !self.running {
            return Err(LinkError::NotRunning);
        }
        if self.state.is_terminal() {
            return Err(LinkError::ChannelPermanentlyLost);
        }
        Ok(())
    }

    fn guard(&self, op: &'static str, allowed: bool) -> Result<ChannelHandle, LinkError> {
        self.check_running()?;
        if !allowed {
            return Err(LinkError::InvalidTransition {
                op,
                state: self.state.clone(),
            });
        }
        if let Some(p) = self.pending {
            return Err(LinkError::CommandPending { pending: p.kind });
        }
        self.channel.ok_or(LinkError::CommandPending {
            pending: CommandKind::InitializeChannel,
        })
    }

    fn issue(&mut self, command: Command) -> Action {
        let id = CommandId(self.next_id);
        self.next_id += 1;
        self.pending = Some(Pending {
            id,
            kind: command.kind(),
        });
        tracing::debug!(command = %id, kind = %command.kind(), "issuing");
        Action::Issue { id, command }
    }

    fn rejected(&self, command: CommandKind, reason: ReasonCode) -> Action {
        tracing::info!(%command, %reason, "command rejected");
        Action::Notice(Notice::Failure(LinkError::CommandRejected { command, reason }))
    }

    fn reset_link(&mut self) {
        self.registry.clear();
        self.channel = None;
        self.pending = None;
        self.group = None;
        self.resume = ConnectionState::Idle;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
