//! View capabilities handed to the dispatcher at construction. Views only render; they never
//! talk to the transport provider.

use crate::peer::{GroupInfo, LocalDevice, Peer};
use crate::state::ConnectionState;

pub trait PeerListView {
    /// Discovery was requested; a peer list will follow.
    fn discovery_started(&mut self) {}
    fn show_peers(&mut self, peers: &[Peer]);
    fn clear_peers(&mut self);
    fn show_local_device(&mut self, device: &LocalDevice);
}

pub trait DeviceDetailView {
    fn show_connection(&mut self, state: &ConnectionState, group: Option<&GroupInfo>);
    fn reset(&mut self);
}

/// View that renders nothing. For hosts without a UI surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoView;

impl PeerListView for NoView {
    fn show_peers(&mut self, _peers: &[Peer]) {}
    fn clear_peers(&mut self) {}
    fn show_local_device(&mut self, _device: &LocalDevice) {}
}

impl DeviceDetailView for NoView {
    fn show_connection(&mut self, _state: &ConnectionState, _group: Option<&GroupInfo>) {}
    fn reset(&mut self) {}
}
