//! Peer link core: connection state machine and event dispatch for one peer-to-peer wireless link.
//! Host-driven: no I/O; host passes events and receives actions.

pub mod command;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod manager;
pub mod peer;
pub mod registry;
pub mod state;
pub mod view;

pub use command::{ChannelHandle, Command, CommandId, CommandKind, ReasonCode};
pub use dispatch::EventDispatcher;
pub use error::LinkError;
pub use event::{Ack, Event, Notification};
pub use manager::{Action, ConnectionManager, Notice, Pending};
pub use peer::{GroupInfo, LocalDevice, Peer, PeerConfig, PeerId, PeerStatus, WpsSetup};
pub use registry::PeerRegistry;
pub use state::ConnectionState;
pub use view::{DeviceDetailView, NoView, PeerListView};
