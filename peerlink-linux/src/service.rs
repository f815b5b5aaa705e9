//! Link service: one task owns the dispatcher. Provider completions, monitor notifications and
//! operator requests all enter through one channel and are handled strictly one at a time.

use peerlink_core::{
    Action, ConnectionState, DeviceDetailView, Event, EventDispatcher, LinkError, Notice, Peer,
    PeerConfig, PeerListView,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::provider::TransportProvider;

type Reply<T> = oneshot::Sender<T>;

pub enum Input {
    Event(Event),
    Request(Request),
    Shutdown(Reply<()>),
}

pub enum Request {
    StartDiscovery(Reply<Result<(), LinkError>>),
    Connect(PeerConfig, Reply<Result<(), LinkError>>),
    Disconnect(Reply<Result<(), LinkError>>),
    Cancel(Reply<Result<(), LinkError>>),
    Snapshot(Reply<Snapshot>),
}

/// Read-only view of the link for the operator.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: ConnectionState,
    pub peers: Vec<Peer>,
    pub active_peer: Option<Peer>,
    pub transport_enabled: bool,
    pub retry_spent: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("link service is not running")]
    Closed,
}

/// Where provider completions and monitor notifications are posted.
#[derive(Clone)]
pub struct EventSink(mpsc::UnboundedSender<Input>);

impl EventSink {
    /// Returns false once the service has gone away.
    pub fn send(&self, event: Event) -> bool {
        self.0.send(Input::Event(event)).is_ok()
    }
}

/// Operator side of the service.
#[derive(Clone)]
pub struct LinkHandle(mpsc::UnboundedSender<Input>);

impl LinkHandle {
    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Result<T, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.0
            .send(Input::Request(make(tx)))
            .map_err(|_| ServiceError::Closed)?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    pub async fn start_discovery(&self) -> Result<(), ServiceError> {
        Ok(self.call(Request::StartDiscovery).await??)
    }

    pub async fn connect(&self, config: PeerConfig) -> Result<(), ServiceError> {
        Ok(self.call(|tx| Request::Connect(config, tx)).await??)
    }

    pub async fn disconnect(&self) -> Result<(), ServiceError> {
        Ok(self.call(Request::Disconnect).await??)
    }

    pub async fn cancel(&self) -> Result<(), ServiceError> {
        Ok(self.call(Request::Cancel).await??)
    }

    pub async fn snapshot(&self) -> Result<Snapshot, ServiceError> {
        self.call(Request::Snapshot).await
    }

    /// Stop the manager and end the service task.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.0.send(Input::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Create the service input channel. The sink goes to the provider and monitor, the handle to
/// the operator surface, the receiver to `LinkService::new`.
pub fn channel() -> (EventSink, LinkHandle, mpsc::UnboundedReceiver<Input>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink(tx.clone()), LinkHandle(tx), rx)
}

pub struct LinkService<P, L, D> {
    dispatcher: EventDispatcher<L, D>,
    provider: P,
    inbox: mpsc::UnboundedReceiver<Input>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl<P, L, D> LinkService<P, L, D>
where
    P: TransportProvider,
    L: PeerListView,
    D: DeviceDetailView,
{
    pub fn new(
        dispatcher: EventDispatcher<L, D>,
        provider: P,
        inbox: mpsc::UnboundedReceiver<Input>,
        notices: mpsc::UnboundedSender<Notice>,
    ) -> Self {
        Self {
            dispatcher,
            provider,
            inbox,
            notices,
        }
    }

    pub async fn run(mut self) {
        let actions = self.dispatcher.start();
        self.perform(actions);
        while let Some(input) = self.inbox.recv().await {
            match input {
                Input::Event(event) => {
                    let actions = self.dispatcher.handle(event);
                    self.perform(actions);
                }
                Input::Request(request) => self.serve(request),
                Input::Shutdown(done) => {
                    let actions = self.dispatcher.stop();
                    self.perform(actions);
                    let _ = done.send(());
                    break;
                }
            }
        }
        tracing::info!("link service stopped");
    }

    fn serve(&mut self, request: Request) {
        match request {
            Request::StartDiscovery(reply) => {
                let result = self.dispatcher.start_discovery();
                let _ = reply.send(self.complete(result));
            }
            Request::Connect(config, reply) => {
                let result = self.dispatcher.connect(config);
                let _ = reply.send(self.complete(result));
            }
            Request::Disconnect(reply) => {
                let result = self.dispatcher.disconnect();
                let _ = reply.send(self.complete(result));
            }
            Request::Cancel(reply) => {
                let result = self.dispatcher.cancel_active();
                let _ = reply.send(self.complete(result));
            }
            Request::Snapshot(reply) => {
                let manager = self.dispatcher.manager();
                let _ = reply.send(Snapshot {
                    state: manager.state().clone(),
                    peers: manager.peers().to_vec(),
                    active_peer: manager.active_peer().cloned(),
                    transport_enabled: manager.is_transport_enabled(),
                    retry_spent: manager.retry_spent(),
                });
            }
        }
    }

    fn complete(&mut self, result: Result<Vec<Action>, LinkError>) -> Result<(), LinkError> {
        let actions = result?;
        self.perform(actions);
        Ok(())
    }

    fn perform(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Issue { id, command } => self.provider.submit(id, command),
                Action::Notice(notice) => {
                    match &notice {
                        Notice::Info(msg) => tracing::info!(%msg, "notice"),
                        Notice::Failure(err) => tracing::warn!(error = %err, "notice"),
                    }
                    let _ = self.notices.send(notice);
                }
                Action::View(update) => {
                    tracing::debug!(?update, "view update reached host");
                }
            }
        }
    }
}
