//! Peer transport provider: runs commands against the supplicant and posts each completion
//! back into the link service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use peerlink_core::{Ack, ChannelHandle, Command, CommandId, Event, ReasonCode};

use crate::service::EventSink;
use crate::wpa::{command_args, parse_reply, WpaCli};

/// Fire-and-forget command submission. The outcome must come back as `Event::Completed`
/// carrying the same id.
pub trait TransportProvider: Send + 'static {
    fn submit(&self, id: CommandId, command: Command);
}

pub struct WpaCliProvider {
    cli: Arc<WpaCli>,
    sink: EventSink,
    next_channel: Arc<AtomicU64>,
}

impl WpaCliProvider {
    pub fn new(cli: Arc<WpaCli>, sink: EventSink) -> Self {
        Self {
            cli,
            sink,
            next_channel: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl TransportProvider for WpaCliProvider {
    fn submit(&self, id: CommandId, command: Command) {
        let cli = self.cli.clone();
        let sink = self.sink.clone();
        let next_channel = self.next_channel.clone();
        tokio::spawn(async move {
            let result = execute(&cli, &command, &next_channel).await;
            if !sink.send(Event::Completed { id, result }) {
                tracing::debug!(command = %id, "completion after service stopped");
            }
        });
    }
}

async fn execute(
    cli: &WpaCli,
    command: &Command,
    next_channel: &AtomicU64,
) -> Result<Ack, ReasonCode> {
    let args = command_args(command);
    let reply = cli.request(&args).await.map_err(|e| {
        tracing::warn!(error = %e, kind = %command.kind(), "provider request failed");
        ReasonCode::ERROR
    })?;
    parse_reply(&reply)?;
    Ok(match command {
        Command::InitializeChannel => {
            Ack::Channel(ChannelHandle(next_channel.fetch_add(1, Ordering::Relaxed)))
        }
        _ => Ack::Done,
    })
}
