//! Operator console: line commands on stdin, views and notices on stdout.

use peerlink_core::{
    ConnectionState, DeviceDetailView, GroupInfo, LocalDevice, Notice, Peer, PeerConfig, PeerId,
    PeerListView, WpsSetup,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::service::{LinkHandle, ServiceError};

const HELP: &str = "\
commands:
  discover                                   start peer discovery
  connect <addr> [pbc|display|pin <digits>] [go=<0-15>]
  cancel                                     abort the active connection attempt or link
  disconnect                                 remove the current group
  status [--json]                            link state
  peers [--json]                             last discovered peers
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Discover,
    Connect(PeerConfig),
    Cancel,
    Disconnect,
    Status { json: bool },
    Peers { json: bool },
    Help,
    Quit,
}

/// Parse one input line. Blank lines give `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(cmd) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let json = rest.contains(&"--json");
    let command = match cmd {
        "discover" => ConsoleCommand::Discover,
        "connect" => ConsoleCommand::Connect(parse_connect(&rest)?),
        "cancel" => ConsoleCommand::Cancel,
        "disconnect" => ConsoleCommand::Disconnect,
        "status" => ConsoleCommand::Status { json },
        "peers" => ConsoleCommand::Peers { json },
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command {:?} (try help)", other)),
    };
    Ok(Some(command))
}

fn parse_connect(args: &[&str]) -> Result<PeerConfig, String> {
    let (addr, mut rest) = args
        .split_first()
        .ok_or_else(|| "usage: connect <addr> [pbc|display|pin <digits>] [go=<n>]".to_string())?;
    let id: PeerId = addr.parse().map_err(|e| format!("{}", e))?;
    let mut config = PeerConfig::new(id);
    while let Some((word, tail)) = rest.split_first() {
        rest = tail;
        match *word {
            "pbc" => config.wps = WpsSetup::PushButton,
            "display" => config.wps = WpsSetup::DisplayPin,
            "pin" => {
                let (pin, tail) = rest
                    .split_first()
                    .ok_or_else(|| "pin needs digits".to_string())?;
                config.wps = WpsSetup::KeypadPin(pin.to_string());
                rest = tail;
            }
            w => match w.strip_prefix("go=") {
                Some(n) => {
                    let intent = n
                        .parse::<u8>()
                        .map_err(|_| format!("bad group owner intent {:?}", n))?;
                    config.group_owner_intent = Some(intent);
                }
                None => return Err(format!("unexpected argument {:?}", w)),
            },
        }
    }
    Ok(config)
}

/// Peer list rendered to stdout.
#[derive(Debug, Default)]
pub struct PeerListConsole;

impl PeerListView for PeerListConsole {
    fn discovery_started(&mut self) {
        println!("finding peers...");
    }

    fn show_peers(&mut self, peers: &[Peer]) {
        if peers.is_empty() {
            println!("no devices found");
            return;
        }
        println!("peers:");
        for p in peers {
            println!("  {}  {:<24} {}", p.id, p.name, p.status);
        }
    }

    fn clear_peers(&mut self) {
        println!("peer list cleared");
    }

    fn show_local_device(&mut self, device: &LocalDevice) {
        println!("this device: {} {} ({})", device.name, device.address, device.status);
    }
}

/// Device detail rendered to stdout.
#[derive(Debug, Default)]
pub struct DetailConsole;

impl DeviceDetailView for DetailConsole {
    fn show_connection(&mut self, state: &ConnectionState, group: Option<&GroupInfo>) {
        match (state.active_peer(), group) {
            (Some(peer), Some(g)) => {
                let role = if g.is_group_owner { "group owner" } else { "client" };
                println!("{}: {} [{}] as {}", state, peer.name, peer.primary_device_type, role);
                if let Some(addr) = g.owner_address {
                    println!("  group owner address {}", addr);
                }
            }
            _ => println!("{}", state),
        }
    }

    fn reset(&mut self) {
        println!("device detail cleared");
    }
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::Info(msg) => println!("info: {}", msg),
        Notice::Failure(err) => println!("error: {}", err),
    }
}

async fn execute(handle: &LinkHandle, command: ConsoleCommand) -> Result<(), ServiceError> {
    match command {
        ConsoleCommand::Discover => handle.start_discovery().await?,
        ConsoleCommand::Connect(config) => handle.connect(config).await?,
        ConsoleCommand::Cancel => handle.cancel().await?,
        ConsoleCommand::Disconnect => handle.disconnect().await?,
        ConsoleCommand::Status { json } => {
            let snap = handle.snapshot().await?;
            if json {
                println!("{}", to_json(&snap));
            } else {
                println!(
                    "state: {}  transport: {}  retry spent: {}",
                    snap.state,
                    if snap.transport_enabled { "on" } else { "off" },
                    snap.retry_spent
                );
            }
        }
        ConsoleCommand::Peers { json } => {
            let snap = handle.snapshot().await?;
            if json {
                println!("{}", to_json(&snap.peers));
            } else {
                PeerListConsole.show_peers(&snap.peers);
            }
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Read commands until `quit` or end of input, printing notices as they arrive.
pub async fn run_console(
    handle: LinkHandle,
    mut notices: mpsc::UnboundedReceiver<Notice>,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);
    loop {
        tokio::select! {
            Some(notice) = notices.recv() => print_notice(&notice),
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(()) };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Quit)) => return Ok(()),
                    Ok(Some(command)) => {
                        if let Err(e) = execute(&handle, command).await {
                            println!("error: {}", e);
                        }
                    }
                    Err(msg) => println!("{}", msg),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_commands() {
        assert_eq!(parse_line("  "), Ok(None));
        assert_eq!(parse_line("discover"), Ok(Some(ConsoleCommand::Discover)));
        assert_eq!(
            parse_line("status --json"),
            Ok(Some(ConsoleCommand::Status { json: true }))
        );
        assert_eq!(
            parse_line("peers"),
            Ok(Some(ConsoleCommand::Peers { json: false }))
        );
        assert!(parse_line("teleport").is_err());
    }

    #[test]
    fn connect_variants() {
        let id: PeerId = "02:00:00:00:01:00".parse().unwrap();
        assert_eq!(
            parse_line("connect 02:00:00:00:01:00"),
            Ok(Some(ConsoleCommand::Connect(PeerConfig::new(id))))
        );
        let Ok(Some(ConsoleCommand::Connect(cfg))) =
            parse_line("connect 02:00:00:00:01:00 pin 12345670 go=15")
        else {
            panic!("expected connect");
        };
        assert_eq!(cfg.wps, WpsSetup::KeypadPin("12345670".into()));
        assert_eq!(cfg.group_owner_intent, Some(15));

        let Ok(Some(ConsoleCommand::Connect(cfg))) =
            parse_line("connect 02:00:00:00:01:00 display")
        else {
            panic!("expected connect");
        };
        assert_eq!(cfg.wps, WpsSetup::DisplayPin);
    }

    #[test]
    fn connect_errors() {
        assert!(parse_line("connect").is_err());
        assert!(parse_line("connect not-an-address").is_err());
        assert!(parse_line("connect 02:00:00:00:01:00 pin").is_err());
        assert!(parse_line("connect 02:00:00:00:01:00 go=x").is_err());
        assert!(parse_line("connect 02:00:00:00:01:00 sideways").is_err());
    }
}
