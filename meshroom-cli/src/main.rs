use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use meshroom_client::{
    MeshClient, MeshConfig, MeshEvent, MeshHandle, PeerState, TransportConfig, WebRtcEngine,
    WsTransport,
};
use meshroom_core::{RoomId, TextKind};
use meshroom_relay::RelayConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshroom")]
#[command(about = "Multi-party WebRTC mesh rooms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: SocketAddr,

        /// Grace period (ms) before a dropped socket counts as a leave.
        #[arg(long, default_value_t = 10_000)]
        grace_ms: u64,
    },
    /// Join a room and chat from the terminal.
    Join {
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,

        /// Room to join; a fresh one is generated when omitted.
        #[arg(short, long)]
        room: Option<String>,

        #[arg(short, long, default_value = "guest")]
        name: String,

        /// Gather host and loopback candidates only.
        #[arg(long)]
        local_only: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Commands::Relay { addr, grace_ms } => {
            println!("{}", "📡 Starting meshroom relay...".green().bold());
            let config = RelayConfig {
                presence_grace: Duration::from_millis(grace_ms),
            };
            meshroom_relay::serve(addr, config).await
        }
        Commands::Join {
            url,
            room,
            name,
            local_only,
        } => join(url, room, name, local_only).await,
    }
}

async fn join(url: String, room: Option<String>, name: String, local_only: bool) -> Result<()> {
    let room = room.map(RoomId::from).unwrap_or_else(RoomId::generate);
    let transport_config = if local_only {
        TransportConfig::local_only()
    } else {
        TransportConfig::default()
    };

    let engine = WebRtcEngine::new(transport_config).context("Failed to set up WebRTC")?;
    let client = MeshClient::new(Arc::new(WsTransport::new(url.as_str())), Arc::new(engine))
        .with_config(MeshConfig::default());

    let (handle, mut events) = client
        .join_room(room.clone(), name.as_str())
        .await
        .with_context(|| format!("Failed to join room {room} via {url}"))?;

    println!(
        "{} {} as {} ({})",
        "🚪 Joined room".green().bold(),
        room.as_str().bold(),
        name.cyan(),
        handle.participant_id().to_string().dimmed()
    );
    println!(
        "{}",
        "   Type to chat. /peers, /roster and /quit are commands.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if !handle_input(&handle, line.trim()).await? {
                    break;
                }
            }

            event = events.recv() => {
                match event {
                    Ok(MeshEvent::Ended) => break,
                    Ok(event) => print_event(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        println!("{}", format!("   ({n} events skipped)").dimmed());
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    println!("{}", "👋 Leaving room...".yellow());
    handle.leave_room().await.context("Failed to leave cleanly")?;
    Ok(())
}

/// Returns false once the user asked to quit.
async fn handle_input(handle: &MeshHandle, line: &str) -> Result<bool> {
    match line {
        "" => {}
        "/quit" => return Ok(false),
        "/peers" => {
            for peer in handle.peers().await? {
                println!("   {} {:?} {}", peer.id, peer.role, colored_state(peer.state));
            }
        }
        "/roster" => {
            for (n, entry) in handle.roster().await?.iter().enumerate() {
                println!("   {}. {} ({})", n + 1, entry.display_name, entry.id);
            }
        }
        body => handle.send_chat(body).await?,
    }
    Ok(true)
}

fn print_event(event: &MeshEvent) {
    match event {
        MeshEvent::ParticipantJoined { id, display_name } => {
            println!("{} {} ({})", "➕".green(), display_name.bold(), id);
        }
        MeshEvent::ParticipantLeft { id } => {
            println!("{} {}", "➖".red(), id);
        }
        MeshEvent::PeerStateChanged { id, state } => {
            println!("   {} {}", id.to_string().dimmed(), colored_state(*state));
        }
        MeshEvent::TrackAdded { id, kind, .. } => {
            println!("   {} {} track from {}", "🎥".blue(), kind, id);
        }
        MeshEvent::Text(text) => {
            let who = text.display_name.cyan().bold();
            match text.kind {
                TextKind::Chat => println!("{}: {}", who, text.body),
                TextKind::GestureDerived => {
                    println!("{} {}: {}", "✋".magenta(), who, text.body.italic())
                }
            }
        }
        MeshEvent::SignalingUnavailable { reason } => {
            println!("{} {}", "⚠ signaling unavailable:".yellow().bold(), reason);
        }
        MeshEvent::Ended => {}
    }
}

fn colored_state(state: PeerState) -> ColoredString {
    let label = state.to_string();
    match state {
        PeerState::New => label.normal(),
        PeerState::Negotiating => label.yellow(),
        PeerState::Connected => label.green().bold(),
        PeerState::Failed => label.red().bold(),
        PeerState::Closed => label.dimmed(),
    }
}
