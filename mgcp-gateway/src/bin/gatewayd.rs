//! The gateway daemon: binds a UDP socket, decodes datagrams with the demo wire codec (`wire.rs`
//! stands in for the real MGCP parser, an external collaborator per §1), and drives them through
//! the transactional mediator.
//!
//! Mirrors the teacher's `bin/server.rs` shape — parse config, bind, loop — but via `tokio`'s
//! async/await `main` rather than the teacher's futures-0.1 `Runtime::block_on`, and `anyhow`
//! rather than `exit(1)` for startup failures.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::UdpSocket;
use tracing_subscriber::EnvFilter;

use mgcp_gateway::commands::GatewayCommandProvider;
use mgcp_gateway::config::{GatewayConfig, Transport};
use mgcp_gateway::facade::{EndpointManager, StaticEndpointManager};
use mgcp_gateway::media_stub::NullMediaFactory;
use mgcp_gateway::mediator::Mediator;
use mgcp_gateway::wire;
use mgcp_proto::bus::{Bus, Observer};
use mgcp_proto::message::{MessageDirection, MgcpMessage};

/// Command-line flags. Each overrides the corresponding `GatewayConfig` field when present,
/// taking precedence over both the config file and environment variables (§9).
#[derive(Parser, Debug)]
#[command(name = "gatewayd", about = "MGCP endpoint controller")]
struct Args {
    /// Path to a TOML config file (without extension, `config`-crate style).
    #[arg(long)]
    config: Option<String>,
    /// Overrides the configured UDP bind address.
    #[arg(long)]
    listen: Option<String>,
    /// Overrides the configured endpoint domain.
    #[arg(long)]
    domain: Option<String>,
    /// Overrides `T_transaction` in milliseconds.
    #[arg(long)]
    transaction_timeout_ms: Option<u64>,
}

/// Forwards every outbound message (mediator responses and facade `NTFY` requests alike) to the
/// most recently seen datagram peer. A real deployment would route `NTFY` to the endpoint's
/// `NotifiedEntity`, tracked per connection; this demo codec only ever talks to one call agent at
/// a time, so "last peer seen" is close enough to exercise the gateway end to end.
struct PeerForwarder {
    socket: Arc<UdpSocket>,
    peer: Mutex<Option<SocketAddr>>,
}

impl Observer<MgcpMessage> for PeerForwarder {
    fn notify(&self, message: &MgcpMessage, _direction: MessageDirection) {
        let Some(peer) = *self.peer.lock().unwrap() else {
            tracing::warn!("no known peer yet; dropping outbound message");
            return;
        };
        let line = wire::encode_response(message);
        let socket = self.socket.clone();
        tokio::spawn(async move {
            if let Err(error) = socket.send_to(line.as_bytes(), peer).await {
                tracing::warn!(%error, "failed to send outbound datagram");
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut config = GatewayConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(domain) = args.domain {
        config.domain = domain;
    }
    if let Some(ms) = args.transaction_timeout_ms {
        config.transaction_timeout_ms = ms;
    }
    let listen = args.listen.unwrap_or_else(|| match &config.transport {
        Transport::Udp { bind } => bind.clone(),
        Transport::Unix { path } => path.clone(),
    });

    let socket = Arc::new(UdpSocket::bind(&listen).await.with_context(|| format!("binding {listen}"))?);
    tracing::info!(%listen, domain = %config.domain, "gatewayd listening");

    let notifications = Arc::new(Bus::new());
    let media = Arc::new(NullMediaFactory);
    let manager: Arc<dyn EndpointManager> =
        Arc::new(StaticEndpointManager::new(config.domain.clone(), notifications.clone(), media));
    let provider = GatewayCommandProvider::with_timer_defaults(
        manager,
        mgcp_proto::signal::playcollect::Ticks(config.default_first_digit_timer),
        mgcp_proto::signal::playcollect::Ticks(config.default_inter_digit_timer),
    );
    let mediator = Mediator::new(provider, config.mediator_config());
    let _reaper = mediator.spawn_reaper();

    let forwarder = Arc::new(PeerForwarder { socket: socket.clone(), peer: Mutex::new(None) });
    mediator.responses().observe(forwarder.clone());
    notifications.observe(forwarder.clone());

    let mut buf = [0u8; 2048];
    loop {
        let (n, peer) = socket.recv_from(&mut buf).await.context("receiving datagram")?;
        *forwarder.peer.lock().unwrap() = Some(peer);
        let line = String::from_utf8_lossy(&buf[..n]);
        let span = tracing::info_span!("inbound_datagram", %peer);
        let _enter = span.enter();
        match wire::decode_request(line.trim()) {
            Ok(message) => mediator.handle_inbound(message),
            Err(error) => tracing::warn!(?error, "failed to decode inbound datagram"),
        }
    }
}
