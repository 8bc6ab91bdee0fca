//! `mgcp-probe` — a tiny manual smoke-testing client, mirroring the teacher's `pulsar-client`:
//! sends one request line over UDP using the demo wire codec and prints whatever comes back.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Sends a single MGCP request (in the demo wire format) to `gatewayd` and prints the response.
#[derive(Parser, Debug)]
#[command(name = "mgcp-probe")]
struct Args {
    /// Gateway address to send the datagram to.
    #[arg(long, default_value = "127.0.0.1:2427")]
    target: String,
    /// MGCP verb, e.g. `RQNT`.
    verb: String,
    /// Transaction id.
    transaction_id: u32,
    /// Endpoint id, `localName@domain`.
    endpoint: String,
    /// Comma-separated `key=value` parameters, e.g. `S=AU/pc,mn=3,mx=3`.
    #[arg(default_value = "")]
    parameters: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await.context("binding local socket")?;
    socket.connect(&args.target).await.with_context(|| format!("connecting to {}", args.target))?;

    let mut line = format!("{} {} {}", args.verb, args.transaction_id, args.endpoint);
    if !args.parameters.is_empty() {
        line.push(' ');
        line.push_str(&args.parameters);
    }

    socket.send(line.as_bytes()).await.context("sending request")?;
    println!("-> {line}");

    let mut buf = [0u8; 2048];
    match timeout(Duration::from_secs(5), socket.recv(&mut buf)).await {
        Ok(Ok(n)) => println!("<- {}", String::from_utf8_lossy(&buf[..n])),
        Ok(Err(error)) => eprintln!("recv error: {error}"),
        Err(_) => eprintln!("no response within 5s"),
    }

    Ok(())
}
