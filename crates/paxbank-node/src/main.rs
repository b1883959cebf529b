//! paxbank peer binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use paxbank_node::{repl, Node, NodeConfig};

/// Replicated bank-ledger peer over Multi-Paxos
#[derive(Parser)]
#[command(name = "paxbank-node")]
#[command(version = "0.1.0")]
#[command(about = "Replicated bank ledger over Multi-Paxos", long_about = None)]
struct Cli {
    /// Peer id (1..=5); also the account transfers may be sent from
    #[arg(long)]
    node: u64,

    /// Directory for the state snapshot
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Artificial delay before every outbound send, in milliseconds.
    /// Load-bearing for the protocol's observable timing; keep non-zero
    /// outside of tests.
    #[arg(long, default_value = "3000")]
    send_delay_ms: u64,

    /// Timeout for connect plus response, in milliseconds
    #[arg(long, default_value = "5000")]
    reply_timeout_ms: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // logs go to stderr; stdout belongs to the REPL
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = NodeConfig::new(cli.node)
        .with_data_dir(cli.data_dir)
        .with_send_delay(Duration::from_millis(cli.send_delay_ms))
        .with_reply_timeout(Duration::from_millis(cli.reply_timeout_ms));

    let node = Node::new(config)?;
    node.start().await?;

    tracing::info!(node = cli.node, "peer started");
    repl::run(&node).await?;
    tracing::info!("stdin closed, shutting down");

    Ok(())
}
