//! # Gossip Node Runtime
//!
//! ```text
//! gossip-node run gossip.toml
//! gossip-node generate-identity ./identities ./hostkey.pem 127.0.0.1:6001
//! gossip-node import-identity ./identities peer.pub.pem 10.0.0.7:6001
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `GOSSIP_*` environment overrides)
//! 2. Load the host key; a missing key aborts startup
//! 3. Open the identity storage
//! 4. Start P2P listener, API listener and scheduler
//! 5. Run until Ctrl+C, then disconnect every peer with NORMAL

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Gossip knowledge-dissemination node
#[derive(Parser, Debug)]
#[command(name = "gossip-node")]
#[command(about = "Authenticated P2P gossip node for local knowledge modules")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the node
    Run {
        /// Configuration file
        #[arg(default_value = "gossip.toml")]
        config: PathBuf,
    },
    /// Generate a host key and store its identity record
    GenerateIdentity {
        /// Identity storage folder
        storage: PathBuf,
        /// Where to write the PKCS#1 PEM host key
        hostkey: PathBuf,
        /// Address other peers reach this node at
        address: Option<String>,
    },
    /// Import a peer's public key into the identity storage
    ImportIdentity {
        /// Identity storage folder
        storage: PathBuf,
        /// PEM file with the peer's public key
        public_key: PathBuf,
        /// Address the peer listens on
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    match args.command.unwrap_or(Command::Run {
        config: PathBuf::from("gossip.toml"),
    }) {
        Command::Run { config } => commands::run(&config).await,
        Command::GenerateIdentity {
            storage,
            hostkey,
            address,
        } => commands::generate_identity(&storage, &hostkey, address.as_deref()),
        Command::ImportIdentity {
            storage,
            public_key,
            address,
        } => commands::import_identity(&storage, &public_key, &address),
    }
}
