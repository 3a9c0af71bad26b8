//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use gossip_p2p::{
    FilePeerIdentityStorage, GossipNode, PeerIdentityStorage, StoredIdentity, TomlConfigProvider,
};
use shared_crypto::{HostKey, PeerPublicKey};
use std::fs;
use std::path::Path;
use tracing::info;

/// Start the node and serve until Ctrl+C.
pub async fn run(config_path: &Path) -> Result<()> {
    let config = TomlConfigProvider::load(config_path)
        .with_context(|| format!("loading configuration {}", config_path.display()))?;
    if !config.hostkey.exists() {
        bail!(
            "host key {} does not exist, create one with generate-identity",
            config.hostkey.display()
        );
    }

    let node = GossipNode::start(config)
        .await
        .context("starting gossip node")?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    // Graceful shutdown
    node.shutdown().await;
    Ok(())
}

/// Create a host key and record its identity.
pub fn generate_identity(storage: &Path, hostkey: &Path, address: Option<&str>) -> Result<()> {
    if hostkey.exists() {
        bail!("refusing to overwrite existing host key {}", hostkey.display());
    }

    let key = HostKey::generate().context("generating host key")?;
    key.write_pem_file(hostkey)
        .with_context(|| format!("writing {}", hostkey.display()))?;

    let record = with_address(StoredIdentity::new(key.public_key().clone()), address)?;
    FilePeerIdentityStorage::open(storage)?
        .store(record)
        .context("storing identity record")?;

    info!(identity = %key.identity(), "Generated host key");
    println!("{}", key.identity());
    Ok(())
}

/// Trust a peer by storing its public key and address.
pub fn import_identity(storage: &Path, public_key: &Path, address: &str) -> Result<()> {
    let pem = fs::read_to_string(public_key)
        .with_context(|| format!("reading {}", public_key.display()))?;
    let key = PeerPublicKey::from_pem(&pem).context("parsing public key")?;

    let record = with_address(StoredIdentity::new(key), Some(address))?;
    let identity = record.identity();
    FilePeerIdentityStorage::open(storage)?
        .store(record)
        .context("storing identity record")?;

    info!(%identity, address, "Imported peer identity");
    println!("{identity}");
    Ok(())
}

fn with_address(mut record: StoredIdentity, address: Option<&str>) -> Result<StoredIdentity> {
    if let Some(address) = address {
        let (host, port) = address
            .rsplit_once(':')
            .with_context(|| format!("address {address} is not host:port"))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid port in {address}"))?;
        record.last_seen_hostname = Some(host.trim_matches(['[', ']']).to_owned());
        record.last_seen_port = Some(port);
    }
    Ok(record)
}
