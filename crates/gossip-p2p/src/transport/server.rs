//! P2P listener: accepts TCP, runs TLS, hands the connection to the
//! server-side handshake.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::channel::{spawn_channel, ChannelHandle};
use super::registry::ProtocolRegistry;
use super::tls::TlsContext;
use super::TransportError;
use crate::protocol::{P2pHandler, ServerHandshake};
use crate::service::GossipService;

/// Bound P2P listening socket.
#[derive(Debug)]
pub struct P2pListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl P2pListener {
    /// Bind to `addr`; port 0 picks a free port.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::BindFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve connections until the returned task is aborted.
    pub fn spawn(self, service: Arc<GossipService>, tls: TlsContext) -> JoinHandle<()> {
        info!(addr = %self.local_addr, "P2P listener started");
        tokio::spawn(accept_loop(self.listener, service, tls))
    }
}

async fn accept_loop(listener: TcpListener, service: Arc<GossipService>, tls: TlsContext) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                let service = service.clone();
                let tls = tls.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, remote, service, tls).await {
                        debug!(%remote, error = %e, "Inbound connection failed before handshake");
                    }
                });
            }
            Err(e) => warn!(error = %e, "Failed to accept P2P connection"),
        }
    }
}

async fn serve(
    stream: TcpStream,
    remote: SocketAddr,
    service: Arc<GossipService>,
    tls: TlsContext,
) -> Result<(), TransportError> {
    let handshake_timeout = service.config().handshake_timeout;
    stream.set_nodelay(true)?;

    // certificate issuance signs with the RSA host key
    let acceptor = tokio::task::spawn_blocking(move || tls.acceptor())
        .await
        .map_err(|e| TransportError::TlsError {
            reason: e.to_string(),
        })??;

    let stream = timeout(handshake_timeout, acceptor.accept(stream))
        .await
        .map_err(|_| TransportError::ConnectionTimeout {
            remote: remote.to_string(),
        })?
        .map_err(|e| TransportError::TlsError {
            reason: e.to_string(),
        })?;

    let peer_chain = stream
        .get_ref()
        .1
        .peer_certificates()
        .map(|chain| chain.to_vec());

    let (handle, outbound) = ChannelHandle::new(remote);
    let handler = P2pHandler::server(service, ServerHandshake::new(peer_chain));
    let task = spawn_channel(
        stream,
        ProtocolRegistry::p2p(),
        handle,
        outbound,
        handler,
        handshake_timeout,
    );

    if let Ok(reason) = task.await {
        debug!(%remote, %reason, "Inbound P2P connection closed");
    }
    Ok(())
}
