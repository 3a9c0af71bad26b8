//! Outbound dialing: TCP connect, TLS with the expected identity pinned,
//! then the client-side handshake.

use std::sync::{Arc, Weak};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;

use super::channel::{spawn_channel, ChannelHandle};
use super::packets::{P2pPacket, PROTOCOL_VERSION};
use super::registry::ProtocolRegistry;
use super::tls::TlsContext;
use crate::domain::CloseReason;
use crate::ports::Connector;
use crate::protocol::{ClientHandshake, HandshakeResult, P2pHandler};
use crate::scheduler::GossipClientContext;
use crate::service::GossipService;

/// [`Connector`] dialing over TCP + TLS on the current runtime.
#[derive(Debug)]
pub struct TlsClientConnector {
    service: Weak<GossipService>,
    tls: TlsContext,
}

impl TlsClientConnector {
    /// Connector for `service`.
    pub fn new(service: &Arc<GossipService>, tls: TlsContext) -> Self {
        Self {
            service: Arc::downgrade(service),
            tls,
        }
    }
}

impl Connector for TlsClientConnector {
    fn connect(&self, context: Arc<GossipClientContext>) {
        let Some(service) = self.service.upgrade() else {
            return;
        };
        let tls = self.tls.clone();
        tokio::spawn(async move {
            if let Err(reason) = dial(service, tls, context.clone()).await {
                debug!(peer = %context.identity(), %reason, "Outbound connection attempt failed");
            }
        });
    }
}

/// Dial the peer of a claimed `context` and run the handshake.
///
/// Resolves once the session is admitted or the attempt failed; the outcome
/// is also recorded in the context.
pub async fn dial(
    service: Arc<GossipService>,
    tls: TlsContext,
    context: Arc<GossipClientContext>,
) -> HandshakeResult {
    let connect_timeout = service.config().connect_timeout;
    let handshake_timeout = service.config().handshake_timeout;
    let time = service.time().clone();

    let target = (context.host().to_owned(), context.port());
    let stream = match timeout(connect_timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            context.on_connect_failed(time.now_millis());
            return Err(CloseReason::Transport(e.to_string()));
        }
        Err(_) => {
            context.on_connect_failed(time.now_millis());
            return Err(CloseReason::Transport("connect timed out".into()));
        }
    };

    let remote = match stream.peer_addr() {
        Ok(remote) => remote,
        Err(e) => {
            context.on_connect_failed(time.now_millis());
            return Err(CloseReason::Transport(e.to_string()));
        }
    };
    let _ = stream.set_nodelay(true);

    let expected = context.identity();
    let tls_stream = async move {
        let connector = tokio::task::spawn_blocking(move || tls.connector(expected))
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())?;
        let server_name = TlsContext::server_name().map_err(|e| e.to_string())?;
        timeout(handshake_timeout, connector.connect(server_name, stream))
            .await
            .map_err(|_| "TLS handshake timed out".to_string())?
            .map_err(|e| e.to_string())
    };
    let stream = match tls_stream.await {
        Ok(stream) => stream,
        Err(reason) => {
            let reason = CloseReason::Transport(reason);
            context.on_handshake_failed(&reason, time.now_millis());
            return Err(reason);
        }
    };

    let (handle, outbound) = ChannelHandle::new(remote);
    handle.send(P2pPacket::Hello {
        version: PROTOCOL_VERSION,
    });

    let (completion, completed) = oneshot::channel();
    let handler = P2pHandler::client(
        service,
        ClientHandshake::new(context.peer().clone(), completion),
    );
    let task = spawn_channel(
        stream,
        ProtocolRegistry::p2p(),
        handle,
        outbound,
        handler,
        handshake_timeout,
    );

    let reason = match completed.await {
        Ok(Ok(())) => {
            context.on_connected();
            tokio::spawn(async move {
                let _ = task.await;
                context.on_session_ended(time.now_millis());
            });
            return Ok(());
        }
        Ok(Err(reason)) => reason,
        Err(_) => task
            .await
            .unwrap_or_else(|e| CloseReason::Failure(e.to_string())),
    };

    context.on_handshake_failed(&reason, time.now_millis());
    Err(reason)
}
