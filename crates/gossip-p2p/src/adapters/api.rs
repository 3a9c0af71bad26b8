//! Local module API over plain TCP.
//!
//! Every accepted connection is one module with a random subscriber id.
//! Frames use the P2P layout with the API packet table.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{CloseReason, DataType, MessageNotificationId, SubscriberId};
use crate::ports::{ApiSubscriber, KnowledgeApi};
use crate::transport::{
    spawn_channel, ApiPacket, ChannelHandle, PacketHandler, ProtocolRegistry, TransportError,
};

/// One attached module, as seen by the engine.
#[derive(Debug)]
pub struct ApiConnection {
    id: SubscriberId,
    channel: ChannelHandle<ApiPacket>,
}

impl ApiConnection {
    /// Module speaking over `channel`.
    pub fn new(channel: ChannelHandle<ApiPacket>) -> Self {
        Self {
            id: SubscriberId::random(),
            channel,
        }
    }
}

impl ApiSubscriber for ApiConnection {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn notify(&self, notification: MessageNotificationId, data_type: DataType, data: &[u8]) {
        self.channel.send(ApiPacket::Notification {
            notification,
            data_type,
            data: data.to_vec(),
        });
    }
}

struct ApiHandler {
    api: Arc<dyn KnowledgeApi>,
    connection: Arc<ApiConnection>,
}

impl PacketHandler<ApiPacket> for ApiHandler {
    fn on_packet(
        &mut self,
        packet: ApiPacket,
        _channel: &ChannelHandle<ApiPacket>,
    ) -> Result<(), CloseReason> {
        match packet {
            ApiPacket::Announce {
                ttl,
                data_type,
                data,
            } => self
                .api
                .spread_information(self.connection.id, u16::from(ttl), data_type, data)
                // a rejected announcement ends the module connection
                .map_err(|e| {
                    warn!(module = %self.connection.id, error = %e, "Rejected announcement");
                    CloseReason::Failure(e.to_string())
                }),
            ApiPacket::Notify { data_type } => {
                self.api
                    .register_notification(self.connection.clone(), data_type);
                Ok(())
            }
            ApiPacket::Validation {
                notification,
                valid,
            } => {
                // late verdicts for expired or evicted items are expected
                if let Err(e) = self.api.receive_message_validation(notification, valid) {
                    debug!(module = %self.connection.id, error = %e, "Ignoring validation");
                }
                Ok(())
            }
            ApiPacket::Notification { .. } => {
                Err(CloseReason::Failure("module sent a notification".into()))
            }
        }
    }

    fn on_closed(&mut self, reason: &CloseReason, _channel: &ChannelHandle<ApiPacket>) {
        debug!(module = %self.connection.id, %reason, "Module disconnected");
        self.api.handle_disconnected_api_client(self.connection.id);
    }
}

/// Bound local API socket.
#[derive(Debug)]
pub struct ApiListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ApiListener {
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

    /// Serve modules until the returned task is aborted.
    pub fn spawn(self, api: Arc<dyn KnowledgeApi>) -> JoinHandle<()> {
        info!(addr = %self.local_addr, "API listener started");
        tokio::spawn(async move {
            loop {
                match self.listener.accept().await {
                    Ok((stream, remote)) => serve(stream, remote, api.clone()),
                    Err(e) => warn!(error = %e, "Failed to accept API connection"),
                }
            }
        })
    }
}

fn serve(stream: TcpStream, remote: SocketAddr, api: Arc<dyn KnowledgeApi>) {
    let _ = stream.set_nodelay(true);
    let (handle, outbound) = ChannelHandle::new(remote);
    let connection = Arc::new(ApiConnection::new(handle.clone()));
    debug!(%remote, module = %connection.id, "Module connected");

    // API connections have no handshake phase
    spawn_channel(
        stream,
        ProtocolRegistry::api_server(),
        handle,
        outbound,
        ApiHandler { api, connection },
        Duration::ZERO,
    );
}
