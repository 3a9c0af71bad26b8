//! # Channel Driver
//!
//! One connection is served by two tasks:
//!
//! - a **reader** decoding frames into a bounded queue;
//! - a **driver** multiplexing received packets, the outbound queue and the
//!   handshake deadline, and dispatching packets to the active
//!   [`PacketHandler`].
//!
//! Other components talk to a connection only through its cheap, cloneable
//! [`ChannelHandle`]. Sending never blocks the caller. A remote that stops
//! reading for [`WRITE_TIMEOUT`] is dropped with `UNEXPECTED_FAILURE`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, trace};

use super::codec::{read_packet, write_packet};
use super::packets::Packet;
use super::registry::ProtocolRegistry;
use super::TransportError;
use crate::domain::{CloseReason, DisconnectReason};

const INBOUND_QUEUE: usize = 32;
const FAREWELL_TIMEOUT: Duration = Duration::from_secs(1);
/// A remote that accepts no bytes for this long is dropped.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Work queued for the driver.
#[derive(Debug)]
pub enum Outbound<P> {
    /// Write a packet.
    Packet(P),
    /// Close the connection.
    Close(CloseReason),
}

/// Sending half of a connection.
#[derive(Debug)]
pub struct ChannelHandle<P> {
    connection_id: u64,
    remote: SocketAddr,
    tx: mpsc::UnboundedSender<Outbound<P>>,
}

impl<P> Clone for ChannelHandle<P> {
    fn clone(&self) -> Self {
        Self {
            connection_id: self.connection_id,
            remote: self.remote,
            tx: self.tx.clone(),
        }
    }
}

impl<P> ChannelHandle<P> {
    /// Fresh handle and the queue it feeds.
    pub fn new(remote: SocketAddr) -> (Self, mpsc::UnboundedReceiver<Outbound<P>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            connection_id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            remote,
            tx,
        };
        (handle, rx)
    }

    /// Queue a packet. Returns `false` once the connection is gone.
    pub fn send(&self, packet: P) -> bool {
        self.tx.send(Outbound::Packet(packet)).is_ok()
    }

    /// Queue a close after everything sent so far.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.tx.send(Outbound::Close(reason));
    }

    /// Process-unique connection number.
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Remote socket address.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Whether the driver has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receives the packets of one connection.
pub trait PacketHandler<P>: Send + 'static {
    /// Handle one packet. `Err` closes the connection with that reason.
    fn on_packet(&mut self, packet: P, channel: &ChannelHandle<P>) -> Result<(), CloseReason>;

    /// Whether the handshake deadline still applies.
    fn awaiting_handshake(&self) -> bool {
        false
    }

    /// Packet announcing `reason` to the remote, if the protocol has one.
    fn farewell(&self, _reason: DisconnectReason) -> Option<P> {
        None
    }

    /// The connection is down.
    fn on_closed(&mut self, reason: &CloseReason, channel: &ChannelHandle<P>);
}

/// Spawn the reader and driver of one connection.
///
/// The handshake deadline starts now. The returned task yields the close reason.
pub fn spawn_channel<S, P, H>(
    stream: S,
    registry: ProtocolRegistry,
    handle: ChannelHandle<P>,
    outbound: mpsc::UnboundedReceiver<Outbound<P>>,
    handler: H,
    handshake_timeout: Duration,
) -> JoinHandle<CloseReason>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    P: Packet + Sync,
    H: PacketHandler<P>,
{
    let deadline = Instant::now() + handshake_timeout;
    tokio::spawn(drive(stream, registry, handle, outbound, handler, deadline))
}

async fn drive<S, P, H>(
    stream: S,
    registry: ProtocolRegistry,
    handle: ChannelHandle<P>,
    mut outbound: mpsc::UnboundedReceiver<Outbound<P>>,
    mut handler: H,
    deadline: Instant,
) -> CloseReason
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    P: Packet + Sync,
    H: PacketHandler<P>,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (inbound_tx, mut inbound) = mpsc::channel::<Result<Option<P>, TransportError>>(INBOUND_QUEUE);

    let reader_registry = registry.clone();
    let reader_task = tokio::spawn(async move {
        loop {
            let result = read_packet::<P, _>(&mut reader, &reader_registry).await;
            let stop = !matches!(result, Ok(Some(_)));
            if inbound_tx.send(result).await.is_err() || stop {
                break;
            }
        }
    });

    let mut framing_intact = true;
    let reason = loop {
        tokio::select! {
            biased;

            queued = outbound.recv() => match queued {
                Some(Outbound::Packet(packet)) => {
                    let write = write_packet(&mut writer, &registry, &packet);
                    match timeout(WRITE_TIMEOUT, write).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => break CloseReason::Transport(e.to_string()),
                        Err(_) => {
                            // a frame may be cut short
                            framing_intact = false;
                            break CloseReason::Failure("remote stopped reading".into());
                        }
                    }
                }
                Some(Outbound::Close(reason)) => break reason,
                None => break CloseReason::Failure("outbound queue closed".into()),
            },

            received = inbound.recv() => match received {
                Some(Ok(Some(packet))) => {
                    trace!(remote = %handle.remote(), role = registry.name(), "packet received");
                    if let Err(reason) = handler.on_packet(packet, &handle) {
                        break reason;
                    }
                }
                Some(Ok(None)) | None => {
                    break CloseReason::Transport("connection closed by remote".into());
                }
                Some(Err(TransportError::Io { reason })) => {
                    break CloseReason::Transport(reason);
                }
                Some(Err(e)) => break CloseReason::Failure(e.to_string()),
            },

            _ = sleep_until(deadline), if handler.awaiting_handshake() => {
                break CloseReason::Timeout;
            }
        }
    };

    if let Some(packet) = reason
        .outgoing()
        .filter(|_| framing_intact)
        .and_then(|code| handler.farewell(code))
    {
        let _ = timeout(FAREWELL_TIMEOUT, write_packet(&mut writer, &registry, &packet)).await;
    }
    let _ = timeout(FAREWELL_TIMEOUT, writer.shutdown()).await;
    reader_task.abort();
    outbound.close();

    debug!(remote = %handle.remote(), role = registry.name(), %reason, "channel closed");
    handler.on_closed(&reason, &handle);
    reason
}
