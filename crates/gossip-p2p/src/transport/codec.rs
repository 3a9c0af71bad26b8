//! # Frame Codec
//!
//! Length-prefixed framing over any async byte stream. The length field
//! counts the whole frame including itself.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::packets::{Packet, HEADER_LEN, MAX_FRAME_LEN};
use super::registry::ProtocolRegistry;
use super::TransportError;

/// Encode `packet` into one frame.
pub fn encode_frame<P: Packet>(
    registry: &ProtocolRegistry,
    packet: &P,
) -> Result<Vec<u8>, TransportError> {
    let id = packet.packet_id();
    registry.check_outbound(id)?;

    let mut frame = Vec::with_capacity(HEADER_LEN + 64);
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(&id.to_be_bytes());
    packet.encode_payload(&mut frame);

    if frame.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge { size: frame.len() });
    }
    let len = frame.len() as u16;
    frame[..2].copy_from_slice(&len.to_be_bytes());
    Ok(frame)
}

/// Write one packet.
pub async fn write_packet<P, W>(
    writer: &mut W,
    registry: &ProtocolRegistry,
    packet: &P,
) -> Result<(), TransportError>
where
    P: Packet,
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(registry, packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one packet. `Ok(None)` means the stream ended cleanly between frames.
pub async fn read_packet<P, R>(
    reader: &mut R,
    registry: &ProtocolRegistry,
) -> Result<Option<P>, TransportError>
where
    P: Packet,
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 2];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = usize::from(u16::from_be_bytes(len_bytes));
    if len < HEADER_LEN {
        return Err(TransportError::violation(format!(
            "frame length {len} shorter than header"
        )));
    }

    let mut id_bytes = [0u8; 2];
    reader.read_exact(&mut id_bytes).await?;
    let id = u16::from_be_bytes(id_bytes);
    registry.check_inbound(id)?;

    let mut payload = vec![0u8; len - HEADER_LEN];
    reader.read_exact(&mut payload).await?;

    P::decode(id, &payload).map(Some)
}
