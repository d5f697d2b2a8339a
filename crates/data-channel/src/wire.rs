//! Binary wire format for upload sessions.
//!
//! # Wire format
//!
//! ```text
//! CHUNK FRAME (sender -> receiver):
//!   [1 byte: 0x01]
//!   [2 bytes BE: bucket_len][bucket_len bytes: bucket UTF-8]
//!   [2 bytes BE: object_len][object_len bytes: object UTF-8]
//!   [4 bytes BE: payload_len][payload_len bytes: payload]
//!
//! END OF INPUT (sender -> receiver): [1 byte: 0x00]
//!
//! TERMINAL STATUS (receiver -> sender):
//!   [1 byte: code, 0x00=OK, 0x01=FAILED]
//!   [4 bytes BE: message_len][message_len bytes: message UTF-8]
//! ```

use chunkstream_protocol::{Chunk, MAX_CHUNK_SIZE, Status, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::DataChannelError;

/// Frame tag: end of input.
pub const FRAME_END: u8 = 0x00;

/// Frame tag: chunk.
pub const FRAME_CHUNK: u8 = 0x01;

/// Upper bound on a status message, so a broken peer cannot make the
/// sender allocate without limit.
pub const MAX_STATUS_MESSAGE: usize = 64 * 1024;

/// A frame read by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Chunk(Chunk),
    End,
}

/// Writes a chunk frame to the stream.
pub async fn write_chunk<W: AsyncWrite + Unpin>(
    writer: &mut W,
    chunk: &Chunk,
) -> Result<(), DataChannelError> {
    let size = chunk.payload.len();
    if size > MAX_CHUNK_SIZE {
        return Err(DataChannelError::PayloadTooLarge {
            size,
            max: MAX_CHUNK_SIZE,
        });
    }

    writer.write_u8(FRAME_CHUNK).await?;
    write_name(writer, "bucket", &chunk.bucket).await?;
    write_name(writer, "object", &chunk.object).await?;
    writer.write_u32(size as u32).await?;
    writer.write_all(&chunk.payload).await?;
    Ok(())
}

/// Writes the end-of-input marker.
pub async fn write_end_marker<W: AsyncWrite + Unpin>(
    writer: &mut W,
) -> Result<(), DataChannelError> {
    writer.write_u8(FRAME_END).await?;
    Ok(())
}

/// Reads the next frame from the stream.
///
/// Payloads larger than `max_payload` are rejected before any buffer is
/// allocated for them.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_payload: usize,
) -> Result<Frame, DataChannelError> {
    match reader.read_u8().await? {
        FRAME_END => Ok(Frame::End),
        FRAME_CHUNK => {
            let bucket = read_name(reader, "bucket").await?;
            let object = read_name(reader, "object").await?;

            let size = reader.read_u32().await? as usize;
            if size > max_payload {
                return Err(DataChannelError::PayloadTooLarge {
                    size,
                    max: max_payload,
                });
            }
            let mut payload = vec![0u8; size];
            reader.read_exact(&mut payload).await?;

            Ok(Frame::Chunk(Chunk {
                bucket,
                object,
                payload,
            }))
        }
        tag => Err(DataChannelError::Protocol(format!(
            "unknown frame tag: {tag:#04x}"
        ))),
    }
}

/// Writes the terminal status.
pub async fn write_status<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: &Status,
) -> Result<(), DataChannelError> {
    let message = status.message().as_bytes();
    if message.len() > MAX_STATUS_MESSAGE {
        return Err(DataChannelError::Protocol(format!(
            "status message too long: {} bytes (max {MAX_STATUS_MESSAGE})",
            message.len()
        )));
    }

    writer.write_u8(status.code().as_u8()).await?;
    writer.write_u32(message.len() as u32).await?;
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the terminal status.
pub async fn read_status<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Status, DataChannelError> {
    let code = StatusCode::try_from(reader.read_u8().await?)?;

    let len = reader.read_u32().await? as usize;
    if len > MAX_STATUS_MESSAGE {
        return Err(DataChannelError::Protocol(format!(
            "status message too long: {len} bytes (max {MAX_STATUS_MESSAGE})"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let message = String::from_utf8(buf)
        .map_err(|e| DataChannelError::Protocol(format!("invalid UTF-8 status message: {e}")))?;

    Ok(Status::from_parts(code, message))
}

async fn write_name<W: AsyncWrite + Unpin>(
    writer: &mut W,
    field: &str,
    name: &str,
) -> Result<(), DataChannelError> {
    let bytes = name.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(DataChannelError::Protocol(format!(
            "{field} name too long: {} bytes (max {})",
            bytes.len(),
            u16::MAX
        )));
    }
    writer.write_u16(bytes.len() as u16).await?;
    writer.write_all(bytes).await?;
    Ok(())
}

async fn read_name<R: AsyncRead + Unpin>(
    reader: &mut R,
    field: &str,
) -> Result<String, DataChannelError> {
    let len = reader.read_u16().await? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf)
        .map_err(|e| DataChannelError::Protocol(format!("invalid UTF-8 {field} name: {e}")))
}
