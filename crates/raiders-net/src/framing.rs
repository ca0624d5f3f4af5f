//! Length-prefixed framing for TCP streams.
//!
//! Every message on the wire is a length-prefixed frame:
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   payload          |
//! | u32 big-endian    |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The length does **not** include the 4 prefix bytes themselves.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the length prefix in bytes.
pub const PREFIX_LEN: usize = 4;

/// Configuration for the framing layer.
#[derive(Debug, Clone, Copy)]
pub struct FrameConfig {
    /// Maximum allowed payload size in bytes. Default: 16 MiB.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 16 * 1024 * 1024,
        }
    }
}

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload size exceeds the configured maximum.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: usize,
        /// The configured maximum.
        max: u32,
    },

    /// The peer closed the connection cleanly between frames.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer closed the connection partway through a frame.
    #[error("connection closed after {received} of {expected} bytes")]
    Truncated {
        /// Bytes the current read needed.
        expected: usize,
        /// Bytes that arrived before the close.
        received: usize,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a single length-prefixed frame from the stream.
///
/// Accumulates partial reads until the whole frame has arrived. Returns
/// [`FrameError::ConnectionClosed`] if the stream ends before any prefix byte,
/// and [`FrameError::Truncated`] if it ends inside the prefix or payload.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; PREFIX_LEN];
    let got = fill(reader, &mut len_buf).await?;
    if got == 0 {
        return Err(FrameError::ConnectionClosed);
    }
    if got < PREFIX_LEN {
        return Err(FrameError::Truncated {
            expected: PREFIX_LEN,
            received: got,
        });
    }

    let payload_len = u32::from_be_bytes(len_buf);
    if payload_len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len as usize,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; payload_len as usize];
    let got = fill(reader, &mut payload).await?;
    if got < payload.len() {
        return Err(FrameError::Truncated {
            expected: payload.len(),
            received: got,
        });
    }

    Ok(payload)
}

/// Read until `buf` is full or the stream ends. Returns the number of bytes read.
async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Build the wire bytes for one frame: prefix followed by payload.
pub fn encode_frame(payload: &[u8], config: &FrameConfig) -> Result<Vec<u8>, FrameError> {
    if payload.len() > config.max_payload_size as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: config.max_payload_size,
        });
    }

    let mut out = Vec::with_capacity(PREFIX_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Write a single length-prefixed frame to the stream.
///
/// Prefix and payload go out in one `write_all` so a frame is never split
/// across two writer calls.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let bytes = encode_frame(payload, config)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
