//! Framed message channel over a byte stream.
//!
//! [`FramedChannel`] sends and receives [`Message`]s as length-prefixed JSON
//! frames. Receiving never fails: every transport or decode problem is
//! reported as [`Received::Closed`] and the caller treats it like a clean
//! disconnect.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::messages::{Message, deserialize_message, serialize_message};

/// Why a channel stopped producing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the stream between frames.
    PeerClosed,
    /// The peer closed the stream partway through a frame.
    Truncated,
    /// The peer announced a frame larger than the configured maximum.
    Oversized,
    /// A complete frame arrived but did not decode.
    Malformed,
    /// The underlying stream reported an I/O error.
    Io,
    /// [`FramedChannel::close`] was already called.
    LocallyClosed,
}

/// Outcome of [`FramedChannel::receive`].
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// A decoded message.
    Message(Message),
    /// No further messages will arrive.
    Closed(CloseReason),
}

/// Errors returned by [`FramedChannel::send`].
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel was closed locally.
    #[error("channel is closed")]
    Closed,

    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// Writing the frame failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Errors from [`connect`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The server did not accept the connection in time.
    #[error("timed out after {timeout:?} connecting to {addr}")]
    Timeout {
        /// Address that was dialed.
        addr: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// Resolving or connecting failed.
    #[error("failed to connect to {addr}: {source}")]
    Io {
        /// Address that was dialed.
        addr: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Length-prefixed message channel that exclusively owns its stream.
pub struct FramedChannel<S> {
    stream: Option<S>,
    config: FrameConfig,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedChannel<S> {
    /// Wrap an established stream.
    pub fn new(stream: S, config: FrameConfig) -> Self {
        Self {
            stream: Some(stream),
            config,
        }
    }

    /// Serialize and send one message as a single frame.
    pub async fn send(&mut self, msg: &Message) -> Result<(), ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::Closed)?;
        let payload = serialize_message(msg)?;
        write_frame(stream, &payload, &self.config).await?;
        Ok(())
    }

    /// Wait for the next message.
    ///
    /// Blocks until a full frame arrives or the stream ends; there is no
    /// timeout.
    pub async fn receive(&mut self) -> Received {
        let Some(stream) = self.stream.as_mut() else {
            return Received::Closed(CloseReason::LocallyClosed);
        };

        let payload = match read_frame(stream, &self.config).await {
            Ok(payload) => payload,
            Err(e) => {
                let reason = match e {
                    FrameError::ConnectionClosed => CloseReason::PeerClosed,
                    FrameError::Truncated { .. } => CloseReason::Truncated,
                    FrameError::PayloadTooLarge { .. } => CloseReason::Oversized,
                    FrameError::Io(_) => CloseReason::Io,
                };
                debug!(error = %e, ?reason, "channel closed while reading");
                return Received::Closed(reason);
            }
        };

        match deserialize_message(&payload) {
            Ok(msg) => Received::Message(msg),
            Err(e) => {
                warn!(error = %e, len = payload.len(), "dropping connection on undecodable frame");
                Received::Closed(CloseReason::Malformed)
            }
        }
    }

    /// Shut the stream down. Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take()
            && let Err(e) = stream.shutdown().await
        {
            debug!(error = %e, "ignoring error while closing channel");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

/// Connect to `host:port`, giving up after `timeout`.
///
/// Sets `TCP_NODELAY` so small action frames are not held back.
pub async fn connect(
    host: &str,
    port: u16,
    timeout: Duration,
    config: FrameConfig,
) -> Result<FramedChannel<TcpStream>, ConnectError> {
    let addr = format!("{host}:{port}");
    let target = addr.clone();
    connect_with(addr, timeout, config, dial(&target)).await
}

/// Open a TCP stream to `addr` with `TCP_NODELAY` set.
pub async fn dial(addr: &str) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Wait for `connecting` to produce a stream, giving up after `timeout`.
///
/// `addr` only labels errors and logs.
pub async fn connect_with<S, F>(
    addr: String,
    timeout: Duration,
    config: FrameConfig,
    connecting: F,
) -> Result<FramedChannel<S>, ConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Future<Output = io::Result<S>>,
{
    match tokio::time::timeout(timeout, connecting).await {
        Ok(Ok(stream)) => {
            debug!(%addr, "connected");
            Ok(FramedChannel::new(stream, config))
        }
        Ok(Err(source)) => Err(ConnectError::Io { addr, source }),
        Err(_) => Err(ConnectError::Timeout { addr, timeout }),
    }
}
