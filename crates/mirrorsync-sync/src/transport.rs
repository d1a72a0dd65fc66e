//! Length-prefixed message transport over any async byte stream.
//!
//! Each frame is a 4-byte big-endian payload length followed by one
//! CBOR-encoded [`Message`]. [`Connection`] adds cooperative cancellation on
//! top of the framing:
//!
//! - a cancelled `receive` keeps any partially read frame buffered, so the
//!   next `receive` picks up where it left off;
//! - a cancelled `send` either discards the whole frame (nothing reached the
//!   stream yet) or poisons the connection (part of the frame did).

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SyncError};
use crate::messages::Message;
use crate::protocol::SyncConfig;

/// Codec turning frames into [`Message`]s.
///
/// Wraps [`LengthDelimitedCodec`] so that a stream ending inside a frame is
/// reported as [`SyncError::Truncated`] rather than a clean close.
#[derive(Debug)]
pub struct MessageCodec {
    frames: LengthDelimitedCodec,
    mid_frame: bool,
}

impl MessageCodec {
    /// Create a codec accepting payloads up to `max_frame_len` bytes.
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .length_field_length(4)
                .max_frame_length(max_frame_len)
                .new_codec(),
            mid_frame: false,
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = SyncError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        let had_bytes = !src.is_empty();
        let frame = self
            .frames
            .decode(src)
            .map_err(|e| SyncError::Decode(e.to_string()))?;

        match frame {
            Some(frame) => {
                self.mid_frame = false;
                Message::decode(&frame).map(Some)
            }
            None => {
                // The inner codec consumes the length prefix before the
                // payload arrives, so `src` alone can't tell us this.
                self.mid_frame |= had_bytes;
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if self.mid_frame => Err(SyncError::Truncated),
            None => Ok(None),
        }
    }
}

impl<'a> Encoder<&'a Message> for MessageCodec {
    type Error = SyncError;

    fn encode(&mut self, message: &'a Message, dst: &mut BytesMut) -> Result<()> {
        message
            .validate_limits()
            .map_err(|e| SyncError::InvalidMessage(e.into()))?;
        let payload = message.encode()?;
        self.frames
            .encode(Bytes::from(payload), dst)
            .map_err(|e| SyncError::Encode(e.to_string()))
    }
}

/// A bidirectional message connection.
pub struct Connection<S> {
    framed: Framed<S, MessageCodec>,
    poisoned: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap `stream` using the frame limit from `config`.
    pub fn new(stream: S, config: &SyncConfig) -> Self {
        Self::with_max_frame_len(stream, config.max_frame_len)
    }

    /// Wrap `stream` with an explicit frame limit.
    pub fn with_max_frame_len(stream: S, max_frame_len: usize) -> Self {
        Self {
            framed: Framed::new(stream, MessageCodec::new(max_frame_len)),
            poisoned: false,
        }
    }

    /// Send one message and flush it.
    ///
    /// Returns [`SyncError::Cancelled`] if `cancel` fires first. If no byte
    /// of the frame had been written the connection stays usable; otherwise
    /// every later send fails with [`SyncError::Poisoned`].
    pub async fn send(&mut self, message: &Message, cancel: &CancellationToken) -> Result<()> {
        if self.poisoned {
            return Err(SyncError::Poisoned);
        }
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        // The write buffer is empty here, so this only encodes.
        self.framed.feed(message).await?;
        let queued = self.framed.write_buffer().len();

        let flushed = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = SinkExt::<&Message>::flush(&mut self.framed) => Some(result),
        };

        match flushed {
            Some(Ok(())) => {
                tracing::trace!(message = message.name(), len = queued, "sent frame");
                Ok(())
            }
            Some(Err(e)) => {
                self.poisoned = true;
                Err(e)
            }
            None => {
                let remaining = self.framed.write_buffer().len();
                if remaining == queued {
                    self.framed.write_buffer_mut().clear();
                    tracing::debug!(message = message.name(), "send cancelled before writing");
                } else if remaining > 0 {
                    self.poisoned = true;
                    tracing::warn!(
                        message = message.name(),
                        written = queued - remaining,
                        len = queued,
                        "send cancelled mid-frame, connection poisoned"
                    );
                }
                Err(SyncError::Cancelled)
            }
        }
    }

    /// Receive the next message.
    ///
    /// Fails with [`SyncError::Closed`] if the peer closed the stream between
    /// frames and [`SyncError::Truncated`] if it closed inside one.
    pub async fn receive(&mut self, cancel: &CancellationToken) -> Result<Message> {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            next = self.framed.next() => next,
        };

        match next {
            Some(Ok(message)) => {
                tracing::trace!(message = message.name(), "received frame");
                Ok(message)
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "failed to receive message");
                Err(e)
            }
            None => Err(SyncError::Closed),
        }
    }

    /// Flush pending output and shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        SinkExt::<&Message>::close(&mut self.framed).await
    }

    /// Whether an interrupted send left a partial frame on the stream.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// The underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        self.framed.get_mut()
    }

    /// Consume the connection, returning the underlying stream.
    ///
    /// Buffered but unread input is lost.
    pub fn into_inner(self) -> S {
        self.framed.into_inner()
    }
}

/// In-process connections for tests and embedding.
pub mod memory {
    use tokio::io::DuplexStream;

    use super::Connection;
    use crate::protocol::SyncConfig;

    /// Bytes either side may buffer before writes block.
    pub const PIPE_CAPACITY: usize = 64 * 1024;

    /// Two connected endpoints backed by an in-memory pipe.
    pub fn pair(config: &SyncConfig) -> (Connection<DuplexStream>, Connection<DuplexStream>) {
        let (a, b) = tokio::io::duplex(PIPE_CAPACITY);
        (Connection::new(a, config), Connection::new(b, config))
    }
}
