use std::borrow::Cow;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Default frame delimiter: newline.
pub const DEFAULT_DELIMITER: u8 = b'\n';

/// One delimiter-terminated unit of the wire protocol, delimiter stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame payload. Never contains the delimiter.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.payload.as_ref()
    }

    /// Payload as text, with invalid UTF-8 replaced.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Configuration for the line codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Byte terminating each frame. Default: `\n`.
    pub delimiter: u8,
    /// Optional cap on a single frame's payload. Default: unbounded.
    ///
    /// Oversized input is discarded up to and including the next delimiter
    /// and reported as [`FrameError::FrameTooLarge`].
    pub max_frame_size: Option<usize>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            max_frame_size: None,
        }
    }
}

/// Encode a payload into the wire format (payload + delimiter).
///
/// ```text
/// ┌──────────────────────────┬───────────┐
/// │ Payload (no delimiter)   │ Delimiter │
/// │                          │ (1B, \n)  │
/// └──────────────────────────┴───────────┘
/// ```
pub fn encode_frame(payload: &[u8], config: &FrameConfig, dst: &mut BytesMut) -> Result<()> {
    if let Some(offset) = payload.iter().position(|&b| b == config.delimiter) {
        return Err(FrameError::EmbeddedDelimiter {
            delimiter: config.delimiter,
            offset,
        });
    }
    if let Some(max) = config.max_frame_size {
        if payload.len() > max {
            return Err(FrameError::FrameTooLarge {
                size: payload.len(),
                max,
            });
        }
    }
    dst.reserve(payload.len() + 1);
    dst.put_slice(payload);
    dst.put_u8(config.delimiter);
    Ok(())
}

/// Decode one frame from the front of a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes and the delimiter from the buffer.
/// This is the stateless form; [`LineFramer`](crate::LineFramer) avoids
/// rescanning a long partial frame on every call.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Frame>> {
    Scanner::default().next(src, config).transpose()
}

/// Incremental delimiter search shared by the framer and the async codec.
#[derive(Debug, Default, Clone)]
pub(crate) struct Scanner {
    /// Bytes at the front of the buffer already known to be delimiter-free.
    scanned: usize,
    /// Dropping the rest of an oversized frame.
    discarding: bool,
}

impl Scanner {
    pub(crate) fn next(
        &mut self,
        src: &mut BytesMut,
        config: &FrameConfig,
    ) -> Option<Result<Frame>> {
        loop {
            let found = src[self.scanned..]
                .iter()
                .position(|&b| b == config.delimiter)
                .map(|pos| self.scanned + pos);

            let Some(end) = found else {
                if self.discarding {
                    src.clear();
                    self.scanned = 0;
                    return None;
                }
                self.scanned = src.len();
                if let Some(max) = config.max_frame_size {
                    if src.len() > max {
                        let size = src.len();
                        src.clear();
                        self.scanned = 0;
                        self.discarding = true;
                        return Some(Err(FrameError::FrameTooLarge { size, max }));
                    }
                }
                return None;
            };

            self.scanned = 0;

            if self.discarding {
                src.advance(end + 1);
                self.discarding = false;
                continue;
            }

            if let Some(max) = config.max_frame_size {
                if end > max {
                    src.advance(end + 1);
                    return Some(Err(FrameError::FrameTooLarge { size: end, max }));
                }
            }

            let payload = src.split_to(end).freeze();
            src.advance(1);
            return Some(Ok(Frame { payload }));
        }
    }

    pub(crate) fn reset(&mut self) {
        self.scanned = 0;
        self.discarding = false;
    }
}
