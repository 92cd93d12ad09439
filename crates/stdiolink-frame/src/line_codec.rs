use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, FrameConfig, Scanner};
use crate::error::FrameError;

/// `tokio_util` codec for delimiter-terminated frames.
///
/// Decoding shares the incremental scan used by [`LineFramer`](crate::LineFramer),
/// so `FramedRead` over a child's stdout behaves exactly like feeding the
/// same bytes by hand.
#[derive(Debug, Clone, Default)]
pub struct LineCodec {
    scanner: Scanner,
    config: FrameConfig,
}

impl LineCodec {
    /// Codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            scanner: Scanner::default(),
            config,
        }
    }
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.scanner.next(src, &self.config).transpose()
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        // An unterminated tail at EOF is still handed out once.
        self.scanner.reset();
        if src.is_empty() {
            return Ok(None);
        }
        Ok(Some(Frame::new(src.split().freeze())))
    }
}

impl Encoder<Bytes> for LineCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, &self.config, dst)
    }
}

impl Encoder<Frame> for LineCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item.payload, &self.config, dst)
    }
}
