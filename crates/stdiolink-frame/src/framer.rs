use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{Frame, FrameConfig, Scanner};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Splits a byte stream into frames, one chunk at a time.
///
/// The accumulation buffer lives as long as the framer, so a frame split
/// across any number of [`feed`](Self::feed) calls comes out whole. The
/// framer takes `&mut self` everywhere; sharing it across threads needs
/// an owner that serializes access.
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    scanner: Scanner,
    config: FrameConfig,
}

impl LineFramer {
    /// Create a framer with the default configuration (`\n`, unbounded).
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a framer with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanner: Scanner::default(),
            config,
        }
    }

    /// Append `bytes` and iterate over every frame now complete.
    ///
    /// The iterator is lazy: frames it does not get to yield stay buffered
    /// and come out, in order, from the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(bytes);
        trace!(
            size = bytes.len(),
            buffered = self.buf.len(),
            "fed framer"
        );
        Frames { framer: self }
    }

    /// Next complete frame already in the buffer, if any.
    pub fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.scanner.next(&mut self.buf, &self.config)
    }

    /// Number of undelimited bytes held back.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Take the undelimited tail, typically once the stream has closed.
    pub fn take_remainder(&mut self) -> Option<Bytes> {
        self.scanner.reset();
        if self.buf.is_empty() {
            return None;
        }
        Some(self.buf.split().freeze())
    }

    /// Current framer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames completed by one [`LineFramer::feed`] call.
#[derive(Debug)]
pub struct Frames<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameError;

    fn collect(framer: &mut LineFramer, bytes: &[u8]) -> Vec<Vec<u8>> {
        framer
            .feed(bytes)
            .map(|frame| frame.unwrap().payload.to_vec())
            .collect()
    }

    #[test]
    fn single_chunk_multiple_frames() {
        let mut framer = LineFramer::new();
        let frames = collect(&mut framer, b"one\ntwo\nthree\n");
        assert_eq!(frames, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn trailing_bytes_survive_across_feeds() {
        let mut framer = LineFramer::new();
        assert_eq!(collect(&mut framer, b"{\"REPORT\":"), Vec::<Vec<u8>>::new());
        assert_eq!(framer.pending(), 10);

        let frames = collect(&mut framer, b"\"PROGRESS\"}\n{\"DO");
        assert_eq!(frames, vec![br#"{"REPORT":"PROGRESS"}"#.to_vec()]);
        assert_eq!(framer.pending(), 4);
    }

    #[test]
    fn arbitrary_split_points_yield_same_frames() {
        let stream: &[u8] =
            b"{\"REPORT\":\"PROGRESS\",\"TEXT\":\"50%\"}\n\nnot json\n{\"DONE\":true}\npartial";

        let mut whole = LineFramer::new();
        let expected = collect(&mut whole, stream);
        assert_eq!(expected.len(), 4);

        for split in 0..=stream.len() {
            let mut framer = LineFramer::new();
            let mut frames = collect(&mut framer, &stream[..split]);
            frames.extend(collect(&mut framer, &stream[split..]));
            assert_eq!(frames, expected, "split at {split}");
            assert_eq!(framer.pending(), b"partial".len());
        }

        let mut framer = LineFramer::new();
        let mut frames = Vec::new();
        for byte in stream {
            frames.extend(collect(&mut framer, std::slice::from_ref(byte)));
        }
        assert_eq!(frames, expected);
    }

    #[test]
    fn unconsumed_frames_come_out_on_next_feed() {
        let mut framer = LineFramer::new();
        let first = framer.feed(b"a\nb\n").next().unwrap().unwrap();
        assert_eq!(first.as_bytes(), b"a");

        let rest = collect(&mut framer, b"c\n");
        assert_eq!(rest, vec![b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn empty_feed_yields_nothing() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"").next().is_none());
    }

    #[test]
    fn take_remainder_returns_tail_once() {
        let mut framer = LineFramer::new();
        assert_eq!(collect(&mut framer, b"done\nhalf"), vec![b"done".to_vec()]);
        assert_eq!(framer.take_remainder().as_deref(), Some(&b"half"[..]));
        assert!(framer.take_remainder().is_none());
    }

    #[test]
    fn oversized_frame_is_skipped_and_stream_resyncs() {
        let mut framer = LineFramer::with_config(FrameConfig {
            max_frame_size: Some(8),
            ..FrameConfig::default()
        });

        let mut results = framer.feed(b"0123456789");
        assert!(matches!(
            results.next(),
            Some(Err(FrameError::FrameTooLarge { size: 10, max: 8 }))
        ));
        assert!(results.next().is_none());

        // Rest of the oversized frame is dropped, the next one survives.
        let frames = collect(&mut framer, b"abcdef\nok\n");
        assert_eq!(frames, vec![b"ok".to_vec()]);
    }
}
