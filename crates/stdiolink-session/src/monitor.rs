use tracing::trace;

use crate::collab::Diagnostics;

/// Forwards the worker's error stream to diagnostics as text.
///
/// Chunks are passed through as they arrive, with no framing. A multi-byte
/// UTF-8 character split across two reads is held back until its last
/// byte shows up, so it is never turned into replacement characters.
#[derive(Debug, Default)]
pub struct ErrorStreamMonitor {
    carry: Vec<u8>,
}

impl ErrorStreamMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward one chunk read from stderr.
    pub fn forward(&mut self, bytes: &[u8], diagnostics: &mut dyn Diagnostics) {
        if bytes.is_empty() {
            return;
        }
        self.carry.extend_from_slice(bytes);

        let split = self.carry.len() - incomplete_tail(&self.carry);
        if split == 0 {
            trace!(held = self.carry.len(), "holding partial character");
            return;
        }

        let rest = self.carry.split_off(split);
        let text = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry = rest;
        diagnostics.worker_stderr(&text);
    }

    /// Flush whatever is held back, once the stream has closed.
    pub fn finish(&mut self, diagnostics: &mut dyn Diagnostics) {
        if self.carry.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        diagnostics.worker_stderr(&text);
    }

    /// Bytes held back waiting for the rest of a character.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

/// Length of a truncated UTF-8 sequence at the end of `bytes`, or 0.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return 0,
        };
        return if width > back { back } else { 0 };
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::testing::{Call, Recorder};

    fn stderr_lines(rec: &Recorder) -> Vec<String> {
        rec.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Stderr(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn chunks_pass_through_unframed() {
        let mut rec = Recorder::default();
        let mut monitor = ErrorStreamMonitor::new();

        monitor.forward(b"warning: low", &mut rec);
        monitor.forward(b" memory\nsecond", &mut rec);

        assert_eq!(
            stderr_lines(&rec),
            vec!["warning: low".to_string(), " memory\nsecond".to_string()]
        );
    }

    #[test]
    fn split_character_is_reassembled() {
        let mut rec = Recorder::default();
        let mut monitor = ErrorStreamMonitor::new();
        let text = "température";
        let bytes = text.as_bytes();
        let cut = text.find('é').unwrap() + 1;

        monitor.forward(&bytes[..cut], &mut rec);
        assert_eq!(monitor.pending(), 1);
        monitor.forward(&bytes[cut..], &mut rec);

        assert_eq!(
            stderr_lines(&rec),
            vec!["temp".to_string(), "érature".to_string()]
        );
        assert_eq!(monitor.pending(), 0);
    }

    #[test]
    fn lone_partial_character_waits() {
        let mut rec = Recorder::default();
        let mut monitor = ErrorStreamMonitor::new();
        let euro = "€".as_bytes();

        monitor.forward(&euro[..1], &mut rec);
        monitor.forward(&euro[1..2], &mut rec);
        assert!(stderr_lines(&rec).is_empty());

        monitor.forward(&euro[2..], &mut rec);
        assert_eq!(stderr_lines(&rec), vec!["€".to_string()]);
    }

    #[test]
    fn finish_flushes_truncated_tail_lossily() {
        let mut rec = Recorder::default();
        let mut monitor = ErrorStreamMonitor::new();

        monitor.forward(&[b'x', 0xE2, 0x82], &mut rec);
        monitor.finish(&mut rec);
        monitor.finish(&mut rec);

        assert_eq!(
            stderr_lines(&rec),
            vec!["x".to_string(), "\u{fffd}".to_string()]
        );
    }

    #[test]
    fn invalid_bytes_are_not_held() {
        let mut rec = Recorder::default();
        let mut monitor = ErrorStreamMonitor::new();

        monitor.forward(&[b'a', 0xFF], &mut rec);

        assert_eq!(stderr_lines(&rec), vec!["a\u{fffd}".to_string()]);
        assert_eq!(monitor.pending(), 0);
    }

    #[test]
    fn tail_detection() {
        assert_eq!(incomplete_tail(b"abc"), 0);
        assert_eq!(incomplete_tail("é".as_bytes()), 0);
        assert_eq!(incomplete_tail(&[0xC3]), 1);
        assert_eq!(incomplete_tail(&[0xF0, 0x9F, 0x98]), 3);
        assert_eq!(incomplete_tail(&[0xF0, 0x9F, 0x98, 0x80]), 0);
    }
}
