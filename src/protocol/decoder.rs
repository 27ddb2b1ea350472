//! Incremental NDJSON decoding over arbitrary chunk boundaries

use super::record::ProgressRecord;
use bytes::{Buf, BytesMut};
use tracing::warn;

/// Reassembles progress records from byte chunks.
///
/// Only the unterminated tail of the last line is ever held between calls,
/// and a line is parsed only once its `\n` has arrived. Splitting happens on
/// bytes, so a multi-byte character cut by a chunk boundary is harmless.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already known to hold no newline
    scanned: usize,
    malformed: usize,
}

impl StreamDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every record completed by it, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ProgressRecord> {
        self.buffer.extend_from_slice(chunk);
        let mut records = Vec::new();

        while let Some(pos) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + pos;
            let line = self.buffer.split_to(end);
            self.buffer.advance(1);
            self.scanned = 0;

            if let Some(record) = self.decode_line(&line) {
                records.push(record);
            }
        }

        self.scanned = self.buffer.len();
        records
    }

    /// Bytes waiting for their delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Complete lines that could not be decoded and were skipped
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// End of stream: drop any unterminated fragment, returning its length
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        if dropped > 0 {
            warn!("Discarding {dropped} bytes of unterminated record at end of stream");
        }
        self.buffer.clear();
        self.scanned = 0;
        dropped
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<ProgressRecord> {
        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(e) => {
                self.malformed += 1;
                warn!("Skipping non-UTF-8 progress line: {e}");
                return None;
            }
        };
        if text.is_empty() {
            return None;
        }

        match serde_json::from_str(text) {
            Ok(record) => Some(record),
            Err(e) => {
                self.malformed += 1;
                warn!("Skipping malformed progress line: {e}");
                None
            }
        }
    }
}
