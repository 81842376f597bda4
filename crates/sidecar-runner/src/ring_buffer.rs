//! Bounded capture of the child's merged output
//!
//! The sidecar runs for as long as the embedding component is open, so its
//! output can't be kept in full. The ring buffer keeps the most recent bytes
//! and counts what was dropped.

use std::collections::VecDeque;
use std::fmt;

/// A byte buffer that keeps at most `max_bytes`, discarding the oldest data.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: VecDeque<u8>,
    max_bytes: usize,
    total_bytes_written: usize,
}

impl RingBuffer {
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(max_bytes.min(8192)),
            max_bytes,
            total_bytes_written: 0,
        }
    }

    /// Append data, dropping from the front once full.
    pub fn write(&mut self, data: &[u8]) {
        self.total_bytes_written += data.len();

        if self.max_bytes == 0 {
            return;
        }

        // Only the tail of an oversized write can survive
        let data = if data.len() > self.max_bytes {
            &data[data.len() - self.max_bytes..]
        } else {
            data
        };

        let overflow = (self.buffer.len() + data.len()).saturating_sub(self.max_bytes);
        self.buffer.drain(..overflow);
        self.buffer.extend(data);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_bytes
    }

    /// Total bytes ever written, including discarded ones.
    #[must_use]
    pub const fn total_bytes_written(&self) -> usize {
        self.total_bytes_written
    }

    #[must_use]
    pub const fn was_truncated(&self) -> bool {
        self.total_bytes_written > self.max_bytes
    }

    /// The last `count` complete or partial lines, oldest first.
    #[must_use]
    pub fn last_lines(&self, count: usize) -> Vec<String> {
        let text = self.to_string();
        let mut lines: Vec<String> = text
            .lines()
            .rev()
            .take(count)
            .map(str::to_owned)
            .collect();
        lines.reverse();
        lines
    }
}

impl fmt::Display for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (front, back) = self.buffer.as_slices();
        let mut bytes = Vec::with_capacity(self.buffer.len());
        bytes.extend_from_slice(front);
        bytes.extend_from_slice(back);
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}
