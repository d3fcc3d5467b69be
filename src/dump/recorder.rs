//! Bounded stderr recorder
//!
//! Keeps the last N lines the dump utility printed on stderr so they can be
//! attached to an error message. Nothing reads it for control flow.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, trace};

/// Fixed-capacity circular log of stderr lines.
#[derive(Debug, Clone)]
pub struct StderrRecorder {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl StderrRecorder {
    /// Create a recorder keeping at most `capacity` lines (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity,
        }
    }

    /// Append one line, evicting the oldest when full.
    pub fn record(&self, line: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.trim_end().to_string());
    }

    /// Drain a reader line by line until EOF.
    ///
    /// Invalid UTF-8 is replaced rather than aborting the capture.
    pub async fn capture<R>(self, reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    trace!("dump stderr: {}", line.trim_end());
                    self.record(&line);
                }
                Err(e) => {
                    debug!("stderr capture stopped: {}", e);
                    break;
                }
            }
        }
    }

    /// Recorded lines joined with newlines.
    pub fn tail(&self) -> String {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_only_last_lines() {
        let rec = StderrRecorder::new(2);
        rec.record("one\n");
        rec.record("two\n");
        rec.record("three\n");
        assert_eq!(rec.len(), 2);
        assert_eq!(rec.tail(), "two\nthree");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let rec = StderrRecorder::new(0);
        assert_eq!(rec.capacity(), 1);
        rec.record("a");
        rec.record("b");
        assert_eq!(rec.tail(), "b");
    }

    #[tokio::test]
    async fn test_capture_from_reader() {
        let rec = StderrRecorder::new(10);
        let input: &[u8] = b"mysqldump: [Warning] Using a password\nmysqldump: Got error: 1045\n";
        rec.clone().capture(input).await;
        assert_eq!(rec.len(), 2);
        assert!(rec.tail().ends_with("Got error: 1045"));
    }

    #[tokio::test]
    async fn test_capture_lines_split_across_reads() {
        let rec = StderrRecorder::new(10);
        let reader = tokio_test::io::Builder::new()
            .read(b"mysqldump: Couldn't ")
            .read(b"find table: \"ghost\"\nsecond")
            .read(b" line\n")
            .build();
        rec.clone().capture(reader).await;
        assert_eq!(rec.tail(), "mysqldump: Couldn't find table: \"ghost\"\nsecond line");
    }

    #[tokio::test]
    async fn test_capture_lossy_utf8() {
        let rec = StderrRecorder::new(10);
        let input: &[u8] = b"bad \xff byte";
        rec.clone().capture(input).await;
        assert!(rec.tail().starts_with("bad "));
    }
}
