//! Progress tracking for dump passes
//!
//! Counts the bytes relayed from the dump utility and optionally shows a
//! spinner with throughput on the terminal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Byte progress tracker shared by the passes of one export
pub struct ProgressTracker {
    /// Bytes relayed so far
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Spinner (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `enable_bar` - Whether to display a spinner on stderr
    pub fn new(enable_bar: bool) -> Self {
        let bar = if enable_bar {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) =
                ProgressStyle::default_spinner().template("{spinner:.green} {bytes} dumped {msg}")
            {
                bar.set_style(style);
            }
            Some(bar)
        } else {
            None
        };

        Self {
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
        }
    }

    /// Add `bytes` to the running total
    pub fn advance(&self, bytes: u64) {
        let total = self.processed.fetch_add(bytes, Ordering::Relaxed) + bytes;

        if let Some(ref bar) = self.bar {
            bar.set_position(total);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = total as f64 / elapsed / 1024.0;
                bar.set_message(format!("({:.0} KiB/s)", speed));
            }
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates() {
        let tracker = ProgressTracker::new(false);
        tracker.advance(100);
        tracker.advance(28);
        assert_eq!(tracker.processed(), 128);
        tracker.finish();
    }
}
