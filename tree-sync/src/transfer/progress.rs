//! Byte-level progress display for file transfers.
//!
//! A [`ProgressReporter`] is shared by the whole run. Each transfer calls
//! [`ProgressReporter::begin`] with the file's label, feeds byte counts
//! through [`ProgressReporter::update`] and ends with
//! [`ProgressReporter::finish`]; the label only exists in between.

use std::io::{IsTerminal, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const CLEAR_EOL: &str = "\x1b[K";

/// Minimum time between two redraws of the same transfer
pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_secs(1);

/// Progress information for a single file transfer
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// File being transferred
    pub label: String,

    /// Total bytes to transfer
    pub total_bytes: u64,

    /// Bytes transferred so far
    pub transferred_bytes: u64,

    /// Current transfer speed in bytes/second
    pub bytes_per_second: u64,

    /// Percentage complete (0-100)
    pub percent_complete: f64,
}

impl TransferProgress {
    pub fn new(label: impl Into<String>, total_bytes: u64) -> Self {
        Self {
            label: label.into(),
            total_bytes,
            transferred_bytes: 0,
            bytes_per_second: 0,
            percent_complete: 0.0,
        }
    }

    /// Update progress with new transferred bytes
    pub fn update(&mut self, transferred_bytes: u64) {
        self.transferred_bytes = transferred_bytes;
        self.percent_complete = if self.total_bytes > 0 {
            (self.transferred_bytes as f64 / self.total_bytes as f64) * 100.0
        } else {
            0.0
        };
    }

    pub fn is_complete(&self) -> bool {
        self.transferred_bytes >= self.total_bytes
    }
}

/// Progress tracker with time-based speed calculation
pub struct ProgressTracker {
    start_time: Instant,
    last_update_time: Instant,
    last_bytes: u64,
    progress: TransferProgress,
}

impl ProgressTracker {
    pub fn new(label: impl Into<String>, total_bytes: u64) -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_update_time: now,
            last_bytes: 0,
            progress: TransferProgress::new(label, total_bytes),
        }
    }

    /// Update progress and calculate speed since the previous update
    pub fn update(&mut self, transferred_bytes: u64) -> &TransferProgress {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update_time).as_secs_f64();

        if elapsed > 0.0 {
            let bytes_diff = transferred_bytes.saturating_sub(self.last_bytes);
            self.progress.bytes_per_second = (bytes_diff as f64 / elapsed) as u64;
        }

        self.progress.update(transferred_bytes);
        self.last_update_time = now;
        self.last_bytes = transferred_bytes;

        &self.progress
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average speed since start
    pub fn average_speed(&self) -> u64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            (self.progress.transferred_bytes as f64 / elapsed) as u64
        } else {
            0
        }
    }

    pub fn progress(&self) -> &TransferProgress {
        &self.progress
    }
}

struct ActiveTransfer {
    tracker: ProgressTracker,
    last_draw: Option<Instant>,
}

/// Rate-limited progress display on stdout
pub struct ProgressReporter {
    enabled: bool,
    interval: Duration,
    active: Mutex<Option<ActiveTransfer>>,
}

impl ProgressReporter {
    /// Display is only ever drawn when stdout is a terminal.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: enabled && std::io::stdout().is_terminal(),
            interval: DEFAULT_REDRAW_INTERVAL,
            active: Mutex::new(None),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            interval: DEFAULT_REDRAW_INTERVAL,
            active: Mutex::new(None),
        }
    }

    /// Start tracking a transfer
    pub fn begin(&self, label: &str, total_bytes: u64) {
        if let Ok(mut active) = self.active.lock() {
            *active = Some(ActiveTransfer {
                tracker: ProgressTracker::new(label, total_bytes),
                last_draw: None,
            });
        }
    }

    /// Record `done` of `total` bytes for the current transfer
    pub fn update(&self, done: u64, total: u64) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        let Some(transfer) = active.as_mut() else {
            return;
        };
        if total == 0 {
            return;
        }

        let now = Instant::now();
        let due = transfer
            .last_draw
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if !due {
            return;
        }

        transfer.tracker.progress.total_bytes = total;
        let line = render_line(transfer.tracker.update(done));
        transfer.last_draw = Some(now);

        if self.enabled {
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "{}{}\r", line, CLEAR_EOL);
            let _ = stdout.flush();
        }
    }

    /// End the current transfer; prints the summary line on success.
    pub fn finish(&self, success: bool) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        let Some(mut transfer) = active.take() else {
            return;
        };
        if !self.enabled {
            return;
        }

        let mut stdout = std::io::stdout().lock();
        let total = transfer.tracker.progress().total_bytes;
        if success && total > 0 {
            // Redraws are rate limited, so the last count may be stale
            transfer.tracker.update(total);
            let _ = writeln!(stdout, "{}{}", render_summary(&transfer.tracker), CLEAR_EOL);
        } else {
            let _ = write!(stdout, "\r{}", CLEAR_EOL);
        }
        let _ = stdout.flush();
    }

    /// Label of the transfer in flight, if any
    pub fn current_label(&self) -> Option<String> {
        self.active
            .lock()
            .ok()
            .and_then(|active| active.as_ref().map(|t| t.tracker.progress().label.clone()))
    }
}

/// `<file>: <pct>% - <done> of <total> (<rate>)`
pub fn render_line(progress: &TransferProgress) -> String {
    format!(
        "{}: {:.2}% - {} of {} ({})",
        progress.label,
        progress.percent_complete,
        format_bytes(progress.transferred_bytes),
        format_bytes(progress.total_bytes),
        format_speed(progress.bytes_per_second)
    )
}

fn render_summary(tracker: &ProgressTracker) -> String {
    let progress = tracker.progress();
    format!(
        "{}: 100.00% - done {} (avg. {})",
        progress.label,
        format_bytes(progress.total_bytes),
        format_speed(tracker.average_speed())
    )
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format speed as human-readable string
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Format duration as human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_transfer_progress_update() {
        let mut progress = TransferProgress::new("a.bin", 1000);
        progress.update(500);
        assert_eq!(progress.transferred_bytes, 500);
        assert!((progress.percent_complete - 50.0).abs() < 0.01);
        assert!(!progress.is_complete());

        progress.update(1000);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_progress_tracker_speed() {
        let mut tracker = ProgressTracker::new("a.bin", 1000);
        tracker.update(100);

        thread::sleep(Duration::from_millis(100));
        let prog = tracker.update(500);
        assert_eq!(prog.transferred_bytes, 500);
        assert!(prog.bytes_per_second > 0);
    }

    #[test]
    fn test_summary_uses_average_speed() {
        let mut tracker = ProgressTracker::new("a.bin", 2048);
        thread::sleep(Duration::from_millis(50));
        tracker.update(2048);

        let average = tracker.average_speed();
        assert!(average > 0);
        assert!(average <= 2048 * 25);

        let summary = render_summary(&tracker);
        assert!(summary.starts_with("a.bin: 100.00% - done 2.00 KiB (avg. "));
        assert!(summary.ends_with("/s)"));
    }

    #[test]
    fn test_reporter_label_only_during_transfer() {
        let reporter = ProgressReporter::disabled();
        assert!(reporter.current_label().is_none());

        reporter.begin("x.txt", 10);
        reporter.update(5, 10);
        assert_eq!(reporter.current_label().as_deref(), Some("x.txt"));

        reporter.finish(true);
        assert!(reporter.current_label().is_none());
    }

    #[test]
    fn test_render_line() {
        let mut progress = TransferProgress::new("x.txt", 2048);
        progress.update(1024);
        progress.bytes_per_second = 512;
        assert_eq!(
            render_line(&progress),
            "x.txt: 50.00% - 1.00 KiB of 2.00 KiB (512.00 B/s)"
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1023), "1023.00 B");
        assert_eq!(format_bytes(1024), "1.00 KiB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MiB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GiB");
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(1024), "1.00 KiB/s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30), "30s");
        assert_eq!(format_duration(90), "1m 30s");
        assert_eq!(format_duration(3665), "1h 1m");
    }
}
