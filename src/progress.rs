use std::fmt;

/// Receives progress updates while dumping or loading.
///
/// `total` grows as directories are opened, `done` by one per entry.
pub trait ProgressSink {
    fn increment(&mut self, total: u64, done: u64);
}

impl<F: FnMut(u64, u64)> ProgressSink for F {
    fn increment(&mut self, total: u64, done: u64) {
        self(total, done)
    }
}

/// Ignores all updates.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn increment(&mut self, _total: u64, _done: u64) {}
}

#[derive(Debug, Default)]
/// Tracker for progress of dump and load operations.
pub struct DumpProgress {
    /// Known entries
    pub total: u64,
    /// Processed entries
    pub done: u64,
}

impl DumpProgress {
    /// Relative progress, 0.0 if nothing is known yet.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.done as f64) / (self.total as f64)
        }
    }
}

impl ProgressSink for DumpProgress {
    fn increment(&mut self, total: u64, done: u64) {
        self.total += total;
        self.done += done;
    }
}

impl fmt::Display for DumpProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}% ({}/{} entries)",
            self.percentage() * 100.0,
            self.done,
            self.total,
        )
    }
}

#[test]
fn test_dump_progress() {
    let mut progress = DumpProgress::default();
    assert_eq!(progress.to_string(), "0.00% (0/0 entries)");
    progress.increment(4, 1);
    progress.increment(0, 1);
    assert_eq!(progress.to_string(), "50.00% (2/4 entries)");

    let mut calls = Vec::new();
    let mut sink = |total: u64, done: u64| calls.push((total, done));
    sink.increment(3, 1);
    assert_eq!(calls, vec![(3, 1)]);
}
