use chrono::Local;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::metadata::VideoRecord;

/// Sentinel stored in a record's transcript slot when its fetch was skipped
/// or discarded due to cancellation
pub const CANCELLED: &str = "Cancelled";

/// Shared state of one orchestrated run: the live record sequence, progress,
/// an append-only timestamped log, the cancelled-ID set, and a running flag.
///
/// The orchestrator is the only writer of records and progress; consumers
/// (the CLI, an embedding UI) read through the same handle and may insert
/// IDs into the cancelled set at any time. Records are replaced wholesale,
/// never partially mutated, so a reader can never observe a half-written
/// record.
#[derive(Default)]
pub struct RunState {
    records: Mutex<Vec<VideoRecord>>,
    progress: AtomicU8,
    log: Mutex<Vec<String>>,
    cancelled: Mutex<HashSet<String>>,
    running: AtomicBool,
}

pub type RunHandle = Arc<RunState>;

impl RunState {
    pub fn new() -> RunHandle {
        Arc::new(Self::default())
    }

    /// Snapshot of the current record sequence
    pub fn records(&self) -> Vec<VideoRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Replace the whole record sequence
    pub fn publish(&self, records: Vec<VideoRecord>) {
        *self.records.lock().unwrap() = records;
    }

    /// Index-addressed transcript write, replacing the whole record so a
    /// late result for item j can never clobber a later item i
    pub fn set_transcript(&self, index: usize, text: String) {
        let mut records = self.records.lock().unwrap();
        if let Some(slot) = records.get_mut(index) {
            let mut updated = slot.clone();
            updated.transcript = Some(text);
            *slot = updated;
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    /// Raise the progress percentage; within one run it never moves backward
    pub fn set_progress(&self, value: u8) {
        self.progress.fetch_max(value.min(100), Ordering::SeqCst);
    }

    /// Append a `[HH:MM:SS] message` line to the run log
    pub fn log(&self, message: &str) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        tracing::info!("{}", message);
        self.log.lock().unwrap().push(line);
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Request cancellation for one video ID. Cooperative: an in-flight
    /// fetch completes but its result is discarded.
    pub fn cancel(&self, video_id: &str) {
        self.cancelled.lock().unwrap().insert(video_id.to_string());
    }

    pub fn is_cancelled(&self, video_id: &str) -> bool {
        self.cancelled.lock().unwrap().contains(video_id)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark the run as started. Returns false if one is already in progress.
    pub fn begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic() {
        let run = RunState::new();
        run.set_progress(40);
        run.set_progress(30);
        assert_eq!(run.progress(), 40);
        run.set_progress(200);
        assert_eq!(run.progress(), 100);
    }

    #[test]
    fn test_begin_is_exclusive() {
        let run = RunState::new();
        assert!(run.begin());
        assert!(!run.begin());
        run.finish();
        assert!(run.begin());
    }

    #[test]
    fn test_log_lines_are_timestamped() {
        let run = RunState::new();
        run.log("hello");
        let lines = run.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] hello"));
    }

    #[test]
    fn test_cancel_set() {
        let run = RunState::new();
        assert!(!run.is_cancelled("dQw4w9WgXcQ"));
        run.cancel("dQw4w9WgXcQ");
        assert!(run.is_cancelled("dQw4w9WgXcQ"));
    }
}
