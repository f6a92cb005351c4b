// docbackup/src/progress.rs
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{error, info};

/// Transient per-transfer indicator. The flows only start and stop it.
pub trait ProgressReporter: Send + Sync {
    fn start(&self, label: &str);
    fn stop(&self, label: &str, succeeded: bool);
}

/// Logs start and stop lines with the elapsed time of each transfer.
#[derive(Default)]
pub struct ConsoleProgress {
    started: Mutex<HashMap<String, Instant>>,
}

impl ProgressReporter for ConsoleProgress {
    fn start(&self, label: &str) {
        if let Ok(mut started) = self.started.lock() {
            started.insert(label.to_string(), Instant::now());
        }
        info!("⏳ {}...", label);
    }

    fn stop(&self, label: &str, succeeded: bool) {
        let elapsed = self
            .started
            .lock()
            .ok()
            .and_then(|mut started| started.remove(label))
            .map(|at| at.elapsed());
        match (succeeded, elapsed) {
            (true, Some(elapsed)) => info!("✓ {} ({:.2?})", label, elapsed),
            (true, None) => info!("✓ {}", label),
            (false, Some(elapsed)) => error!("❌ {} failed after {:.2?}", label, elapsed),
            (false, None) => error!("❌ {} failed", label),
        }
    }
}

/// Stops the indicator when dropped unless `finish` already did, so an
/// early return or `?` still reports the transfer as failed.
pub struct ProgressGuard<'a> {
    reporter: &'a dyn ProgressReporter,
    label: String,
    finished: bool,
}

impl<'a> ProgressGuard<'a> {
    pub fn start(reporter: &'a dyn ProgressReporter, label: impl Into<String>) -> Self {
        let label = label.into();
        reporter.start(&label);
        Self {
            reporter,
            label,
            finished: false,
        }
    }

    pub fn finish(mut self, succeeded: bool) {
        self.finished = true;
        self.reporter.stop(&self.label, succeeded);
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.reporter.stop(&self.label, false);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingProgress;
    use super::*;

    #[test]
    fn test_finish_stops_once() {
        let progress = RecordingProgress::default();
        let guard = ProgressGuard::start(&progress, "Backing up users");
        guard.finish(true);
        assert_eq!(
            progress.calls(),
            vec!["start:Backing up users", "stop:Backing up users:ok"]
        );
    }

    #[test]
    fn test_dropped_guard_reports_failure() {
        let progress = RecordingProgress::default();
        {
            let _guard = ProgressGuard::start(&progress, "Restoring orders");
        }
        assert_eq!(
            progress.calls(),
            vec!["start:Restoring orders", "stop:Restoring orders:failed"]
        );
    }

    #[test]
    fn test_console_progress_forgets_finished_labels() {
        let progress = ConsoleProgress::default();
        progress.start("a");
        progress.stop("a", true);
        assert!(progress.started.lock().unwrap().is_empty());
    }
}
