//! RAII timing for history operations.
//!
//! ```rust,ignore
//! use rewind_util::timing::TimingGuard;
//!
//! async fn snapshot(path: &Path) {
//!     let _timing = TimingGuard::history("process", path.display().to_string());
//!     // copy and sweep; the duration is logged when _timing drops
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Level};

/// Steps slower than this are reported at info level.
const DEFAULT_INFO_AFTER: Duration = Duration::from_millis(250);

/// Steps slower than this are reported as warnings.
const DEFAULT_WARN_AFTER: Duration = Duration::from_secs(2);

/// Logs how long a step took when dropped.
pub struct TimingGuard {
    /// Subsystem, e.g. "history"
    scope: &'static str,
    /// Step and the file or directory it touched
    label: String,
    start: Instant,
    info_after: Duration,
    warn_after: Duration,
}

impl TimingGuard {
    pub fn new(scope: &'static str, label: impl Into<String>) -> Self {
        let label = label.into();
        debug!(scope, label = %label, "Starting");
        Self {
            scope,
            label,
            start: Instant::now(),
            info_after: DEFAULT_INFO_AFTER,
            warn_after: DEFAULT_WARN_AFTER,
        }
    }

    /// Guard for a history bookkeeping step on `target`.
    pub fn history(step: &str, target: impl AsRef<str>) -> Self {
        Self::new("history", format!("{step} {}", target.as_ref()))
    }

    /// Report at info level from `after` on.
    pub fn info_after(mut self, after: Duration) -> Self {
        self.info_after = after;
        self
    }

    /// Report as a warning from `after` on.
    pub fn warn_after(mut self, after: Duration) -> Self {
        self.warn_after = after;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn level_for(&self, elapsed: Duration) -> Level {
        if elapsed >= self.warn_after {
            Level::WARN
        } else if elapsed >= self.info_after {
            Level::INFO
        } else {
            Level::DEBUG
        }
    }
}

fn human(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let took = human(elapsed);

        let level = self.level_for(elapsed);
        if level == Level::WARN {
            warn!(scope = self.scope, label = %self.label, took = %took, "Slow step");
        } else if level == Level::INFO {
            info!(scope = self.scope, label = %self.label, took = %took, "Step finished");
        } else {
            debug!(scope = self.scope, label = %self.label, took = %took, "Step finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_elapsed_grows() {
        let guard = TimingGuard::new("test", "basic");
        sleep(Duration::from_millis(10));
        assert!(guard.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_history_label() {
        let guard = TimingGuard::history("sweep", "/tmp/a.txt")
            .info_after(Duration::from_millis(50))
            .warn_after(Duration::from_secs(1));
        assert_eq!(guard.label, "sweep /tmp/a.txt");
        assert_eq!(guard.scope, "history");
        assert_eq!(guard.warn_after, Duration::from_secs(1));
    }

    #[test]
    fn test_thresholds_pick_level() {
        let guard = TimingGuard::new("test", "levels");
        assert_eq!(guard.level_for(Duration::from_millis(10)), Level::DEBUG);
        assert_eq!(guard.level_for(Duration::from_millis(300)), Level::INFO);
        assert_eq!(guard.level_for(Duration::from_secs(3)), Level::WARN);

        let always = TimingGuard::new("test", "always").info_after(Duration::ZERO);
        assert_eq!(always.level_for(Duration::ZERO), Level::INFO);

        let strict = TimingGuard::new("test", "strict").warn_after(Duration::from_millis(500));
        assert_eq!(strict.level_for(Duration::from_millis(600)), Level::WARN);
    }

    #[test]
    fn test_human_duration() {
        assert_eq!(human(Duration::from_millis(42)), "42ms");
        assert_eq!(human(Duration::from_millis(1500)), "1.50s");
    }
}
