//! Progress narration for long-running collections.
//!
//! Collectors report milestones through [`ProgressReporter`]. The default
//! [`LogProgress`] turns them into tracing events with a completion
//! percentage and a rough time estimate; the CLI swaps in progress bars.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Unit of work being counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkUnit {
    /// One (year, jurisdiction) request of a sweep
    Partitions,
    /// One report-id batch
    Batches,
}

impl WorkUnit {
    /// Plural label used in progress lines.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Partitions => "partitions",
            Self::Batches => "batches",
        }
    }
}

/// Milestone hooks called by the collectors. Every method defaults to a no-op.
pub trait ProgressReporter: Send + Sync {
    /// A phase with `total` units of work is starting.
    fn started(&self, _unit: WorkUnit, _endpoint: &str, _total: usize) {}

    /// One unit finished; `label` names it (e.g. "2016/AK" or "batch 3").
    fn advanced(&self, _unit: WorkUnit, _label: &str, _records: usize, _failed: bool) {}

    /// The phase ended.
    fn finished(&self, _unit: WorkUnit, _records: usize, _failures: usize) {}
}

/// Counters behind [`LogProgress`]
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Units completed so far
    pub completed: usize,
    /// Units in the phase
    pub total: usize,
    /// Records accumulated so far
    pub records: usize,
    /// Phase start
    pub start_time: Instant,
}

impl ProgressState {
    /// Fresh state for a phase of `total` units.
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            records: 0,
            start_time: Instant::now(),
        }
    }

    /// Completion percentage (0-100); an empty phase counts as complete.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }

    /// Linear estimate of the time left.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.completed == 0 || self.completed >= self.total {
            return None;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let per_unit = elapsed / self.completed as f64;
        let remaining = per_unit * (self.total - self.completed) as f64;
        Duration::try_from_secs_f64(remaining).ok()
    }

    /// "[PROGRESS] 12/59 partitions - 20.3% complete (2016/AK) - 4210 records - ~3m remaining"
    pub fn format_progress(&self, unit: WorkUnit, label: &str) -> String {
        let mut parts = vec![
            format!(
                "[PROGRESS] {}/{} {}",
                self.completed,
                self.total,
                unit.plural()
            ),
            format!("- {:.1}% complete", self.percentage()),
            format!("({label})"),
            format!("- {} records", self.records),
        ];

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

/// Reporter that narrates through tracing.
///
/// With `show_progress` set, per-unit lines are `info!`; otherwise `debug!`.
#[derive(Debug)]
pub struct LogProgress {
    show_progress: bool,
    state: Mutex<Option<ProgressState>>,
}

impl LogProgress {
    /// Create a reporter.
    pub fn new(show_progress: bool) -> Self {
        Self {
            show_progress,
            state: Mutex::new(None),
        }
    }

    fn emit(&self, line: &str) {
        if self.show_progress {
            info!("{line}");
        } else {
            debug!("{line}");
        }
    }
}

impl ProgressReporter for LogProgress {
    fn started(&self, unit: WorkUnit, endpoint: &str, total: usize) {
        if let Ok(mut state) = self.state.lock() {
            *state = Some(ProgressState::new(total));
        }
        self.emit(&format!(
            "Starting {endpoint}: {total} {} to fetch",
            unit.plural()
        ));
    }

    fn advanced(&self, unit: WorkUnit, label: &str, records: usize, _failed: bool) {
        let line = match self.state.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(state) => {
                    state.completed += 1;
                    state.records += records;
                    state.format_progress(unit, label)
                }
                None => return,
            },
            Err(_) => return,
        };
        self.emit(&line);
    }

    fn finished(&self, unit: WorkUnit, records: usize, failures: usize) {
        let elapsed = self
            .state
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.start_time.elapsed()))
            .unwrap_or_default();
        self.emit(&format!(
            "Finished {}: {records} records, {failures} failed, in {}",
            unit.plural(),
            format_duration(elapsed)
        ));
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
