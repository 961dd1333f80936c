use std::sync::Arc;
use std::time::Duration;

use crate::flashing::{ProgressEvent, ProgressOperation};

/// A progress report of a flashing phase, as delivered to a [`ProgressObserver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    /// The phase.
    pub operation: ProgressOperation,
    /// The completed share of the phase, from 0 to 100.
    pub percent: f32,
    /// A short description of the phase.
    pub status: &'static str,
    /// The estimated remaining time of the phase, if there is an estimate yet.
    pub eta: Option<Duration>,
}

impl ProgressReport {
    fn new(operation: ProgressOperation, percent: f32, eta: Option<Duration>) -> Self {
        Self {
            operation,
            percent,
            status: operation.status_text(),
            eta,
        }
    }

    /// The remaining time in milliseconds, or -1 when unknown.
    pub fn eta_ms(&self) -> i32 {
        self.eta
            .map_or(-1, |eta| i32::try_from(eta.as_millis()).unwrap_or(i32::MAX))
    }
}

/// The process wide progress hook. It is called on the thread running the flash operation.
pub type ProgressObserver = Arc<dyn Fn(&ProgressReport) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
struct Phase {
    total: u64,
    done: u64,
    elapsed: Duration,
    /// The percentage of the last report, `None` before the phase started.
    reported: Option<f32>,
}

impl Phase {
    fn percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        ((self.done as f64 / self.total as f64) * 100.0).min(100.0) as f32
    }

    fn eta(&self) -> Option<Duration> {
        if self.total == 0 || self.done == 0 || self.elapsed.is_zero() {
            return None;
        }
        let rate = self.done as f64 / self.elapsed.as_secs_f64();
        let remaining = self.total.saturating_sub(self.done) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }
}

/// Turns the [`ProgressEvent`]s of a flash operation into [`ProgressReport`]s.
///
/// A phase reports 0% when it starts. Progress is reported when the percentage
/// moved by at least 0.1 since the last report, or when it reaches 100.
/// A finished phase reports 100% with no remaining time, unless that was
/// already reported. A failed phase reports 0% again.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    phases: [Phase; 4],
}

impl ProgressTracker {
    /// Creates a tracker with no phase started.
    pub fn new() -> Self {
        Self::default()
    }

    fn phase(&mut self, operation: ProgressOperation) -> &mut Phase {
        &mut self.phases[operation.code() as usize]
    }

    /// Feeds an event to the tracker, and returns the report it results in, if any.
    pub fn update(&mut self, event: &ProgressEvent) -> Option<ProgressReport> {
        match *event {
            ProgressEvent::AddProgressBar { operation, total } => {
                *self.phase(operation) = Phase {
                    total: total.unwrap_or(0),
                    ..Phase::default()
                };
                None
            }
            ProgressEvent::Started(operation) => {
                self.phase(operation).reported = Some(0.0);
                Some(ProgressReport::new(operation, 0.0, None))
            }
            ProgressEvent::Progress {
                operation,
                size,
                time,
            } => {
                let phase = self.phase(operation);
                phase.done = phase.done.saturating_add(size);
                phase.elapsed += time;

                let percent = phase.percent();
                let changed = phase
                    .reported
                    .map_or(true, |reported| (percent - reported).abs() >= 0.1);

                if changed || percent >= 100.0 {
                    phase.reported = Some(percent);
                    Some(ProgressReport::new(operation, percent, phase.eta()))
                } else {
                    None
                }
            }
            ProgressEvent::Finished(operation) => {
                let phase = self.phase(operation);
                if phase.reported.map_or(true, |reported| reported < 100.0) {
                    phase.reported = Some(100.0);
                    Some(ProgressReport::new(operation, 100.0, Some(Duration::ZERO)))
                } else {
                    None
                }
            }
            ProgressEvent::Failed(operation) => {
                self.phase(operation).reported = Some(0.0);
                Some(ProgressReport::new(operation, 0.0, None))
            }
            ProgressEvent::FlashLayoutReady { .. } | ProgressEvent::DiagnosticMessage { .. } => {
                None
            }
        }
    }
}
