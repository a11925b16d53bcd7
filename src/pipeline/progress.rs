//! Progress reporting
//!
//! A run emits `(stage, percent, message)` events through a
//! [`ProgressReporter`]. Percentages never go backwards within a run.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Sanitizing,
    Chunking,
    Optimizing,
    Synthesizing { index: usize, total: usize },
    Assembling,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validating => write!(f, "validating"),
            Stage::Sanitizing => write!(f, "sanitizing"),
            Stage::Chunking => write!(f, "chunking"),
            Stage::Optimizing => write!(f, "optimizing"),
            Stage::Synthesizing { index, total } => {
                write!(f, "synthesizing chunk {}/{}", index + 1, total)
            }
            Stage::Assembling => write!(f, "assembling"),
            Stage::CleaningUp => write!(f, "cleaning up"),
            Stage::Done => write!(f, "done"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

/// Percent bands for each stage.
pub mod bands {
    pub const VALIDATING: u8 = 0;
    pub const SANITIZING_START: u8 = 10;
    pub const SANITIZING_END: u8 = 20;
    pub const CHUNKING: u8 = 25;
    pub const SYNTHESIZING_START: u8 = 45;
    pub const SYNTHESIZING_END: u8 = 85;
    pub const ASSEMBLING: u8 = 90;
    pub const CLEANING_UP: u8 = 95;
    pub const DONE: u8 = 100;

    /// Percent reached once `done` of `total` chunks are synthesized.
    pub fn synthesizing(done: usize, total: usize) -> u8 {
        let span = usize::from(SYNTHESIZING_END - SYNTHESIZING_START);
        let advanced = span * done.min(total) / total.max(1);
        SYNTHESIZING_START + advanced as u8
    }
}

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub percent: u8,
    pub message: String,
}

/// Receives progress events from a run.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: &ProgressEvent) {
        tracing::info!(
            stage = %event.stage,
            percent = event.percent,
            "{}",
            event.message
        );
    }
}

/// Prints one line per event to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: &ProgressEvent) {
        eprintln!("[{:>3}%] {}", event.percent, event.message);
    }
}

/// Sends events over an unbounded channel, for UI front-ends.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, event: &ProgressEvent) {
        // A closed receiver just means nobody is watching.
        let _ = self.tx.send(event.clone());
    }
}

/// Wraps a reporter and keeps percentages non-decreasing.
pub struct ProgressTracker<'a> {
    reporter: &'a dyn ProgressReporter,
    last: AtomicU8,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            reporter,
            last: AtomicU8::new(0),
        }
    }

    /// Report `percent`, raised to the highest value reported so far.
    pub fn emit(&self, stage: Stage, percent: u8, message: impl Into<String>) {
        let requested = percent.min(100);
        let previous = self.last.fetch_max(requested, Ordering::SeqCst);
        let event = ProgressEvent {
            stage,
            percent: requested.max(previous),
            message: message.into(),
        };
        self.reporter.report(&event);
    }

    /// Highest percentage reported so far.
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_never_goes_backwards() {
        let (reporter, mut rx) = ChannelProgress::channel();
        let tracker = ProgressTracker::new(&reporter);

        tracker.emit(Stage::Chunking, 25, "a");
        tracker.emit(Stage::Optimizing, 15, "b");
        tracker.emit(Stage::Optimizing, 30, "c");
        tracker.emit(Stage::Done, 250, "d");

        let percents: Vec<u8> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.percent)
            .collect();
        assert_eq!(percents, vec![25, 25, 30, 100]);
        assert_eq!(tracker.current(), 100);
    }

    #[test]
    fn test_synthesizing_band() {
        assert_eq!(bands::synthesizing(0, 4), 45);
        assert_eq!(bands::synthesizing(2, 4), 65);
        assert_eq!(bands::synthesizing(4, 4), 85);
        assert_eq!(bands::synthesizing(1, 0), 45);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Synthesizing { index: 1, total: 3 }.to_string(), "synthesizing chunk 2/3");
        assert_eq!(Stage::CleaningUp.to_string(), "cleaning up");
    }

    #[test]
    fn test_channel_survives_dropped_receiver() {
        let (reporter, rx) = ChannelProgress::channel();
        drop(rx);
        reporter.report(&ProgressEvent {
            stage: Stage::Done,
            percent: 100,
            message: "finished".to_string(),
        });
    }
}
