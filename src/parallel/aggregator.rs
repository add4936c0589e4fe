//! Outcome aggregation

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::FailureReason;
use crate::parallel::progress::{ProgressEvent, ProgressObserver};
use crate::parallel::ConversionOutcome;

/// Aggregate result of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessSummary {
    /// Files discovered for this run
    pub total_files: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub converted: Vec<ConvertedFile>,
    /// Failures in arrival order
    pub failures: Vec<FailedFile>,
    /// Files never handed to a worker because the run was stopped
    pub not_dispatched: usize,
    /// Every discovered file has an outcome
    pub completed: bool,
    #[serde(rename = "elapsed_seconds", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedFile {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: FailureReason,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl ProcessSummary {
    /// Summary of a run that had nothing to do
    pub fn empty() -> Self {
        Self {
            completed: true,
            ..Self::default()
        }
    }

    pub fn failed_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.failures.iter().map(|f| &f.path)
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }
}

/// Collects outcomes from concurrent workers and publishes the summary
/// exactly once, after every dispatched task has reported.
pub struct ResultAggregator {
    state: Mutex<AggregatorState>,
    observer: Arc<dyn ProgressObserver>,
    started: Instant,
}

struct AggregatorState {
    total: usize,
    /// Tasks actually handed out; known once sealed
    dispatched: Option<usize>,
    /// Dispatch indices with an outcome; one task, one outcome, even when
    /// two tasks name the same file
    recorded: HashSet<usize>,
    converted: Vec<ConvertedFile>,
    failures: Vec<FailedFile>,
    completion: Option<oneshot::Sender<ProcessSummary>>,
}

impl ResultAggregator {
    /// Aggregator for `total` tasks, plus the receiving end of its completion signal
    pub fn new(
        total: usize,
        observer: Arc<dyn ProgressObserver>,
    ) -> (Self, oneshot::Receiver<ProcessSummary>) {
        let (sender, receiver) = oneshot::channel();
        let aggregator = Self {
            state: Mutex::new(AggregatorState {
                total,
                dispatched: None,
                recorded: HashSet::with_capacity(total),
                converted: Vec::new(),
                failures: Vec::new(),
                completion: Some(sender),
            }),
            observer,
            started: Instant::now(),
        };
        (aggregator, receiver)
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the outcome of the task dispatched as number `task`.
    /// Duplicates and late arrivals are dropped.
    pub fn record(&self, task: usize, outcome: ConversionOutcome) {
        let mut state = self.lock();

        if state.completion.is_none() {
            warn!("Outcome for {:?} arrived after the run finished", outcome.input());
            return;
        }
        if !state.recorded.insert(task) {
            warn!("Duplicate outcome for task {} ({:?}) ignored", task, outcome.input());
            return;
        }

        match &outcome {
            ConversionOutcome::Success { input, output } => state.converted.push(ConvertedFile {
                input: input.clone(),
                output: output.clone(),
            }),
            ConversionOutcome::Failure { input, reason } => {
                warn!(kind = reason.label(), "Failed to convert {:?}: {}", input, reason);
                state.failures.push(FailedFile {
                    path: input.clone(),
                    reason: reason.clone(),
                });
            }
        }

        // Emitted under the lock so observers see events in record order
        // and never after Finished.
        self.observer.on_event(ProgressEvent::FileFinished {
            outcome,
            finished: state.recorded.len(),
            total_files: state.total,
        });

        self.try_finish(&mut state);
    }

    /// Declare how many tasks were dispatched. No more tasks follow.
    pub fn seal(&self, dispatched: usize) {
        let mut state = self.lock();
        state.dispatched = Some(dispatched.min(state.total));
        self.try_finish(&mut state);
    }

    /// Whether task number `task` has reported
    pub fn has_recorded(&self, task: usize) -> bool {
        self.lock().recorded.contains(&task)
    }

    /// Current state as a summary, settled or not
    pub fn snapshot(&self) -> ProcessSummary {
        let state = self.lock();
        self.build_summary(&state)
    }

    fn try_finish(&self, state: &mut AggregatorState) {
        let Some(dispatched) = state.dispatched else {
            return;
        };
        if state.recorded.len() < dispatched {
            return;
        }
        let Some(sender) = state.completion.take() else {
            return;
        };

        let summary = self.build_summary(state);
        info!(
            "Run finished: {} converted, {} failed, {} not dispatched in {:.2}s",
            summary.success_count,
            summary.failure_count,
            summary.not_dispatched,
            summary.elapsed.as_secs_f64()
        );

        self.observer.on_event(ProgressEvent::Finished {
            summary: summary.clone(),
        });
        if sender.send(summary).is_err() {
            warn!("Summary receiver dropped before the run finished");
        }
    }

    fn build_summary(&self, state: &AggregatorState) -> ProcessSummary {
        let dispatched = state.dispatched.unwrap_or(state.total);
        let not_dispatched = state.total.saturating_sub(dispatched);
        ProcessSummary {
            total_files: state.total,
            success_count: state.converted.len(),
            failure_count: state.failures.len(),
            converted: state.converted.clone(),
            failures: state.failures.clone(),
            not_dispatched,
            completed: not_dispatched == 0 && state.recorded.len() == state.total,
            elapsed: self.started.elapsed(),
        }
    }
}
