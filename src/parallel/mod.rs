//! Bounded parallel execution of conversions

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use crate::discovery::FileTask;
use crate::error::{ConvertError, FailureReason, Result};
use crate::processing::{ConversionRequest, Converter};

pub mod aggregator;
pub mod cancel;
pub mod progress;

pub use aggregator::*;
pub use cancel::*;
pub use progress::*;

/// Terminal result for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Success { input: PathBuf, output: PathBuf },
    Failure { input: PathBuf, reason: FailureReason },
}

impl ConversionOutcome {
    pub fn input(&self) -> &Path {
        match self {
            Self::Success { input, .. } | Self::Failure { input, .. } => input,
        }
    }

    fn from_result(input: PathBuf, result: std::result::Result<PathBuf, FailureReason>) -> Self {
        match result {
            Ok(output) => Self::Success { input, output },
            Err(reason) => Self::Failure { input, reason },
        }
    }
}

/// Runs a converter over many files with at most `workers` in flight
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    file_timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ConvertError::config("worker count must be at least 1"));
        }

        Ok(Self {
            workers,
            file_timeout: None,
        })
    }

    /// Give up on a single file after `timeout`
    pub fn with_file_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.file_timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Convert every task and return the settled summary.
    ///
    /// Raising `stop` halts dispatch; files already being converted finish
    /// and are recorded, and the summary is marked incomplete.
    pub async fn run(
        &self,
        tasks: Vec<FileTask>,
        converter: Arc<dyn Converter>,
        request: Arc<ConversionRequest>,
        observer: Arc<dyn ProgressObserver>,
        stop: &StopSignal,
    ) -> ProcessSummary {
        let total = tasks.len();
        info!(
            "Starting conversion of {} files with {} workers",
            total, self.workers
        );
        observer.on_event(ProgressEvent::Started { total_files: total });

        let (aggregator, mut done) = ResultAggregator::new(total, observer);
        let aggregator = Arc::new(aggregator);
        let semaphore = Arc::new(Semaphore::new(self.workers));

        let mut handles = Vec::with_capacity(total);
        for (index, task) in tasks.into_iter().enumerate() {
            if stop.is_cancelled() {
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            // A stop may land while we were waiting for the slot
            if stop.is_cancelled() {
                break;
            }

            let input = task.path().to_path_buf();
            let handle = tokio::spawn(run_task(
                index,
                task,
                Arc::clone(&converter),
                Arc::clone(&request),
                Arc::clone(&aggregator),
                self.file_timeout,
                permit,
            ));
            handles.push((input, handle));
        }

        let dispatched = handles.len();
        if dispatched < total {
            warn!(
                "Stopped: dispatched {} of {} files, waiting for in-flight conversions",
                dispatched, total
            );
        }
        aggregator.seal(dispatched);

        let (inputs, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = futures::future::join_all(handles).await;
        for (index, (input, result)) in inputs.into_iter().zip(results).enumerate() {
            if let Err(e) = result {
                // The converter's own panics are caught inside the task; this
                // only fires if recording itself blew up.
                error!("Worker for {:?} failed: {}", input, e);
                if !aggregator.has_recorded(index) {
                    aggregator.record(index, ConversionOutcome::Failure {
                        input,
                        reason: FailureReason::Panicked {
                            message: e.to_string(),
                        },
                    });
                }
            }
        }

        // Every worker has returned, so the summary is either sent or never will be
        match done.try_recv() {
            Ok(summary) => summary,
            Err(_) => {
                error!("Run ended without a settled summary, reporting current state");
                aggregator.snapshot()
            }
        }
    }
}

async fn run_task(
    index: usize,
    task: FileTask,
    converter: Arc<dyn Converter>,
    request: Arc<ConversionRequest>,
    aggregator: Arc<ResultAggregator>,
    file_timeout: Option<Duration>,
    permit: OwnedSemaphorePermit,
) {
    let input = task.into_path();
    debug!("Dispatching {:?}", input);

    let mut handle = tokio::task::spawn_blocking({
        let input = input.clone();
        move || converter.convert(&input, &request)
    });

    let joined = match file_timeout {
        None => (&mut handle).await,
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("Conversion of {:?} timed out after {:?}", input, limit);
                aggregator.record(index, ConversionOutcome::Failure {
                    input: input.clone(),
                    reason: FailureReason::Timeout {
                        seconds: limit.as_secs(),
                    },
                });

                // Blocking work cannot be interrupted. Keep the slot until it
                // ends and throw away whatever it produced.
                if let Ok(Ok(late_output)) = handle.await {
                    if let Err(e) = tokio::fs::remove_file(&late_output).await {
                        warn!("Failed to remove late output {:?}: {}", late_output, e);
                    }
                }
                drop(permit);
                return;
            }
        },
    };
    drop(permit);

    let outcome = match joined {
        Ok(result) => ConversionOutcome::from_result(input, result),
        Err(join_error) => {
            let message = panic_message(join_error);
            error!("Converter panicked on {:?}: {}", input, message);
            ConversionOutcome::Failure {
                input,
                reason: FailureReason::Panicked { message },
            }
        }
    };
    aggregator.record(index, outcome);
}

fn panic_message(error: tokio::task::JoinError) -> String {
    if error.is_cancelled() {
        return "task cancelled".to_string();
    }

    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
