//! Progress reporting for batch runs
//!
//! Observers see zero or more [`ProgressEvent::FileFinished`] events between a
//! single `Started` and a single `Finished`. Nothing is emitted after
//! `Finished`. Observers cannot influence processing.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::debug;

use crate::parallel::{ConversionOutcome, ProcessSummary};

/// Progress event
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started {
        total_files: usize,
    },
    FileFinished {
        outcome: ConversionOutcome,
        /// Outcomes recorded so far, this one included
        finished: usize,
        total_files: usize,
    },
    Finished {
        summary: ProcessSummary,
    },
}

/// Receives progress events from a run
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: ProgressEvent) {}
}

/// Forwards events into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_event(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            debug!("Progress receiver dropped, event discarded");
        }
    }
}

/// Terminal progress bar
pub struct ProgressBarObserver {
    bar: ProgressBar,
    show_failures: bool,
}

impl ProgressBarObserver {
    pub fn new(show_failures: bool) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}, {eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));

        Self { bar, show_failures }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total_files } => {
                self.bar.set_length(total_files as u64);
                self.bar.set_position(0);
            }
            ProgressEvent::FileFinished { outcome, .. } => {
                let name = outcome
                    .input()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                if let ConversionOutcome::Failure { input, reason } = &outcome {
                    if self.show_failures {
                        self.bar
                            .println(format!("✗ {} ({})", input.display(), reason));
                    }
                }
                self.bar.set_message(name);
                self.bar.inc(1);
            }
            ProgressEvent::Finished { summary } => {
                let message = if summary.completed {
                    "Conversion complete"
                } else {
                    "Conversion stopped"
                };
                self.bar.finish_with_message(message);
            }
        }
    }
}

/// Human-readable throughput
pub fn speed_text(files: usize, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if files == 0 || secs <= 0.0 {
        return "Unknown".to_string();
    }

    let files_per_second = files as f64 / secs;
    if files_per_second >= 1.0 {
        format!("{:.1} files/sec", files_per_second)
    } else {
        format!("{:.1} sec/file", 1.0 / files_per_second)
    }
}
