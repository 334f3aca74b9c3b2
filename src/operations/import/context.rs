//! Session context: cancellation and progress reporting
//!
//! One context object threaded through every stage call, so the pipeline
//! runs identically under a UI, the CLI, or headless in tests.

use crate::operations::import::error::ImportError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One progress record, pushed to the sink on every unit completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportProgress {
    /// Monotonic 0–100 across the whole session
    pub percent: f32,
    pub current_file: Option<String>,
    pub files_processed: u64,
    pub files_total: u64,
    pub bytes_processed: u64,
    pub bytes_total: u64,
    pub duplicates_found: u64,
    pub errors_found: u64,
}

pub trait ProgressSink: Send + Sync {
    fn update(&self, progress: &ImportProgress);
}

struct NoopSink;

impl ProgressSink for NoopSink {
    fn update(&self, _progress: &ImportProgress) {}
}

/// Forwards progress records over an unbounded channel; the receiving side
/// (UI, CLI progress bar) drains at its own pace.
pub struct ChannelSink(pub mpsc::UnboundedSender<ImportProgress>);

impl ProgressSink for ChannelSink {
    fn update(&self, progress: &ImportProgress) {
        // Receiver gone means nobody is watching; not an error
        let _ = self.0.send(progress.clone());
    }
}

#[derive(Clone)]
pub struct ImportContext {
    cancel: CancellationToken,
    sink: Arc<dyn ProgressSink>,
}

impl ImportContext {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            sink: Arc::new(NoopSink),
        }
    }

    pub fn with_sink(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            sink,
        }
    }

    /// Token handed to callers that may cancel the session
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Checked before each file's unit of work starts
    pub fn check_cancelled(&self) -> Result<(), ImportError> {
        if self.is_cancelled() {
            Err(ImportError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn emit(&self, progress: &ImportProgress) {
        self.sink.update(progress);
    }
}

impl Default for ImportContext {
    fn default() -> Self {
        Self::new()
    }
}
