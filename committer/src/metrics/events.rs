//! Metric event types.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

use crate::output_committer::CommitPhase;

/// Identifies one commit or abort attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricId(Uuid);

impl MetricId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MetricId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events emitted while committing or aborting a job, and by the default storage handler.
#[derive(Debug, Clone)]
pub enum MetricEvent {
    /// The delegate finalized the output directory.
    DelegateCommitCompleted {
        operation_id: MetricId,
        duration: Duration,
    },

    /// The import of the staged output succeeded.
    ImportCompleted {
        operation_id: MetricId,
        duration: Duration,
        num_files: u64,
    },

    /// The import failed or was interrupted; staged files were kept.
    ImportFailed {
        operation_id: MetricId,
        duration: Duration,
        num_files: u64,
    },

    /// The output directory was deleted.
    CleanupCompleted {
        operation_id: MetricId,
        duration: Duration,
        num_files_deleted: u64,
    },

    /// Every phase of a commit attempt succeeded.
    CommitCompleted {
        operation_id: MetricId,
        total_duration: Duration,
    },

    /// A commit attempt stopped. `phase` is the last phase that completed.
    CommitFailed {
        operation_id: MetricId,
        phase: CommitPhase,
        duration: Duration,
    },

    /// An abort attempt finished; `cleaned_up` is false if deleting the output failed.
    AbortCompleted {
        operation_id: MetricId,
        duration: Duration,
        cleaned_up: bool,
    },

    /// Storage list operation completed.
    StorageListCompleted { duration: Duration, num_files: u64 },

    /// Storage recursive delete completed.
    StorageDeleteCompleted { duration: Duration, num_files: u64 },
}

impl fmt::Display for MetricEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricEvent::DelegateCommitCompleted {
                operation_id,
                duration,
            } => write!(
                f,
                "DelegateCommitCompleted(id={operation_id}, duration={duration:?})"
            ),
            MetricEvent::ImportCompleted {
                operation_id,
                duration,
                num_files,
            } => write!(
                f,
                "ImportCompleted(id={operation_id}, duration={duration:?}, files={num_files})"
            ),
            MetricEvent::ImportFailed {
                operation_id,
                duration,
                num_files,
            } => write!(
                f,
                "ImportFailed(id={operation_id}, duration={duration:?}, files={num_files})"
            ),
            MetricEvent::CleanupCompleted {
                operation_id,
                duration,
                num_files_deleted,
            } => write!(
                f,
                "CleanupCompleted(id={operation_id}, duration={duration:?}, deleted={num_files_deleted})"
            ),
            MetricEvent::CommitCompleted {
                operation_id,
                total_duration,
            } => write!(
                f,
                "CommitCompleted(id={operation_id}, duration={total_duration:?})"
            ),
            MetricEvent::CommitFailed {
                operation_id,
                phase,
                duration,
            } => write!(
                f,
                "CommitFailed(id={operation_id}, phase={phase}, duration={duration:?})"
            ),
            MetricEvent::AbortCompleted {
                operation_id,
                duration,
                cleaned_up,
            } => write!(
                f,
                "AbortCompleted(id={operation_id}, duration={duration:?}, cleaned_up={cleaned_up})"
            ),
            MetricEvent::StorageListCompleted {
                duration,
                num_files,
            } => write!(
                f,
                "StorageListCompleted(duration={duration:?}, files={num_files})"
            ),
            MetricEvent::StorageDeleteCompleted {
                duration,
                num_files,
            } => write!(
                f,
                "StorageDeleteCompleted(duration={duration:?}, files={num_files})"
            ),
        }
    }
}
