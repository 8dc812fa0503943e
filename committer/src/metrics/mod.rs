//! Metrics collection for commit and abort attempts.
//!
//! Every call to [`commit_job`] or [`abort_job`] is assigned a unique [`MetricId`] when it
//! starts, and all events emitted for that attempt carry it, so a reporter can correlate the
//! phases of one attempt.
//!
//! # Example: a reporter that logs failed commits
//!
//! ```
//! use load_committer::metrics::{MetricEvent, MetricsReporter};
//!
//! #[derive(Debug)]
//! struct FailureLogger;
//!
//! impl MetricsReporter for FailureLogger {
//!     fn report(&self, event: MetricEvent) {
//!         if let MetricEvent::CommitFailed { operation_id, phase, duration } = event {
//!             eprintln!("commit {operation_id} failed after {phase} ({duration:?})");
//!         }
//!     }
//! }
//! ```
//!
//! # Storage metrics
//!
//! The [`ObjectStoreStorageHandler`] emits `StorageListCompleted` and `StorageDeleteCompleted`
//! when given a reporter. These are not tied to a commit attempt.
//!
//! [`commit_job`]: crate::output_committer::IndirectOutputCommitter::commit_job
//! [`abort_job`]: crate::output_committer::IndirectOutputCommitter::abort_job
//! [`ObjectStoreStorageHandler`]: crate::storage::ObjectStoreStorageHandler

mod events;
mod reporter;

pub use events::{MetricEvent, MetricId};
pub use reporter::MetricsReporter;
