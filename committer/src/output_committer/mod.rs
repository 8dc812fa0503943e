//! The [`IndirectOutputCommitter`] commits a job whose output ends up in a table rather than in
//! the output directory the tasks wrote to.
//!
//! # Commit
//!
//! [`commit_job`] runs these steps strictly in order, each only after the previous one succeeded:
//!
//! 1. the delegate [`CommitProtocol`] finalizes the output directory. Its error is returned
//!    unchanged and nothing else happens.
//! 2. the load settings are resolved from the job configuration ([`LoadConfiguration`]).
//! 3. the files directly under the output directory are enumerated. An empty set is not an
//!    error and is still imported, so that e.g. `WRITE_TRUNCATE` empties the table.
//! 4. the [`ImportExecutor`] loads all files as one import and waits for it to finish. A failure
//!    (or interruption) is returned as [`Error::Import`] and the staged files are kept.
//! 5. the output directory is deleted. A failure here is returned as [`Error::Cleanup`]; the
//!    table already holds the data.
//!
//! The committer never retries. A commit is not idempotent at the import layer: committing the
//! same output twice appends it twice unless the write disposition says otherwise. After a
//! successful commit the output directory is gone, so a second commit fails with a not-found
//! error instead of importing again.
//!
//! # Abort
//!
//! [`abort_job`] lets the delegate discard pending output and then deletes the output
//! directory, whether or not the delegate succeeded. An absent directory is not an error. No
//! import happens on this path. Aborting a job after it committed is a caller error.
//!
//! [`commit_job`]: IndirectOutputCommitter::commit_job
//! [`abort_job`]: IndirectOutputCommitter::abort_job
//! [`CommitProtocol`]: crate::protocol::CommitProtocol
//! [`ImportExecutor`]: crate::import::ImportExecutor
//! [`LoadConfiguration`]: crate::config::LoadConfiguration

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, instrument, warn};

use crate::config::output_dir;
use crate::import::ImportExecutor;
use crate::job::{JobContext, JobState};
use crate::metrics::{MetricEvent, MetricId, MetricsReporter};
use crate::protocol::CommitProtocol;
use crate::{Error, LoadResult, StorageHandler};

mod phase;

pub use phase::{CommitPhase, JobCommit};


/// Commits a job by importing its finalized output into a table. See the
/// [module documentation](self) for the exact sequence and failure semantics.
pub struct IndirectOutputCommitter {
    delegate: Box<dyn CommitProtocol>,
    importer: Box<dyn ImportExecutor>,
    storage: Arc<dyn StorageHandler>,
    reporter: Option<Arc<dyn MetricsReporter>>,
}

impl IndirectOutputCommitter {
    pub fn new(
        delegate: Box<dyn CommitProtocol>,
        importer: Box<dyn ImportExecutor>,
        storage: Arc<dyn StorageHandler>,
    ) -> Self {
        Self {
            delegate,
            importer,
            storage,
            reporter: None,
        }
    }

    pub fn with_metrics_reporter(mut self, reporter: Arc<dyn MetricsReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    fn report(&self, event: MetricEvent) {
        if let Some(reporter) = &self.reporter {
            reporter.report(event);
        }
    }

    /// Set up the job through the delegate.
    pub fn setup_job(&self, context: &JobContext) -> LoadResult<()> {
        self.delegate.setup_job(context)
    }

    /// Start a commit attempt without running any of its steps.
    pub fn begin_commit<'a>(&'a self, context: &'a JobContext) -> JobCommit<'a> {
        JobCommit::new(self, context)
    }

    /// Commit the job: delegate commit, enumeration, import, cleanup.
    #[instrument(skip_all, fields(job_id = %context.job_id()))]
    pub fn commit_job(&self, context: &JobContext) -> LoadResult<()> {
        let start = Instant::now();
        let mut commit = self.begin_commit(context);
        match commit.run_to_completion() {
            Ok(()) => {
                info!("committed job {}", context.job_id());
                self.report(MetricEvent::CommitCompleted {
                    operation_id: commit.operation_id(),
                    total_duration: start.elapsed(),
                });
                Ok(())
            }
            Err(err) => {
                error!(
                    "commit of job {} failed after phase {}: {err}",
                    context.job_id(),
                    commit.phase()
                );
                self.report(MetricEvent::CommitFailed {
                    operation_id: commit.operation_id(),
                    phase: commit.phase(),
                    duration: start.elapsed(),
                });
                Err(err)
            }
        }
    }

    /// Abort the job, which ended in `state` ([`JobState::Failed`] or [`JobState::Killed`]).
    ///
    /// The output directory is deleted even if the delegate fails. The delegate's error takes
    /// precedence over a cleanup error; a cleanup error alone is returned as
    /// [`Error::Cleanup`].
    #[instrument(skip_all, fields(job_id = %context.job_id(), %state))]
    pub fn abort_job(&self, context: &JobContext, state: JobState) -> LoadResult<()> {
        if !state.is_abort_state() {
            return Err(Error::generic(format!(
                "Cannot abort job {} with state {state}",
                context.job_id()
            )));
        }
        let operation_id = MetricId::new();
        let start = Instant::now();

        let delegate_result = self.delegate.abort_job(context, state);
        if let Err(err) = &delegate_result {
            warn!("delegate abort of job {} failed: {err}", context.job_id());
        }
        let cleanup_result = self.cleanup_output(context);

        self.report(MetricEvent::AbortCompleted {
            operation_id,
            duration: start.elapsed(),
            cleaned_up: cleanup_result.is_ok(),
        });

        match (delegate_result, cleanup_result) {
            (Ok(()), Ok(deleted)) => {
                info!(
                    "aborted job {} ({deleted} files cleaned up)",
                    context.job_id()
                );
                Ok(())
            }
            (Ok(()), Err(cleanup_err)) => {
                warn!("{cleanup_err}");
                Err(cleanup_err)
            }
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(cleanup_err)) => {
                warn!("{cleanup_err}");
                Err(err)
            }
        }
    }

    fn cleanup_output(&self, context: &JobContext) -> LoadResult<usize> {
        let output_dir = output_dir(context.configuration())?;
        self.storage
            .delete_dir(&output_dir)
            .map_err(|err| Error::cleanup(output_dir, err))
    }
}

/// The outcome of a commit or abort attempt as a single value.
#[derive(Debug)]
#[must_use]
pub enum CommitOutcome {
    /// The import succeeded and the output directory was deleted.
    Committed,
    /// The abort finished, including the cleanup of the output directory.
    AbortedCleanly,
    /// The attempt failed with this cause.
    Failed(Error),
}

impl CommitOutcome {
    pub fn from_commit(result: LoadResult<()>) -> Self {
        match result {
            Ok(()) => CommitOutcome::Committed,
            Err(err) => CommitOutcome::Failed(err),
        }
    }

    pub fn from_abort(result: LoadResult<()>) -> Self {
        match result {
            Ok(()) => CommitOutcome::AbortedCleanly,
            Err(err) => CommitOutcome::Failed(err),
        }
    }

    /// Returns true if the commit was successful.
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed)
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            CommitOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_result(self) -> LoadResult<()> {
        match self {
            CommitOutcome::Committed | CommitOutcome::AbortedCleanly => Ok(()),
            CommitOutcome::Failed(err) => Err(err),
        }
    }
}
