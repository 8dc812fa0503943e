//! The `protocol` module provides the [`CommitProtocol`] trait: the job-level commit protocol the
//! [`IndirectOutputCommitter`] delegates to for the output directory itself. The delegate decides
//! what it means for the output of all tasks to be durably materialized ("finalized") in the
//! output directory; the committer only starts enumerating and importing once the delegate's
//! [`commit_job`] returned successfully.
//!
//! Task-level commit logic is out of scope here. Whatever the tasks did, by the time
//! [`commit_job`] is called the delegate must be able to finalize the directory on its own.
//!
//! For output directories on an object store the [`FileSystemCommitProtocol`] can be used.
//!
//! [`IndirectOutputCommitter`]: crate::output_committer::IndirectOutputCommitter
//! [`commit_job`]: CommitProtocol::commit_job

use crate::job::{JobContext, JobState};
use crate::LoadResult;

mod filesystem;

pub use filesystem::{FileSystemCommitProtocol, PENDING_MARKER, SUCCESS_MARKER, TEMPORARY_DIR};

/// Job-level setup, commit and abort of an output directory.
///
/// Errors returned from [`commit_job`] are surfaced by the committer unchanged, so
/// implementations should return errors that describe the failure on their own.
///
/// [`commit_job`]: CommitProtocol::commit_job
pub trait CommitProtocol: Send + Sync {
    /// Prepare the output directory before any task runs. Does nothing by default.
    fn setup_job(&self, _context: &JobContext) -> LoadResult<()> {
        Ok(())
    }

    /// Finalize the output directory. On success, every file directly under it is part of the
    /// job's output.
    fn commit_job(&self, context: &JobContext) -> LoadResult<()>;

    /// Discard pending output after the job ended in `state` ([`JobState::Failed`] or
    /// [`JobState::Killed`]).
    fn abort_job(&self, context: &JobContext, state: JobState) -> LoadResult<()>;
}
