use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};
use url::Url;

use super::CommitProtocol;
use crate::config::output_dir;
use crate::job::{JobContext, JobState};
use crate::{Error, LoadResult, StorageHandler};

/// Directory under the output directory that holds in-progress task output.
pub const TEMPORARY_DIR: &str = "_temporary/";
/// Marker written into [`TEMPORARY_DIR`] when the job is set up.
pub const PENDING_MARKER: &str = "_PENDING";
/// Marker written into the output directory once the job's output is finalized.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// A [`CommitProtocol`] that finalizes an output directory on object storage. The output
/// directory is read from [`OUTPUT_DIR_KEY`](crate::config::OUTPUT_DIR_KEY).
///
/// - `setup_job` writes `_temporary/_PENDING`.
/// - `commit_job` requires that pending marker, writes `_SUCCESS` and deletes `_temporary/`.
///   Committing a job that was never set up, or committing twice, is [`Error::FileNotFound`].
/// - `abort_job` deletes `_temporary/`.
pub struct FileSystemCommitProtocol {
    storage: Arc<dyn StorageHandler>,
}

impl FileSystemCommitProtocol {
    pub fn new(storage: Arc<dyn StorageHandler>) -> Self {
        Self { storage }
    }
}

fn temporary_dir(output_dir: &Url) -> LoadResult<Url> {
    Ok(output_dir.join(TEMPORARY_DIR)?)
}

impl CommitProtocol for FileSystemCommitProtocol {
    fn setup_job(&self, context: &JobContext) -> LoadResult<()> {
        let output_dir = output_dir(context.configuration())?;
        let pending = temporary_dir(&output_dir)?.join(PENDING_MARKER)?;
        self.storage.put(&pending, Bytes::new(), true)?;
        debug!("set up job {} in {output_dir}", context.job_id());
        Ok(())
    }

    fn commit_job(&self, context: &JobContext) -> LoadResult<()> {
        let output_dir = output_dir(context.configuration())?;
        let temporary = temporary_dir(&output_dir)?;
        let pending = temporary.join(PENDING_MARKER)?;
        match self.storage.head(&pending) {
            Ok(_) => {}
            Err(Error::FileNotFound(_)) => {
                return Err(Error::file_not_found(format!(
                    "{pending} (job {} was never set up or is already committed)",
                    context.job_id()
                )))
            }
            Err(err) => return Err(err),
        }
        self.storage
            .put(&output_dir.join(SUCCESS_MARKER)?, Bytes::new(), true)?;
        let deleted = self.storage.delete_dir(&temporary)?;
        info!(
            "finalized output of job {} in {output_dir} ({deleted} temporary files removed)",
            context.job_id()
        );
        Ok(())
    }

    fn abort_job(&self, context: &JobContext, state: JobState) -> LoadResult<()> {
        let output_dir = output_dir(context.configuration())?;
        let deleted = self.storage.delete_dir(&temporary_dir(&output_dir)?)?;
        info!(
            "discarded pending output of {state} job {} ({deleted} files)",
            context.job_id()
        );
        Ok(())
    }
}
