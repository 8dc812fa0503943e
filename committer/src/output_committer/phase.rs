use std::time::Instant;

use strum::Display as StrumDisplay;
use tracing::{debug, info, warn};

use super::IndirectOutputCommitter;
use crate::config::LoadConfiguration;
use crate::job::JobContext;
use crate::metrics::{MetricEvent, MetricId};
use crate::staged_output::StagedOutputEnumerator;
use crate::{Error, LoadResult};

/// The last step of a [`JobCommit`] that completed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum CommitPhase {
    NotStarted,
    /// The delegate finalized the output directory.
    DelegateCommitted,
    /// The staged output was imported into the table.
    Imported,
    /// The output directory was deleted.
    CleanedUp,
}

/// One commit attempt of a job, driven one phase at a time:
///
/// `NotStarted → DelegateCommitted → Imported → CleanedUp`
///
/// Each step checks that the previous phase was reached and fails with
/// [`Error::InvalidPhase`] otherwise. A failed step leaves the phase unchanged.
/// [`IndirectOutputCommitter::commit_job`] runs all steps in order; driving them by hand is
/// mostly useful to observe the state in between.
pub struct JobCommit<'a> {
    committer: &'a IndirectOutputCommitter,
    context: &'a JobContext,
    operation_id: MetricId,
    phase: CommitPhase,
    load_config: Option<LoadConfiguration>,
}

impl<'a> JobCommit<'a> {
    pub(crate) fn new(committer: &'a IndirectOutputCommitter, context: &'a JobContext) -> Self {
        Self {
            committer,
            context,
            operation_id: MetricId::new(),
            phase: CommitPhase::NotStarted,
            load_config: None,
        }
    }

    pub fn phase(&self) -> CommitPhase {
        self.phase
    }

    /// Identifies this attempt in the [`MetricEvent`]s it emits.
    pub fn operation_id(&self) -> MetricId {
        self.operation_id
    }

    /// The settings the import was made with, once [`import`](Self::import) resolved them.
    pub fn load_configuration(&self) -> Option<&LoadConfiguration> {
        self.load_config.as_ref()
    }

    fn require(&self, operation: &'static str, expected: CommitPhase) -> LoadResult<()> {
        if self.phase != expected {
            return Err(Error::InvalidPhase {
                operation,
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn report(&self, event: MetricEvent) {
        if let Some(reporter) = &self.committer.reporter {
            reporter.report(event);
        }
    }

    /// Let the delegate finalize the output directory. Its error is returned unchanged.
    pub fn commit_delegate(&mut self) -> LoadResult<()> {
        self.require("commit the delegate", CommitPhase::NotStarted)?;
        let start = Instant::now();
        self.committer.delegate.commit_job(self.context)?;
        self.report(MetricEvent::DelegateCommitCompleted {
            operation_id: self.operation_id,
            duration: start.elapsed(),
        });
        self.phase = CommitPhase::DelegateCommitted;
        Ok(())
    }

    /// Resolve the load settings, enumerate the finalized output and import all of it as a
    /// single request, waiting for completion. Returns the number of files imported.
    ///
    /// A failure of the import itself is wrapped in [`Error::Import`]; configuration and
    /// enumeration errors are returned as they are. Staged files are never touched here.
    pub fn import(&mut self) -> LoadResult<usize> {
        self.require("import", CommitPhase::DelegateCommitted)?;
        let load_config = LoadConfiguration::try_from_configuration(self.context.configuration())?;
        let enumerator = StagedOutputEnumerator::new(self.committer.storage.clone());
        let source_uris = enumerator.enumerate(load_config.output_dir())?;
        let num_files = source_uris.len();
        if source_uris.is_empty() {
            debug!(
                "job {} staged no output files in {}",
                self.context.job_id(),
                load_config.output_dir()
            );
        }

        let table = load_config.table().to_string();
        info!(
            "importing {num_files} files into {table} with {}",
            load_config.write_disposition()
        );
        let start = Instant::now();
        let result = self
            .committer
            .importer
            .import(load_config.import_request(source_uris));
        let duration = start.elapsed();

        if let Err(err) = result {
            warn!("import into {table} failed, keeping staged output: {err}");
            self.report(MetricEvent::ImportFailed {
                operation_id: self.operation_id,
                duration,
                num_files: num_files as u64,
            });
            return Err(Error::import(table, err));
        }
        self.report(MetricEvent::ImportCompleted {
            operation_id: self.operation_id,
            duration,
            num_files: num_files as u64,
        });
        self.load_config = Some(load_config);
        self.phase = CommitPhase::Imported;
        Ok(num_files)
    }

    /// Recursively delete the output directory. Returns the number of files deleted.
    pub fn cleanup(&mut self) -> LoadResult<usize> {
        self.require("clean up", CommitPhase::Imported)?;
        let output_dir = match &self.load_config {
            Some(load_config) => load_config.output_dir().clone(),
            None => return Err(Error::generic("imported without a load configuration")),
        };
        let start = Instant::now();
        let deleted = self
            .committer
            .storage
            .delete_dir(&output_dir)
            .map_err(|err| Error::cleanup(output_dir.clone(), err))?;
        self.report(MetricEvent::CleanupCompleted {
            operation_id: self.operation_id,
            duration: start.elapsed(),
            num_files_deleted: deleted as u64,
        });
        debug!("deleted {deleted} files under {output_dir}");
        self.phase = CommitPhase::CleanedUp;
        Ok(deleted)
    }

    /// Run every remaining step in order, stopping at the first failure.
    pub fn run_to_completion(&mut self) -> LoadResult<()> {
        if self.phase == CommitPhase::NotStarted {
            self.commit_delegate()?;
        }
        if self.phase == CommitPhase::DelegateCommitted {
            self.import()?;
        }
        if self.phase == CommitPhase::Imported {
            self.cleanup()?;
        }
        Ok(())
    }
}
