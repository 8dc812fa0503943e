//! The boundary to the service that bulk-loads staged files into the target table.

use crate::staged_output::SourceFileSet;
use crate::table::{FileFormat, TableIdentity, TableSchema, WriteDisposition};
use crate::LoadResult;

/// A single bulk-load of `source_uris` into `table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// Project that runs (and is billed for) the import job.
    pub project_id: String,
    pub table: TableIdentity,
    /// `None` keeps the table's existing schema.
    pub schema: Option<TableSchema>,
    pub file_format: FileFormat,
    pub write_disposition: WriteDisposition,
    /// May be empty: a job that produced no output still imports, so that e.g.
    /// [`WriteDisposition::WriteTruncate`] empties the table.
    pub source_uris: SourceFileSet,
    /// Return only once the import reached a terminal state.
    pub wait_for_completion: bool,
}

/// Executes imports on behalf of the [`IndirectOutputCommitter`].
///
/// The committer relies on [`import`] being all-or-nothing from the table's point of view:
/// either every listed source file is reflected in the table or none is. An implementation that
/// cannot guarantee this makes a successful commit untrustworthy.
///
/// Implementations own any retry policy. When `wait_for_completion` is set, [`import`] must not
/// return `Ok` before the import succeeded; if waiting is cut short, return
/// [`Error::Interrupted`](crate::Error::Interrupted).
///
/// [`IndirectOutputCommitter`]: crate::output_committer::IndirectOutputCommitter
/// [`import`]: ImportExecutor::import
pub trait ImportExecutor: Send + Sync {
    fn import(&self, request: ImportRequest) -> LoadResult<()>;
}
