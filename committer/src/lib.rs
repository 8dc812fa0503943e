//! # load_committer
//!
//! An output committer for batch jobs whose final destination is a table rather than a
//! directory. Tasks write their output files into a staging (output) directory under the control
//! of a delegate [`CommitProtocol`]. When the job commits, the [`IndirectOutputCommitter`]:
//!
//! 1. lets the delegate finalize the output directory,
//! 2. enumerates the finalized output files ([`StagedOutputEnumerator`]),
//! 3. asks an [`ImportExecutor`] to bulk-load all of them into the target table as a single
//!    import, waiting for it to finish, and
//! 4. deletes the output directory.
//!
//! Aborting a job lets the delegate discard its pending output and then always deletes the
//! output directory. No import ever happens on the abort path.
//!
//! The committer itself holds no transaction across the two systems. Its guarantees come from
//! strict sequencing: each step starts only after the previous one has completed successfully,
//! and a failed import leaves the staged files in place so the job can be inspected or
//! re-submitted. See [`output_committer`] for the full failure semantics.
//!
//! All storage access goes through the [`StorageHandler`] trait. The
//! [`ObjectStoreStorageHandler`](storage::ObjectStoreStorageHandler) implements it on top of any
//! [`object_store`] backend.
//!
//! [`CommitProtocol`]: protocol::CommitProtocol
//! [`IndirectOutputCommitter`]: output_committer::IndirectOutputCommitter
//! [`StagedOutputEnumerator`]: staged_output::StagedOutputEnumerator
//! [`ImportExecutor`]: import::ImportExecutor

#![warn(
    unreachable_pub,
    trivial_numeric_casts,
    unused_extern_crates,
    rust_2018_idioms,
    rust_2021_compatibility,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]

use std::cmp::Ordering;

use bytes::Bytes;
use url::Url;

pub mod config;
pub mod error;
pub mod import;
pub mod job;
pub mod metrics;
pub mod output_committer;
pub mod protocol;
pub mod staged_output;
pub mod storage;
pub mod table;

pub use config::LoadConfiguration;
pub use error::{Error, LoadResult};
pub use import::{ImportExecutor, ImportRequest};
pub use job::{Configuration, JobContext, JobId, JobState};
pub use output_committer::{CommitOutcome, CommitPhase, IndirectOutputCommitter, JobCommit};
pub use protocol::{CommitProtocol, FileSystemCommitProtocol};
pub use staged_output::{SourceFileSet, StagedOutputEnumerator};
pub use table::{
    FieldMode, FileFormat, TableFieldSchema, TableIdentity, TableSchema, WriteDisposition,
};

/// The metadata that describes an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// The fully qualified path to the object
    pub location: Url,
    /// The last modified time as milliseconds since unix epoch
    pub last_modified: i64,
    /// The size in bytes of the object
    pub size: u64,
}

impl FileMeta {
    /// Create a new instance of `FileMeta`
    pub fn new(location: Url, last_modified: i64, size: u64) -> Self {
        Self {
            location,
            last_modified,
            size,
        }
    }

    /// The final path segment of the location, i.e. the file name.
    pub fn file_name(&self) -> Option<&str> {
        self.location
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
    }
}

impl Ord for FileMeta {
    fn cmp(&self, other: &Self) -> Ordering {
        self.location.cmp(&other.location)
    }
}

impl PartialOrd for FileMeta {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The entries found directly under a directory. Nothing below the first level is listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    /// Files directly under the directory, sorted by location.
    pub files: Vec<FileMeta>,
    /// Sub-directories directly under the directory, sorted, each with a trailing `/`.
    pub subdirs: Vec<Url>,
}

impl DirListing {
    /// True if the directory contained neither files nor sub-directories. This does not tell an
    /// empty directory from a missing one; use [`StorageHandler::dir_exists`] for that.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.subdirs.is_empty()
    }
}

/// Provides the storage operations the committer needs. Paths are fully qualified URLs;
/// directory URLs end with `/`.
///
/// Implementations are synchronous. The default [`ObjectStoreStorageHandler`] bridges to the
/// async [`object_store`] API through a [`TaskExecutor`].
///
/// [`ObjectStoreStorageHandler`]: storage::ObjectStoreStorageHandler
/// [`TaskExecutor`]: storage::executor::TaskExecutor
pub trait StorageHandler: Send + Sync {
    /// List the files and sub-directories directly under `dir`. Never recurses.
    fn list_dir(&self, dir: &Url) -> LoadResult<DirListing>;

    /// Whether `dir` exists. Object stores have no directories, so by default a directory
    /// exists while anything at all is stored below it. Backends with real directories
    /// override this so that an existing empty directory is reported as present.
    fn dir_exists(&self, dir: &Url) -> LoadResult<bool> {
        Ok(!self.list_dir(dir)?.is_empty())
    }

    /// Fetch the metadata of a single file. A missing file is [`Error::FileNotFound`].
    fn head(&self, path: &Url) -> LoadResult<FileMeta>;

    /// Write `data` to `path`. When `overwrite` is false an existing file is
    /// [`Error::FileAlreadyExists`].
    fn put(&self, path: &Url, data: Bytes, overwrite: bool) -> LoadResult<()>;

    /// Recursively delete everything under `dir`, returning the number of files removed.
    /// Afterwards `dir` no longer exists, including on backends with real directories. A
    /// missing directory is not an error and deletes nothing.
    fn delete_dir(&self, dir: &Url) -> LoadResult<usize>;
}
