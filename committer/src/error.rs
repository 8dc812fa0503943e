//! Definitions of errors that the committer can encounter

use url::Url;

use crate::output_committer::CommitPhase;

/// A [`std::result::Result`] that has the committer [`Error`] as the error variant
pub type LoadResult<T, E = Error> = std::result::Result<T, E>;

/// All the types of errors that the committer can run into
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error that doesn't fit any of the other categories
    #[error("Generic load committer error: {0}")]
    Generic(String),

    /// An IO error from the local filesystem
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// An error talking to the object store
    #[error(transparent)]
    ObjectStore(object_store::Error),

    /// A path could not be turned into an object store path
    #[error("Object store path error: {0}")]
    ObjectStorePath(#[from] object_store::path::Error),

    /// A file (or directory) that was expected to exist does not
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// A file that was expected not to exist does
    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    /// Unable to parse a url
    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A required job configuration key is absent or blank
    #[error("Missing required configuration key '{0}'")]
    MissingConfiguration(String),

    /// A job configuration key holds a value that cannot be used
    #[error("Invalid value '{value}' for configuration key '{key}'")]
    InvalidConfiguration { key: String, value: String },

    /// The configured table schema could not be parsed or is malformed
    #[error("Invalid table schema: {0}")]
    InvalidSchema(String),

    /// The delegate commit protocol failed to finalize the output
    #[error("Delegate commit failed: {0}")]
    DelegateCommit(String),

    /// The delegate commit protocol failed to discard pending output
    #[error("Delegate abort failed: {0}")]
    DelegateAbort(String),

    /// The bulk import of the staged output failed or was interrupted. The staged files were
    /// left in place.
    #[error("Failed to import staged output into {table}: {source}")]
    Import {
        table: String,
        #[source]
        source: Box<Error>,
    },

    /// Waiting for an import to reach a terminal state was interrupted. The outcome of the
    /// import is unknown.
    #[error("Interrupted while waiting for import: {0}")]
    Interrupted(String),

    /// The remote import job reached a terminal state with errors
    #[error("Import job {job_id} finished with errors: {message}")]
    ImportJobFailed { job_id: String, message: String },

    /// Deleting the output directory failed. On the commit path the import already succeeded,
    /// so the table data is safe but staged files remain.
    #[error("Failed to clean up output directory {location}: {source}")]
    Cleanup {
        location: Url,
        #[source]
        source: Box<Error>,
    },

    /// A commit step was invoked out of order
    #[error("Cannot {operation} in commit phase {actual}, expected phase {expected}")]
    InvalidPhase {
        operation: &'static str,
        expected: CommitPhase,
        actual: CommitPhase,
    },

    /// A background task could not be joined
    #[error("Background task failed: {0}")]
    JoinFailure(String),
}

// Convenience constructors for Error types that take a String argument
impl Error {
    pub fn generic(msg: impl ToString) -> Self {
        Self::Generic(msg.to_string())
    }

    pub fn file_not_found(path: impl ToString) -> Self {
        Self::FileNotFound(path.to_string())
    }

    pub fn missing_configuration(key: impl ToString) -> Self {
        Self::MissingConfiguration(key.to_string())
    }

    pub fn invalid_configuration(key: impl ToString, value: impl ToString) -> Self {
        Self::InvalidConfiguration {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn invalid_schema(msg: impl ToString) -> Self {
        Self::InvalidSchema(msg.to_string())
    }

    pub fn delegate_commit(msg: impl ToString) -> Self {
        Self::DelegateCommit(msg.to_string())
    }

    pub fn delegate_abort(msg: impl ToString) -> Self {
        Self::DelegateAbort(msg.to_string())
    }

    pub fn interrupted(msg: impl ToString) -> Self {
        Self::Interrupted(msg.to_string())
    }

    pub fn import(table: impl ToString, source: Error) -> Self {
        Self::Import {
            table: table.to_string(),
            source: Box::new(source),
        }
    }

    pub fn cleanup(location: Url, source: Error) -> Self {
        Self::Cleanup {
            location,
            source: Box::new(source),
        }
    }

    pub fn join_failure(msg: impl ToString) -> Self {
        Self::JoinFailure(msg.to_string())
    }

    /// True for errors that mean a file or directory does not exist, looking through import and
    /// cleanup wrappers.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::FileNotFound(_) => true,
            Self::Import { source, .. } | Self::Cleanup { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<object_store::Error> for Error {
    fn from(value: object_store::Error) -> Self {
        match value {
            object_store::Error::NotFound { path, .. } => Self::FileNotFound(path),
            object_store::Error::AlreadyExists { path, .. } => Self::FileAlreadyExists(path),
            err => Self::ObjectStore(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidSchema(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected_through_wrappers() {
        let missing = Error::file_not_found("memory:///out/");
        assert!(missing.is_not_found());

        let wrapped = Error::import("p:d.t", Error::file_not_found("memory:///out/"));
        assert!(wrapped.is_not_found());

        let other = Error::import("p:d.t", Error::interrupted("cancelled"));
        assert!(!other.is_not_found());
    }

    #[test]
    fn object_store_not_found_maps_to_file_not_found() {
        let err: Error = object_store::Error::NotFound {
            path: "out/_SUCCESS".to_string(),
            source: "missing".into(),
        }
        .into();
        assert!(matches!(err, Error::FileNotFound(path) if path == "out/_SUCCESS"));
    }

    #[test]
    fn import_error_keeps_cause() {
        let err = Error::import("proj:ds.tbl", Error::interrupted("job cancelled"));
        assert_eq!(
            err.to_string(),
            "Failed to import staged output into proj:ds.tbl: Interrupted while waiting for import: job cancelled"
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("Interrupted while waiting for import: job cancelled")
        );
    }
}
