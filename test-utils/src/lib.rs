//! A number of utilities useful for testing the committer that we want to use in multiple crates

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use load_committer::config::{
    OUTPUT_DIR_KEY, OUTPUT_TABLE_DATASET_KEY, OUTPUT_TABLE_ID_KEY, OUTPUT_TABLE_PROJECT_KEY,
    OUTPUT_WRITE_DISPOSITION_KEY,
};
use load_committer::storage::ObjectStoreStorageHandler;
use load_committer::{
    CommitProtocol, Configuration, DirListing, Error, FileMeta, ImportExecutor, ImportRequest,
    JobContext, JobState, LoadResult, StorageHandler, TableIdentity, WriteDisposition,
};
use object_store::memory::InMemory;
use url::Url;

/// A call observed by one of the recording stand-ins, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DelegateSetup,
    DelegateCommit,
    DelegateAbort(JobState),
    List(Url),
    Import {
        num_files: usize,
        write_disposition: WriteDisposition,
    },
    DeleteDir(Url),
}

/// Shared, ordered log of [`Call`]s.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|call| pred(call)).count()
    }

    pub fn imports(&self) -> usize {
        self.count(|call| matches!(call, Call::Import { .. }))
    }

    pub fn deletes(&self) -> usize {
        self.count(|call| matches!(call, Call::DeleteDir(_)))
    }
}

/// A delegate that records its calls, optionally forwards them to a real protocol, and can be
/// told to fail.
pub struct RecordingProtocol {
    log: CallLog,
    inner: Option<Box<dyn CommitProtocol>>,
    fail_commit: bool,
    fail_abort: bool,
}

impl RecordingProtocol {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            inner: None,
            fail_commit: false,
            fail_abort: false,
        }
    }

    pub fn wrapping(mut self, inner: impl CommitProtocol + 'static) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_abort(mut self) -> Self {
        self.fail_abort = true;
        self
    }
}

impl CommitProtocol for RecordingProtocol {
    fn setup_job(&self, context: &JobContext) -> LoadResult<()> {
        self.log.push(Call::DelegateSetup);
        match &self.inner {
            Some(inner) => inner.setup_job(context),
            None => Ok(()),
        }
    }

    fn commit_job(&self, context: &JobContext) -> LoadResult<()> {
        self.log.push(Call::DelegateCommit);
        if self.fail_commit {
            return Err(Error::delegate_commit("a task attempt never reported back"));
        }
        match &self.inner {
            Some(inner) => inner.commit_job(context),
            None => Ok(()),
        }
    }

    fn abort_job(&self, context: &JobContext, state: JobState) -> LoadResult<()> {
        self.log.push(Call::DelegateAbort(state));
        if self.fail_abort {
            return Err(Error::delegate_abort("staging directory is unreachable"));
        }
        match &self.inner {
            Some(inner) => inner.abort_job(context, state),
            None => Ok(()),
        }
    }
}

/// How the [`InMemoryTableImporter`] misbehaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImportFault {
    #[default]
    None,
    /// The import job finished with errors.
    Fail,
    /// Waiting for the import job was cut short.
    Interrupt,
}

/// An importer that keeps one "table" per identity in memory. Each imported source file becomes
/// one row holding its URI. Write dispositions are honored, and an import either applies all of
/// its files or none.
#[derive(Default)]
pub struct InMemoryTableImporter {
    log: CallLog,
    fault: ImportFault,
    tables: Arc<Mutex<HashMap<String, Vec<String>>>>,
}

impl InMemoryTableImporter {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn with_fault(mut self, fault: ImportFault) -> Self {
        self.fault = fault;
        self
    }

    /// A handle to the table contents that stays valid after the importer is moved into a
    /// committer.
    pub fn tables(&self) -> TableContents {
        TableContents(self.tables.clone())
    }
}

impl ImportExecutor for InMemoryTableImporter {
    fn import(&self, request: ImportRequest) -> LoadResult<()> {
        self.log.push(Call::Import {
            num_files: request.source_uris.len(),
            write_disposition: request.write_disposition,
        });
        match self.fault {
            ImportFault::None => {}
            ImportFault::Fail => {
                return Err(Error::ImportJobFailed {
                    job_id: "load-0001".to_string(),
                    message: "schema mismatch in source file".to_string(),
                })
            }
            ImportFault::Interrupt => {
                return Err(Error::interrupted("stopped waiting for load-0001"))
            }
        }

        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(request.table.to_string()).or_default();
        let incoming = request.source_uris.iter().map(Url::to_string);
        match request.write_disposition {
            WriteDisposition::WriteAppend => rows.extend(incoming),
            WriteDisposition::WriteTruncate => *rows = incoming.collect(),
            WriteDisposition::WriteEmpty if rows.is_empty() => rows.extend(incoming),
            WriteDisposition::WriteEmpty => {
                return Err(Error::ImportJobFailed {
                    job_id: "load-0001".to_string(),
                    message: format!("table {} is not empty", request.table),
                })
            }
        }
        Ok(())
    }
}

/// Read access to the tables of an [`InMemoryTableImporter`].
#[derive(Debug, Clone)]
pub struct TableContents(Arc<Mutex<HashMap<String, Vec<String>>>>);

impl TableContents {
    pub fn rows(&self, table: &TableIdentity) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .get(&table.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// Seed a table with existing rows.
    pub fn insert(&self, table: &TableIdentity, rows: &[&str]) {
        self.0.lock().unwrap().insert(
            table.to_string(),
            rows.iter().map(|row| row.to_string()).collect(),
        );
    }
}

/// Wraps a [`StorageHandler`], recording listings and recursive deletes. Deletes can be made to
/// fail.
pub struct RecordingStorage {
    inner: Arc<dyn StorageHandler>,
    log: CallLog,
    fail_delete: bool,
}

impl RecordingStorage {
    pub fn new(inner: Arc<dyn StorageHandler>, log: CallLog) -> Self {
        Self {
            inner,
            log,
            fail_delete: false,
        }
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }
}

impl StorageHandler for RecordingStorage {
    fn list_dir(&self, dir: &Url) -> LoadResult<DirListing> {
        self.log.push(Call::List(dir.clone()));
        self.inner.list_dir(dir)
    }

    fn dir_exists(&self, dir: &Url) -> LoadResult<bool> {
        self.inner.dir_exists(dir)
    }

    fn head(&self, path: &Url) -> LoadResult<FileMeta> {
        self.inner.head(path)
    }

    fn put(&self, path: &Url, data: Bytes, overwrite: bool) -> LoadResult<()> {
        self.inner.put(path, data, overwrite)
    }

    fn delete_dir(&self, dir: &Url) -> LoadResult<usize> {
        self.log.push(Call::DeleteDir(dir.clone()));
        if self.fail_delete {
            return Err(Error::generic(format!("access denied deleting {dir}")));
        }
        self.inner.delete_dir(dir)
    }
}

/// An in-memory store, a storage handler over it, and an output directory named after the test.
pub fn storage_setup(name: &str) -> (Arc<InMemory>, Arc<dyn StorageHandler>, Url) {
    let store = Arc::new(InMemory::new());
    let storage = ObjectStoreStorageHandler::try_new(store.clone()).unwrap();
    let output_dir = Url::parse(&format!("memory:///staging/{name}/")).unwrap();
    (store, Arc::new(storage), output_dir)
}

/// The target table every test loads into unless it says otherwise.
pub fn test_table() -> TableIdentity {
    TableIdentity::new("analytics-prod", "events", "daily_rollup")
}

/// A running job configured to load `output_dir` into `table` with `write_disposition`.
pub fn job_context(
    job_id: &str,
    output_dir: &Url,
    table: &TableIdentity,
    write_disposition: WriteDisposition,
) -> JobContext {
    let configuration = Configuration::new()
        .with(OUTPUT_TABLE_PROJECT_KEY, table.project_id())
        .with(OUTPUT_TABLE_DATASET_KEY, table.dataset_id())
        .with(OUTPUT_TABLE_ID_KEY, table.table_id())
        .with(OUTPUT_WRITE_DISPOSITION_KEY, write_disposition.as_ref())
        .with(OUTPUT_DIR_KEY, output_dir.as_str());
    JobContext::new(job_id, configuration)
}

/// Write `names` (relative to `dir`) as small files.
pub fn stage_files(storage: &dyn StorageHandler, dir: &Url, names: &[&str]) {
    for name in names {
        storage
            .put(&dir.join(name).unwrap(), Bytes::from("{\"id\":1}\n"), true)
            .unwrap();
    }
}

/// Every file under `dir`, recursively, relative to `dir`, sorted.
pub fn files_under(storage: &dyn StorageHandler, dir: &Url) -> Vec<String> {
    let mut pending = vec![dir.clone()];
    let mut files = vec![];
    while let Some(current) = pending.pop() {
        let listing = storage.list_dir(&current).unwrap();
        files.extend(
            listing
                .files
                .iter()
                .map(|file| file.location.as_str()[dir.as_str().len()..].to_string()),
        );
        pending.extend(listing.subdirs);
    }
    files.sort();
    files
}

pub fn assert_result_error_with_message<T, E: ToString>(res: Result<T, E>, message: &str) {
    match res {
        Ok(_) => panic!("Expected error, but got Ok result"),
        Err(error) => {
            let error_str = error.to_string();
            assert!(
                error_str.contains(message),
                "Error message does not contain the expected message.\nExpected message:\t{message}\nActual message:\t\t{error_str}"
            );
        }
    }
}
