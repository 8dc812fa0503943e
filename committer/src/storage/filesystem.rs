use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::TryStreamExt;
use itertools::Itertools;
use object_store::path::Path;
use object_store::{DynObjectStore, ListResult, PutMode, PutOptions};
use tracing::debug;
use url::Url;

use super::executor::{TaskExecutor, TokioBackgroundExecutor};
use crate::metrics::{MetricEvent, MetricsReporter};
use crate::{DirListing, Error, FileMeta, LoadResult, StorageHandler};

/// A [`StorageHandler`] over any [`object_store`] backend. URLs are mapped to store paths by
/// their path component, so the store must be rooted where the URL's path starts (the bucket
/// for cloud stores, `/` for [`LocalFileSystem::new`]).
///
/// `file://` directories are real directories: they exist while empty, and
/// [`delete_dir`](StorageHandler::delete_dir) removes them along with their contents.
///
/// [`LocalFileSystem::new`]: object_store::local::LocalFileSystem::new
#[derive(Debug)]
pub struct ObjectStoreStorageHandler<E: TaskExecutor> {
    inner: Arc<DynObjectStore>,
    task_executor: Arc<E>,
    reporter: Option<Arc<dyn MetricsReporter>>,
}

impl ObjectStoreStorageHandler<TokioBackgroundExecutor> {
    /// Create a handler that runs IO on its own [`TokioBackgroundExecutor`].
    pub fn try_new(store: Arc<DynObjectStore>) -> LoadResult<Self> {
        Ok(Self::new_with_executor(
            store,
            Arc::new(TokioBackgroundExecutor::try_new()?),
        ))
    }
}

impl<E: TaskExecutor> ObjectStoreStorageHandler<E> {
    pub fn new_with_executor(store: Arc<DynObjectStore>, task_executor: Arc<E>) -> Self {
        Self {
            inner: store,
            task_executor,
            reporter: None,
        }
    }

    pub fn with_metrics_reporter(mut self, reporter: Arc<dyn MetricsReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }
}

fn store_path(url: &Url) -> LoadResult<Path> {
    Ok(Path::from_url_path(url.path())?)
}

/// The local directory behind a `file://` URL.
fn local_dir(url: &Url) -> Option<PathBuf> {
    match url.scheme() {
        "file" => url.to_file_path().ok(),
        _ => None,
    }
}

fn location_url(base: &Url, path: &Path, is_dir: bool) -> Url {
    let mut location = base.clone();
    let suffix = if is_dir { "/" } else { "" };
    location.set_path(&format!("/{}{suffix}", path.as_ref()));
    location
}

async fn list_dir_impl(
    store: Arc<DynObjectStore>,
    dir: Url,
    reporter: Option<Arc<dyn MetricsReporter>>,
) -> LoadResult<DirListing> {
    let start = Instant::now();
    let prefix = store_path(&dir)?;

    let ListResult {
        common_prefixes,
        objects,
    } = match store.list_with_delimiter(Some(&prefix)).await {
        Ok(result) => result,
        Err(object_store::Error::NotFound { .. }) => ListResult {
            common_prefixes: vec![],
            objects: vec![],
        },
        Err(err) => return Err(err.into()),
    };

    // neither local nor every cloud listing is guaranteed to be sorted
    let files = objects
        .into_iter()
        .map(|meta| FileMeta {
            location: location_url(&dir, &meta.location, false),
            last_modified: meta.last_modified.timestamp_millis(),
            size: meta.size,
        })
        .sorted_unstable()
        .collect_vec();
    let subdirs = common_prefixes
        .iter()
        .map(|prefix| location_url(&dir, prefix, true))
        .sorted_unstable()
        .collect_vec();

    if let Some(r) = reporter {
        r.report(MetricEvent::StorageListCompleted {
            duration: start.elapsed(),
            num_files: files.len() as u64,
        });
    }
    Ok(DirListing { files, subdirs })
}

async fn dir_exists_impl(store: Arc<DynObjectStore>, dir: Url) -> LoadResult<bool> {
    if let Some(path) = local_dir(&dir) {
        return match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        };
    }
    let prefix = store_path(&dir)?;
    let mut objects = store.list(Some(&prefix));
    match objects.try_next().await {
        Ok(first) => Ok(first.is_some()),
        Err(object_store::Error::NotFound { .. }) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn delete_dir_impl(
    store: Arc<DynObjectStore>,
    dir: Url,
    reporter: Option<Arc<dyn MetricsReporter>>,
) -> LoadResult<usize> {
    let start = Instant::now();
    let prefix = store_path(&dir)?;
    if prefix.as_ref().is_empty() {
        return Err(Error::generic(format!(
            "Refusing to delete the root of the object store: '{dir}'"
        )));
    }

    let locations: Vec<Path> = match store
        .list(Some(&prefix))
        .map_ok(|meta| meta.location)
        .try_collect()
        .await
    {
        Ok(locations) => locations,
        Err(object_store::Error::NotFound { .. }) => vec![],
        Err(err) => return Err(err.into()),
    };

    for location in &locations {
        match store.delete(location).await {
            // a concurrent delete already removed it
            Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }
    }
    // deleting files leaves their (now empty) local directories behind
    if let Some(path) = local_dir(&dir) {
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    debug!("deleted {} files under {dir}", locations.len());

    if let Some(r) = reporter {
        r.report(MetricEvent::StorageDeleteCompleted {
            duration: start.elapsed(),
            num_files: locations.len() as u64,
        });
    }
    Ok(locations.len())
}

async fn head_impl(store: Arc<DynObjectStore>, url: Url) -> LoadResult<FileMeta> {
    let meta = match store.head(&store_path(&url)?).await {
        Ok(meta) => meta,
        Err(object_store::Error::NotFound { .. }) => return Err(Error::file_not_found(url)),
        Err(err) => return Err(err.into()),
    };
    Ok(FileMeta {
        location: url,
        last_modified: meta.last_modified.timestamp_millis(),
        size: meta.size,
    })
}

async fn put_impl(
    store: Arc<DynObjectStore>,
    url: Url,
    data: Bytes,
    overwrite: bool,
) -> LoadResult<()> {
    let path = store_path(&url)?;
    let mode = if overwrite {
        PutMode::Overwrite
    } else {
        PutMode::Create
    };
    match store
        .put_opts(&path, data.into(), PutOptions::from(mode))
        .await
    {
        Ok(_) => Ok(()),
        Err(object_store::Error::AlreadyExists { .. }) => Err(Error::FileAlreadyExists(url.into())),
        Err(err) => Err(err.into()),
    }
}

impl<E: TaskExecutor> StorageHandler for ObjectStoreStorageHandler<E> {
    fn list_dir(&self, dir: &Url) -> LoadResult<DirListing> {
        let future = list_dir_impl(self.inner.clone(), dir.clone(), self.reporter.clone());
        self.task_executor.block_on(future)?
    }

    fn dir_exists(&self, dir: &Url) -> LoadResult<bool> {
        let future = dir_exists_impl(self.inner.clone(), dir.clone());
        self.task_executor.block_on(future)?
    }

    fn head(&self, path: &Url) -> LoadResult<FileMeta> {
        let future = head_impl(self.inner.clone(), path.clone());
        self.task_executor.block_on(future)?
    }

    fn put(&self, path: &Url, data: Bytes, overwrite: bool) -> LoadResult<()> {
        let future = put_impl(self.inner.clone(), path.clone(), data, overwrite);
        self.task_executor.block_on(future)?
    }

    fn delete_dir(&self, dir: &Url) -> LoadResult<usize> {
        let future = delete_dir_impl(self.inner.clone(), dir.clone(), self.reporter.clone());
        self.task_executor.block_on(future)?
    }
}
