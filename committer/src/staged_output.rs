//! [`StagedOutputEnumerator`] lists the files a finalized output directory contributes to the
//! import. Only files directly under the directory whose name carries the output prefix
//! ([`OUTPUT_FILE_PREFIX`]) are part of the output; markers such as `_SUCCESS`, hidden files and
//! anything inside sub-directories are skipped.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::{Error, FileMeta, LoadResult, StorageHandler};

/// Name prefix shared by all files the tasks of a job write as output.
pub const OUTPUT_FILE_PREFIX: &str = "part-";

/// Ordered locations of the staged output files of one commit attempt. Built fresh on every
/// attempt and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFileSet(Vec<Url>);

impl SourceFileSet {
    pub fn new(uris: impl IntoIterator<Item = Url>) -> Self {
        Self(uris.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Url] {
        &self.0
    }
}

impl IntoIterator for SourceFileSet {
    type Item = Url;
    type IntoIter = std::vec::IntoIter<Url>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Returns true if a file with this name is part of a job's output.
pub fn is_output_file(name: &str) -> bool {
    name.starts_with(OUTPUT_FILE_PREFIX)
}

/// Lists the staged output of a job. Must only be used on a directory the delegate commit
/// protocol has finalized; listing earlier may see partial task output.
#[derive(Clone)]
pub struct StagedOutputEnumerator {
    storage: Arc<dyn StorageHandler>,
}

impl StagedOutputEnumerator {
    pub fn new(storage: Arc<dyn StorageHandler>) -> Self {
        Self { storage }
    }

    /// The output files directly under `output_dir`, in lexicographic order.
    ///
    /// A missing directory yields [`Error::FileNotFound`]. An existing directory without output
    /// files, empty or not, yields an empty set.
    pub fn enumerate(&self, output_dir: &Url) -> LoadResult<SourceFileSet> {
        let listing = self.storage.list_dir(output_dir)?;
        if listing.is_empty() {
            if !self.storage.dir_exists(output_dir)? {
                return Err(Error::file_not_found(output_dir));
            }
            debug!("{output_dir} exists but is empty");
            return Ok(SourceFileSet::default());
        }
        if !listing.subdirs.is_empty() {
            debug!(
                "skipping {} sub-directories of {output_dir}",
                listing.subdirs.len()
            );
        }

        let mut files = listing.files;
        files.sort_unstable();
        let (output, skipped): (Vec<FileMeta>, Vec<FileMeta>) = files
            .into_iter()
            .partition(|file| file.file_name().is_some_and(is_output_file));
        for file in &skipped {
            debug!("skipping non-output file {}", file.location);
        }
        Ok(SourceFileSet::new(output.into_iter().map(|file| file.location)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::DirListing;

    /// Serves a fixed listing for one directory, which exists even without entries.
    struct FixedListing {
        dir: Url,
        listing: DirListing,
        lists: Mutex<u32>,
    }

    impl FixedListing {
        fn new(dir: &str, files: &[&str], subdirs: &[&str]) -> Arc<Self> {
            let dir = Url::parse(dir).unwrap();
            let listing = DirListing {
                files: files
                    .iter()
                    .map(|name| FileMeta::new(dir.join(name).unwrap(), 0, 1))
                    .collect(),
                subdirs: subdirs.iter().map(|name| dir.join(name).unwrap()).collect(),
            };
            Arc::new(Self {
                dir,
                listing,
                lists: Mutex::new(0),
            })
        }
    }

    impl StorageHandler for FixedListing {
        fn list_dir(&self, dir: &Url) -> LoadResult<DirListing> {
            *self.lists.lock().unwrap() += 1;
            if *dir == self.dir {
                Ok(self.listing.clone())
            } else {
                Ok(DirListing::default())
            }
        }

        fn dir_exists(&self, dir: &Url) -> LoadResult<bool> {
            Ok(*dir == self.dir)
        }

        fn head(&self, path: &Url) -> LoadResult<FileMeta> {
            Err(Error::file_not_found(path))
        }

        fn put(&self, _path: &Url, _data: Bytes, _overwrite: bool) -> LoadResult<()> {
            Err(Error::generic("read only"))
        }

        fn delete_dir(&self, _dir: &Url) -> LoadResult<usize> {
            Err(Error::generic("read only"))
        }
    }

    fn names(files: &SourceFileSet) -> Vec<String> {
        files
            .iter()
            .map(|url| url.path_segments().unwrap().next_back().unwrap().to_string())
            .collect()
    }

    #[test]
    fn keeps_only_output_files_in_order() {
        let storage = FixedListing::new(
            "gs://bucket/out/",
            &[
                "part-r-00002.avro",
                "_SUCCESS",
                "part-r-00000.avro",
                ".part-r-00001.avro.crc",
                "part-r-00001.avro",
                "manifest.json",
            ],
            &["_temporary/"],
        );
        let enumerator = StagedOutputEnumerator::new(storage.clone());
        let files = enumerator
            .enumerate(&Url::parse("gs://bucket/out/").unwrap())
            .unwrap();
        assert_eq!(
            names(&files),
            ["part-r-00000.avro", "part-r-00001.avro", "part-r-00002.avro"]
        );
        assert_eq!(
            files.as_slice()[0].as_str(),
            "gs://bucket/out/part-r-00000.avro"
        );
        assert_eq!(*storage.lists.lock().unwrap(), 1);
    }

    #[test]
    fn directory_with_only_markers_is_empty_set() {
        let storage = FixedListing::new("memory:///out/", &["_SUCCESS"], &[]);
        let files = StagedOutputEnumerator::new(storage)
            .enumerate(&Url::parse("memory:///out/").unwrap())
            .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn existing_empty_directory_is_empty_set() {
        let storage = FixedListing::new("file:///tmp/out/", &[], &[]);
        let files = StagedOutputEnumerator::new(storage.clone())
            .enumerate(&Url::parse("file:///tmp/out/").unwrap())
            .unwrap();
        assert!(files.is_empty());
        assert_eq!(*storage.lists.lock().unwrap(), 1);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let storage = FixedListing::new("memory:///out/", &["part-0"], &[]);
        let err = StagedOutputEnumerator::new(storage)
            .enumerate(&Url::parse("memory:///elsewhere/").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(dir) if dir == "memory:///elsewhere/"));
    }

    #[test]
    fn output_file_name_convention() {
        assert!(is_output_file("part-00000"));
        assert!(is_output_file("part-m-00003.json"));
        assert!(!is_output_file("_SUCCESS"));
        assert!(!is_output_file("_temporary"));
        assert!(!is_output_file(".part-00000.crc"));
        assert!(!is_output_file("data-00000.avro"));
    }
}
