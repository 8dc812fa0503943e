//! Resolution of the job [`Configuration`] into the typed settings an import needs.
//!
//! | key | value | default |
//! |---|---|---|
//! | [`PROJECT_ID_KEY`] | project that runs the import job | the table's project |
//! | [`OUTPUT_TABLE_PROJECT_KEY`] | project of the target table | required |
//! | [`OUTPUT_TABLE_DATASET_KEY`] | dataset of the target table | required |
//! | [`OUTPUT_TABLE_ID_KEY`] | target table | required |
//! | [`OUTPUT_TABLE_SCHEMA_KEY`] | JSON array of `{name, type, mode}` | the table's existing schema |
//! | [`OUTPUT_FILE_FORMAT_KEY`] | a [`FileFormat`] tag | `NEWLINE_DELIMITED_JSON` |
//! | [`OUTPUT_WRITE_DISPOSITION_KEY`] | a [`WriteDisposition`] tag | `WRITE_APPEND` |
//! | [`OUTPUT_DIR_KEY`] | URL (or absolute path) of the output directory | required |

use std::path::Path;
use std::str::FromStr;

use url::Url;

use crate::import::ImportRequest;
use crate::job::Configuration;
use crate::staged_output::SourceFileSet;
use crate::table::{FileFormat, TableIdentity, TableSchema, WriteDisposition};
use crate::{Error, LoadResult};

pub const PROJECT_ID_KEY: &str = "load.project.id";
pub const OUTPUT_TABLE_PROJECT_KEY: &str = "load.output.table.project";
pub const OUTPUT_TABLE_DATASET_KEY: &str = "load.output.table.dataset";
pub const OUTPUT_TABLE_ID_KEY: &str = "load.output.table.id";
pub const OUTPUT_TABLE_SCHEMA_KEY: &str = "load.output.table.schema";
pub const OUTPUT_FILE_FORMAT_KEY: &str = "load.output.file.format";
pub const OUTPUT_WRITE_DISPOSITION_KEY: &str = "load.output.write.disposition";
pub const OUTPUT_DIR_KEY: &str = "load.output.dir";

/// Everything the committer reads from the job configuration, resolved once per commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadConfiguration {
    project_id: String,
    table: TableIdentity,
    schema: Option<TableSchema>,
    file_format: FileFormat,
    write_disposition: WriteDisposition,
    output_dir: Url,
}

impl LoadConfiguration {
    /// Settings for loading into `table` from `output_dir`, with the default format and
    /// disposition and the table's project running the import.
    pub fn new(table: TableIdentity, output_dir: Url) -> Self {
        Self {
            project_id: table.project_id().to_string(),
            table,
            schema: None,
            file_format: FileFormat::default(),
            write_disposition: WriteDisposition::default(),
            output_dir: as_directory(output_dir),
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_file_format(mut self, file_format: FileFormat) -> Self {
        self.file_format = file_format;
        self
    }

    pub fn with_write_disposition(mut self, write_disposition: WriteDisposition) -> Self {
        self.write_disposition = write_disposition;
        self
    }

    /// Resolve all settings from `conf`, failing on the first missing or invalid key.
    pub fn try_from_configuration(conf: &Configuration) -> LoadResult<Self> {
        let table = TableIdentity::new(
            required(conf, OUTPUT_TABLE_PROJECT_KEY)?,
            required(conf, OUTPUT_TABLE_DATASET_KEY)?,
            required(conf, OUTPUT_TABLE_ID_KEY)?,
        );
        let project_id = optional(conf, PROJECT_ID_KEY).unwrap_or(table.project_id());
        let schema = optional(conf, OUTPUT_TABLE_SCHEMA_KEY)
            .map(TableSchema::from_json)
            .transpose()?;

        Ok(Self {
            project_id: project_id.to_string(),
            schema,
            file_format: parse_or_default(conf, OUTPUT_FILE_FORMAT_KEY)?,
            write_disposition: parse_or_default(conf, OUTPUT_WRITE_DISPOSITION_KEY)?,
            output_dir: output_dir(conf)?,
            table,
        })
    }

    /// Write these settings into `conf` under the keys [`Self::try_from_configuration`] reads.
    pub fn apply_to(&self, conf: &mut Configuration) -> LoadResult<()> {
        conf.set(PROJECT_ID_KEY, &self.project_id)
            .set(OUTPUT_TABLE_PROJECT_KEY, self.table.project_id())
            .set(OUTPUT_TABLE_DATASET_KEY, self.table.dataset_id())
            .set(OUTPUT_TABLE_ID_KEY, self.table.table_id())
            .set(OUTPUT_FILE_FORMAT_KEY, self.file_format.as_ref())
            .set(OUTPUT_WRITE_DISPOSITION_KEY, self.write_disposition.as_ref())
            .set(OUTPUT_DIR_KEY, self.output_dir.as_str());
        match &self.schema {
            Some(schema) => {
                conf.set(OUTPUT_TABLE_SCHEMA_KEY, schema.to_json()?);
            }
            None => {
                conf.remove(OUTPUT_TABLE_SCHEMA_KEY);
            }
        }
        Ok(())
    }

    /// The import of `source_uris` these settings describe. Always waits for completion.
    pub fn import_request(&self, source_uris: SourceFileSet) -> ImportRequest {
        ImportRequest {
            project_id: self.project_id.clone(),
            table: self.table.clone(),
            schema: self.schema.clone(),
            file_format: self.file_format,
            write_disposition: self.write_disposition,
            source_uris,
            wait_for_completion: true,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn table(&self) -> &TableIdentity {
        &self.table
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_ref()
    }

    pub fn file_format(&self) -> FileFormat {
        self.file_format
    }

    pub fn write_disposition(&self) -> WriteDisposition {
        self.write_disposition
    }

    pub fn output_dir(&self) -> &Url {
        &self.output_dir
    }
}

/// Resolve only the output directory. The abort path needs nothing else.
pub fn output_dir(conf: &Configuration) -> LoadResult<Url> {
    let value = required(conf, OUTPUT_DIR_KEY)?;
    let url = match Url::parse(value) {
        Ok(url) => url,
        // plain absolute paths are accepted for local output directories
        Err(url::ParseError::RelativeUrlWithoutBase) if Path::new(value).is_absolute() => {
            Url::from_directory_path(value)
                .map_err(|_| Error::invalid_configuration(OUTPUT_DIR_KEY, value))?
        }
        Err(_) => return Err(Error::invalid_configuration(OUTPUT_DIR_KEY, value)),
    };
    if url.cannot_be_a_base() {
        return Err(Error::invalid_configuration(OUTPUT_DIR_KEY, value));
    }
    Ok(as_directory(url))
}

fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn optional<'a>(conf: &'a Configuration, key: &str) -> Option<&'a str> {
    conf.get(key).map(str::trim).filter(|value| !value.is_empty())
}

fn required<'a>(conf: &'a Configuration, key: &str) -> LoadResult<&'a str> {
    optional(conf, key).ok_or_else(|| Error::missing_configuration(key))
}

fn parse_or_default<T: FromStr + Default>(conf: &Configuration, key: &str) -> LoadResult<T> {
    match optional(conf, key) {
        Some(value) => value
            .parse()
            .map_err(|_| Error::invalid_configuration(key, value)),
        None => Ok(T::default()),
    }
}
