//! [`BigQueryImportExecutor`] implements the committer's [`ImportExecutor`] with BigQuery load
//! jobs: every import is one load job over all staged files, and the executor polls it until it
//! is done.
//!
//! BigQuery applies a load job atomically, which is what the committer expects of an import:
//! either all source files end up in the table or none do.

use std::future::Future;
use std::sync::Arc;

use bq_client::models::jobs::{
    JobConfigurationLoad, TableFieldSchema as BqFieldSchema, TableReference,
    TableSchema as BqTableSchema,
};
use bq_client::prelude::{
    run_job, BigQueryClient, BigQueryJobsClient, Job, JobReference, WaitOptions,
};
use load_committer::{
    Error, ImportExecutor, ImportRequest, LoadResult, TableFieldSchema, TableSchema,
};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{info, instrument};
use uuid::Uuid;

/// Load jobs may create the destination table when a schema is given.
pub const CREATE_DISPOSITION: &str = "CREATE_IF_NEEDED";

/// Prefix of the job ids this executor generates, unless configured otherwise.
pub const DEFAULT_JOB_ID_PREFIX: &str = "load_committer_";

/// An [`ImportExecutor`] that runs each import as a BigQuery load job.
///
/// NOTE: the committer API is synchronous while the client is async. When `import` is called
/// from within a tokio runtime, that runtime must be multi-threaded, since the executor blocks
/// the calling worker with [`tokio::task::block_in_place`]. Outside of any runtime, a handle
/// must be supplied with [`with_runtime`](Self::with_runtime).
#[derive(Debug)]
pub struct BigQueryImportExecutor<C: BigQueryJobsClient = BigQueryClient> {
    client: Arc<C>,
    wait: WaitOptions,
    location: Option<String>,
    job_id_prefix: String,
    runtime: Option<Handle>,
}

impl BigQueryImportExecutor<BigQueryClient> {
    /// Create an executor that polls with the settings of the client's config.
    pub fn new(client: Arc<BigQueryClient>) -> Self {
        let wait = client.wait_options();
        Self::with_client(client, wait)
    }
}

impl<C: BigQueryJobsClient> BigQueryImportExecutor<C> {
    pub fn with_client(client: Arc<C>, wait: WaitOptions) -> Self {
        Self {
            client,
            wait,
            location: None,
            job_id_prefix: DEFAULT_JOB_ID_PREFIX.to_string(),
            runtime: None,
        }
    }

    /// Run load jobs in this location (e.g. `EU`) instead of the dataset's default.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_job_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.job_id_prefix = prefix.into();
        self
    }

    /// Runtime to drive the client on when `import` is called outside of any tokio runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    fn block_on<F: Future>(&self, future: F) -> LoadResult<F::Output> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                Err(Error::generic(
                    "BigQueryImportExecutor cannot block a current-thread tokio runtime",
                ))
            }
            Ok(handle) => Ok(tokio::task::block_in_place(|| handle.block_on(future))),
            Err(_) => match &self.runtime {
                Some(handle) => Ok(handle.block_on(future)),
                None => Err(Error::generic(
                    "BigQueryImportExecutor needs a tokio runtime: call it from within one or configure one with with_runtime",
                )),
            },
        }
    }
}

impl<C: BigQueryJobsClient> ImportExecutor for BigQueryImportExecutor<C> {
    #[instrument(skip_all, fields(table = %request.table, num_files = request.source_uris.len()))]
    fn import(&self, request: ImportRequest) -> LoadResult<()> {
        let job_id = format!("{}{}", self.job_id_prefix, Uuid::new_v4().simple());
        let mut reference = JobReference::new(request.project_id.as_str(), job_id.as_str());
        if let Some(location) = &self.location {
            reference = reference.with_location(location.as_str());
        }
        let job = Job::load(reference, load_job_configuration(&request));
        let wait = request.wait_for_completion.then_some(self.wait);

        let done = self
            .block_on(run_job(self.client.as_ref(), job, wait))?
            .map_err(import_error)?;

        let output_rows = done
            .statistics
            .as_ref()
            .and_then(|statistics| statistics.load.as_ref())
            .and_then(|load| load.output_rows());
        info!(
            "load job {job_id} into {} finished with state {:?} ({output_rows:?} rows)",
            request.table,
            done.state()
        );
        Ok(())
    }
}

/// The load job configuration for `request`. Source URIs are passed as they are, even when
/// there are none.
pub fn load_job_configuration(request: &ImportRequest) -> JobConfigurationLoad {
    let table = &request.table;
    let load = JobConfigurationLoad::new(
        TableReference::new(table.project_id(), table.dataset_id(), table.table_id()),
        request.source_uris.iter().map(|uri| uri.to_string()).collect(),
    )
    .with_source_format(request.file_format.as_ref())
    .with_write_disposition(request.write_disposition.as_ref())
    .with_create_disposition(CREATE_DISPOSITION);
    match &request.schema {
        Some(schema) => load.with_schema(table_schema(schema)),
        None => load,
    }
}

fn table_schema(schema: &TableSchema) -> BqTableSchema {
    BqTableSchema {
        fields: schema.fields.iter().map(field_schema).collect(),
    }
}

fn field_schema(field: &TableFieldSchema) -> BqFieldSchema {
    BqFieldSchema {
        name: field.name.clone(),
        field_type: field.field_type.clone(),
        mode: field.mode.map(|mode| mode.to_string()),
        fields: field.fields.iter().map(field_schema).collect(),
    }
}

fn import_error(err: bq_client::Error) -> Error {
    match err {
        bq_client::Error::JobFailed {
            job_id,
            reason,
            message,
        } => Error::ImportJobFailed {
            job_id,
            message: format!("{reason}: {message}"),
        },
        // the job may still finish, so its outcome is unknown
        bq_client::Error::Timeout { job_id, waited } => Error::interrupted(format!(
            "load job {job_id} was not done after {waited:?}"
        )),
        other => Error::generic(format!("BigQuery load job error: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use load_committer::{FieldMode, FileFormat, SourceFileSet, TableIdentity, WriteDisposition};
    use url::Url;

    use super::*;

    fn request(schema: Option<TableSchema>, uris: &[&str]) -> ImportRequest {
        ImportRequest {
            project_id: "billing-proj".to_string(),
            table: TableIdentity::new("data-proj", "sales", "orders"),
            schema,
            file_format: FileFormat::Parquet,
            write_disposition: WriteDisposition::WriteTruncate,
            source_uris: SourceFileSet::new(uris.iter().map(|uri| Url::parse(uri).unwrap())),
            wait_for_completion: true,
        }
    }

    #[test]
    fn maps_request_to_load_configuration() {
        let schema = TableSchema::new([
            TableFieldSchema::new("id", "INT64").with_mode(FieldMode::Required),
            TableFieldSchema::new("items", "RECORD")
                .with_mode(FieldMode::Repeated)
                .with_fields([TableFieldSchema::new("sku", "STRING")]),
        ])
        .unwrap();
        let load = load_job_configuration(&request(
            Some(schema),
            &["gs://staging/out/part-00000", "gs://staging/out/part-00001"],
        ));

        assert_eq!(
            load.destination_table,
            TableReference::new("data-proj", "sales", "orders")
        );
        assert_eq!(
            load.source_uris,
            ["gs://staging/out/part-00000", "gs://staging/out/part-00001"]
        );
        assert_eq!(load.source_format.as_deref(), Some("PARQUET"));
        assert_eq!(load.write_disposition.as_deref(), Some("WRITE_TRUNCATE"));
        assert_eq!(load.create_disposition.as_deref(), Some(CREATE_DISPOSITION));

        let fields = load.schema.unwrap().fields;
        assert_eq!(fields[0].mode.as_deref(), Some("REQUIRED"));
        assert_eq!(fields[1].mode.as_deref(), Some("REPEATED"));
        assert_eq!(fields[1].fields[0].name, "sku");
        assert_eq!(fields[1].fields[0].mode, None);
    }

    #[test]
    fn empty_source_set_is_kept() {
        let load = load_job_configuration(&request(None, &[]));
        assert!(load.source_uris.is_empty());
        assert!(load.schema.is_none());
    }

    #[test]
    fn client_errors_map_to_import_errors() {
        let err = import_error(bq_client::Error::JobFailed {
            job_id: "load_1".to_string(),
            reason: "invalid".to_string(),
            message: "bad row".to_string(),
        });
        assert!(matches!(
            err,
            Error::ImportJobFailed { job_id, message } if job_id == "load_1" && message == "invalid: bad row"
        ));

        let err = import_error(bq_client::Error::Timeout {
            job_id: "load_1".to_string(),
            waited: Duration::from_secs(60),
        });
        assert!(matches!(err, Error::Interrupted(_)));

        let err = import_error(bq_client::Error::AuthenticationFailed);
        assert!(matches!(err, Error::Generic(msg) if msg.contains("Authentication failed")));
    }
}
