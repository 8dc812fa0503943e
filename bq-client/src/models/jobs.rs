use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A BigQuery job resource. Only the parts relevant to load jobs are modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_reference: JobReference,
    pub configuration: JobConfiguration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<JobStatistics>,
}

impl Job {
    /// A load job to submit. Status and statistics are filled in by the server.
    pub fn load(job_reference: JobReference, load: JobConfigurationLoad) -> Self {
        Self {
            job_reference,
            configuration: JobConfiguration {
                load: Some(load),
                labels: None,
            },
            status: None,
            statistics: None,
        }
    }

    pub fn state(&self) -> Option<JobState> {
        self.status.as_ref().map(|status| status.state)
    }

    pub fn is_done(&self) -> bool {
        self.state() == Some(JobState::Done)
    }

    /// The error that made a finished job fail. A done job without one succeeded, even if
    /// `status.errors` lists non-fatal errors.
    pub fn error_result(&self) -> Option<&ErrorProto> {
        self.status.as_ref()?.error_result.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl JobReference {
    pub fn new(project_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            job_id: job_id.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<JobConfigurationLoad>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationLoad {
    /// Always serialized, even when empty.
    #[serde(default)]
    pub source_uris: Vec<String>,
    pub destination_table: TableReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_disposition: Option<String>,
}

impl JobConfigurationLoad {
    pub fn new(destination_table: TableReference, source_uris: Vec<String>) -> Self {
        Self {
            source_uris,
            destination_table,
            schema: None,
            source_format: None,
            write_disposition: None,
            create_disposition: None,
        }
    }

    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_source_format(mut self, source_format: impl Into<String>) -> Self {
        self.source_format = Some(source_format.into());
        self
    }

    pub fn with_write_disposition(mut self, write_disposition: impl Into<String>) -> Self {
        self.write_disposition = Some(write_disposition.into());
        self
    }

    pub fn with_create_disposition(mut self, create_disposition: impl Into<String>) -> Self {
        self.create_disposition = Some(create_disposition.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableReference {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_result: Option<ErrorProto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorProto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Job statistics. BigQuery encodes 64-bit integers as JSON strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadStatistics>,
}

fn millis_as_datetime(millis: Option<&String>) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp_millis(millis?.parse().ok()?)
}

impl JobStatistics {
    pub fn creation_time_as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        millis_as_datetime(self.creation_time.as_ref())
    }

    pub fn start_time_as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        millis_as_datetime(self.start_time.as_ref())
    }

    pub fn end_time_as_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        millis_as_datetime(self.end_time.as_ref())
    }

    /// Time between the job starting and ending, if it did both.
    pub fn run_time(&self) -> Option<chrono::Duration> {
        Some(self.end_time_as_datetime()? - self.start_time_as_datetime()?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_files: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file_bytes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_rows: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bad_records: Option<String>,
}

impl LoadStatistics {
    pub fn output_rows(&self) -> Option<u64> {
        self.output_rows.as_deref()?.parse().ok()
    }

    pub fn input_files(&self) -> Option<u64> {
        self.input_files.as_deref()?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn load_job_serializes_camel_case() {
        let job = Job::load(
            JobReference::new("proj", "load_1").with_location("EU"),
            JobConfigurationLoad::new(TableReference::new("proj", "ds", "tbl"), vec![])
                .with_source_format("NEWLINE_DELIMITED_JSON")
                .with_write_disposition("WRITE_TRUNCATE")
                .with_create_disposition("CREATE_IF_NEEDED"),
        );
        assert_eq!(
            serde_json::to_value(&job).unwrap(),
            json!({
                "jobReference": {"projectId": "proj", "jobId": "load_1", "location": "EU"},
                "configuration": {
                    "load": {
                        "sourceUris": [],
                        "destinationTable": {"projectId": "proj", "datasetId": "ds", "tableId": "tbl"},
                        "sourceFormat": "NEWLINE_DELIMITED_JSON",
                        "writeDisposition": "WRITE_TRUNCATE",
                        "createDisposition": "CREATE_IF_NEEDED"
                    }
                }
            })
        );
    }

    #[test]
    fn finished_job_deserializes() {
        let job: Job = serde_json::from_value(json!({
            "kind": "bigquery#job",
            "id": "proj:EU.load_1",
            "jobReference": {"projectId": "proj", "jobId": "load_1", "location": "EU"},
            "configuration": {
                "jobType": "LOAD",
                "load": {
                    "sourceUris": ["gs://bucket/out/part-00000"],
                    "destinationTable": {"projectId": "proj", "datasetId": "ds", "tableId": "tbl"}
                }
            },
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "invalid", "message": "Error while reading data"},
                "errors": [{"reason": "invalid", "location": "gs://bucket/out/part-00000"}]
            },
            "statistics": {
                "creationTime": "1760745600000",
                "startTime": "1760745601000",
                "endTime": "1760745631500",
                "load": {"inputFiles": "1", "outputRows": "0"}
            }
        }))
        .unwrap();

        assert!(job.is_done());
        assert_eq!(
            job.error_result().and_then(|e| e.reason.as_deref()),
            Some("invalid")
        );
        let statistics = job.statistics.unwrap();
        assert_eq!(
            statistics.run_time(),
            Some(chrono::Duration::milliseconds(30_500))
        );
        assert_eq!(statistics.load.unwrap().input_files(), Some(1));
    }

    #[test]
    fn running_job_has_no_error() {
        let job: Job = serde_json::from_value(json!({
            "jobReference": {"projectId": "proj", "jobId": "load_2"},
            "configuration": {},
            "status": {"state": "RUNNING"}
        }))
        .unwrap();
        assert_eq!(job.state(), Some(JobState::Running));
        assert!(!job.is_done());
        assert!(job.error_result().is_none());
    }
}
