pub use crate::client::{run_job, wait_for_job, BigQueryClient, BigQueryJobsClient, WaitOptions};
pub use crate::config::ClientConfig;
pub use crate::error::{Error, Result};
pub use crate::models::jobs::{
    Job, JobConfigurationLoad, JobReference, JobState, TableFieldSchema, TableReference,
    TableSchema,
};
