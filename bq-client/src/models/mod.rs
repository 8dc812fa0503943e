pub mod jobs;

pub use jobs::{
    ErrorProto, Job, JobConfiguration, JobConfigurationLoad, JobReference, JobState, JobStatistics,
    JobStatus, LoadStatistics, TableFieldSchema, TableReference, TableSchema,
};
