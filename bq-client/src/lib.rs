//! An async client for the BigQuery v2 jobs API, limited to what load jobs need: submitting a
//! job, fetching its state, and polling it until it is done.
//!
//! ```no_run
//! use bq_client::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let config = ClientConfig::build("ya29.token").build()?;
//! let client = BigQueryClient::new(config)?;
//! let load = JobConfigurationLoad::new(
//!     TableReference::new("my-project", "sales", "orders"),
//!     vec!["gs://staging/job-1/part-00000".to_string()],
//! )
//! .with_source_format("NEWLINE_DELIMITED_JSON");
//! let job = Job::load(JobReference::new("my-project", "load_job_1"), load);
//! let done = run_job(&client, job, Some(client.wait_options())).await?;
//! println!("loaded {:?} rows", done.statistics.and_then(|s| s.load?.output_rows()));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod prelude;

pub use client::{BigQueryClient, BigQueryJobsClient, WaitOptions};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use http::USER_AGENT;
