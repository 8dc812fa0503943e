use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{build_http_client, execute_with_retry, handle_response};
use crate::models::jobs::{Job, JobReference};

/// Trait for BigQuery jobs API operations.
///
/// Implementations of this trait are responsible for performing any necessary retries on transient
/// failures. Waiting for a job to finish is built on top of [`get_job`] by [`wait_for_job`].
///
/// [`get_job`]: BigQueryJobsClient::get_job
#[allow(async_fn_in_trait)]
pub trait BigQueryJobsClient: Send + Sync {
    /// Submit a job. The job id in its reference is chosen by the caller, which makes a
    /// resubmission of the same job detectable.
    async fn insert_job(&self, job: Job) -> Result<Job>;

    /// Fetch the current state of a job.
    async fn get_job(&self, reference: &JobReference) -> Result<Job>;
}

/// How long and how often to poll a job until it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl From<&ClientConfig> for WaitOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            max_wait: config.max_wait,
        }
    }
}

/// REST implementation of [BigQueryJobsClient].
#[derive(Debug, Clone)]
pub struct BigQueryClient {
    http_client: reqwest::Client,
    config: ClientConfig,
    base_url: Url,
}

impl BigQueryClient {
    /// Create a new client from [ClientConfig].
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(&config)?,
            base_url: config.base_url.clone(),
            config,
        })
    }

    /// Create from existing reqwest Client.
    pub fn with_http_client(http_client: reqwest::Client, config: ClientConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The poll settings from this client's config.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::from(&self.config)
    }

    fn jobs_url(&self, project_id: &str, job_id: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                Error::InvalidConfiguration(format!(
                    "base url '{}' cannot be a base",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty().extend(["projects", project_id, "jobs"]);
            if let Some(job_id) = job_id {
                segments.push(job_id);
            }
        }
        Ok(url)
    }
}

impl BigQueryJobsClient for BigQueryClient {
    #[instrument(skip(self, job), fields(job_id = %job.job_reference.job_id))]
    async fn insert_job(&self, job: Job) -> Result<Job> {
        let url = self.jobs_url(&job.job_reference.project_id, None)?;
        let response = execute_with_retry(&self.config, || {
            self.http_client.post(url.clone()).json(&job).send()
        })
        .await?;

        match response.status() {
            // an earlier attempt went through but its response was lost
            StatusCode::CONFLICT => {
                info!(
                    "job {} already exists, fetching it instead",
                    job.job_reference.job_id
                );
                self.get_job(&job.job_reference).await
            }
            _ => handle_response(response).await,
        }
    }

    #[instrument(skip(self))]
    async fn get_job(&self, reference: &JobReference) -> Result<Job> {
        let mut url = self.jobs_url(&reference.project_id, Some(&reference.job_id))?;
        if let Some(location) = &reference.location {
            url.query_pairs_mut().append_pair("location", location);
        }
        let response =
            execute_with_retry(&self.config, || self.http_client.get(url.clone()).send()).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::JobNotFound(reference.job_id.clone())),
            _ => handle_response(response).await,
        }
    }
}

/// Turn a finished job into an error if it failed.
fn check_finished(job: Job) -> Result<Job> {
    match job.error_result() {
        Some(error) => Err(Error::JobFailed {
            job_id: job.job_reference.job_id.clone(),
            reason: error.reason.clone().unwrap_or_else(|| "unknown".to_string()),
            message: error.message.clone().unwrap_or_default(),
        }),
        None => Ok(job),
    }
}

/// Poll the job every `poll_interval` until it is `DONE`. A done job that carries an
/// `errorResult` is [`Error::JobFailed`]; not being done after `max_wait` is
/// [`Error::Timeout`]. Polls failing with a [transient](Error::is_transient) error are
/// retried until then; any other error ends the wait.
pub async fn wait_for_job<C>(
    client: &C,
    reference: &JobReference,
    options: WaitOptions,
) -> Result<Job>
where
    C: BigQueryJobsClient,
{
    let start = tokio::time::Instant::now();
    loop {
        match client.get_job(reference).await {
            Ok(job) if job.is_done() => return check_finished(job),
            Ok(job) => debug!(
                "job {} is {:?}, polling again in {:?}",
                reference.job_id,
                job.state(),
                options.poll_interval
            ),
            // the job keeps running server-side, so a failed poll is not its outcome
            Err(err) if err.is_transient() => {
                warn!("polling job {} failed, will poll again: {err}", reference.job_id)
            }
            Err(err) => return Err(err),
        }
        let waited = start.elapsed();
        if waited >= options.max_wait {
            return Err(Error::Timeout {
                job_id: reference.job_id.clone(),
                waited,
            });
        }
        tokio::time::sleep(options.poll_interval.min(options.max_wait - waited)).await;
    }
}

/// Submit `job` and, when `wait` is given, wait for it to finish. A job that is already done
/// when submitted (e.g. rejected during validation) is checked for errors either way.
pub async fn run_job<C>(client: &C, job: Job, wait: Option<WaitOptions>) -> Result<Job>
where
    C: BigQueryJobsClient,
{
    let reference = job.job_reference.clone();
    let submitted = client.insert_job(job).await?;
    if submitted.is_done() {
        return check_finished(submitted);
    }
    match wait {
        // the server may have filled in the location
        Some(options) => wait_for_job(client, &submitted.job_reference, options).await,
        None => {
            debug!("submitted job {} without waiting", reference.job_id);
            Ok(submitted)
        }
    }
}
