use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Root of the public BigQuery v2 REST API.
pub const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2/";

/// Settings for [`BigQueryClient`](crate::BigQueryClient). Build one with
/// [`ClientConfig::build`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    /// OAuth2 bearer token sent with every request. Obtaining and refreshing it is up to the
    /// caller.
    pub token: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Delay between two status polls while waiting for a job.
    pub poll_interval: Duration,
    /// Give up waiting for a job after this long.
    pub max_wait: Duration,
    /// Project billed for API quota, sent as `x-goog-user-project`.
    pub quota_project_id: Option<String>,
}

impl ClientConfig {
    /// Start building a config with the given bearer token and defaults for everything else.
    pub fn build(token: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            base_url: None,
            token: token.into(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(6 * 60 * 60),
            quota_project_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    token: String,
    timeout: Duration,
    connect_timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    poll_interval: Duration,
    max_wait: Duration,
    quota_project_id: Option<String>,
}

impl ClientConfigBuilder {
    /// Talk to another endpoint than [`DEFAULT_BASE_URL`], e.g. an emulator.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_quota_project(mut self, project_id: impl Into<String>) -> Self {
        self.quota_project_id = Some(project_id.into());
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let raw = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let mut base_url = Url::parse(raw)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidConfiguration(format!(
                "base url '{raw}' cannot be a base"
            )));
        }
        // relative joins would otherwise replace the last path segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfiguration(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(ClientConfig {
            base_url,
            token: self.token,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
            poll_interval: self.poll_interval,
            max_wait: self.max_wait,
            quota_project_id: self.quota_project_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::build("token").build().unwrap();
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = ClientConfig::build("token")
            .with_base_url("http://localhost:9050/bigquery/v2")
            .build()
            .unwrap();
        assert_eq!(
            config.base_url.join("projects/p/jobs").unwrap().as_str(),
            "http://localhost:9050/bigquery/v2/projects/p/jobs"
        );
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(matches!(
            ClientConfig::build("token").with_base_url("mailto:nobody").build(),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ClientConfig::build("token").with_base_url("not a url").build(),
            Err(Error::UrlParse(_))
        ));
        assert!(matches!(
            ClientConfig::build("token")
                .with_poll_interval(Duration::ZERO)
                .build(),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
