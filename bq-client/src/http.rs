use std::future::Future;

use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Sent with every request so that load jobs can be attributed in the BigQuery audit logs.
pub const USER_AGENT: &str = concat!("bq-client/", env!("CARGO_PKG_VERSION"));

/// Header naming the project that is billed for quota when it differs from the job's project.
const QUOTA_PROJECT_HEADER: &str = "x-goog-user-project";

/// An HTTP client that authenticates with the config's bearer token and bills quota to the
/// configured project, if any.
pub fn build_http_client(config: &ClientConfig) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    let mut authorization = header::HeaderValue::from_str(&format!("Bearer {}", config.token))?;
    authorization.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, authorization);
    if let Some(project) = &config.quota_project_id {
        headers.insert(QUOTA_PROJECT_HEADER, header::HeaderValue::from_str(project)?);
    }

    Ok(Client::builder()
        .default_headers(headers)
        .user_agent(USER_AGENT)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()?)
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Execute a request with retry logic for server errors, rate limiting and request failures.
/// Retries up to `max_retries` times with linear backoff: delay = `retry_base_delay * attempt`.
/// Once out of retries, a retryable response is returned for the caller to turn into an error.
pub async fn execute_with_retry<F, Fut>(config: &ClientConfig, f: F) -> Result<Response>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<Response, reqwest::Error>>,
{
    let mut retry = 0;
    loop {
        let out_of_retries = retry >= config.max_retries;
        match f().await {
            Ok(response) if out_of_retries || !is_retryable(response.status()) => {
                return Ok(response)
            }
            Ok(response) => warn!(
                "Server responded {}, retrying (attempt {}/{})",
                response.status(),
                retry + 1,
                config.max_retries
            ),
            Err(e) if out_of_retries => return Err(Error::from(e)),
            Err(e) => warn!(
                "Request failed, retrying (attempt {}/{}): {}",
                retry + 1,
                config.max_retries,
                e
            ),
        }

        retry += 1;
        tokio::time::sleep(config.retry_base_delay * retry).await;
    }
}

/// Error body returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            error: ErrorBody {
                message,
                status: Some(status),
            },
        }) => format!("{status}: {message}"),
        Ok(ErrorResponse { error }) => error.message,
        Err(_) => body.to_string(),
    }
}

/// Handle HTTP response and deserialize.
pub async fn handle_response<T>(response: Response) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();

    if status.is_success() {
        response.json::<T>().await.map_err(Error::from)
    } else {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = error_message(&error_body);

        match status {
            StatusCode::UNAUTHORIZED => Err(Error::AuthenticationFailed),
            StatusCode::NOT_FOUND => Err(Error::ApiError {
                status: status.as_u16(),
                message: format!("Resource not found: {message}"),
            }),
            _ => Err(Error::ApiError {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_error_body_is_unwrapped() {
        let body = r#"{"error":{"code":400,"message":"Invalid source format","status":"INVALID_ARGUMENT","errors":[{"reason":"invalid"}]}}"#;
        assert_eq!(error_message(body), "INVALID_ARGUMENT: Invalid source format");

        let body = r#"{"error":{"code":500,"message":"Backend error"}}"#;
        assert_eq!(error_message(body), "Backend error");

        assert_eq!(error_message("<html>bad gateway</html>"), "<html>bad gateway</html>");
    }
}
