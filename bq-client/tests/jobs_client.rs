use std::time::Duration;

use bq_client::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> BigQueryClient {
    let config = ClientConfig::build("test_token")
        .with_base_url(format!("{}/bigquery/v2/", server.uri()))
        .with_max_retries(2)
        .with_retry_delay(Duration::from_millis(1))
        .with_poll_interval(Duration::from_millis(5))
        .with_max_wait(Duration::from_millis(200))
        .build()
        .unwrap();
    BigQueryClient::new(config).unwrap()
}

fn load_job(job_id: &str) -> Job {
    Job::load(
        JobReference::new("proj", job_id),
        JobConfigurationLoad::new(
            TableReference::new("proj", "sales", "orders"),
            vec!["gs://staging/job-1/part-00000".to_string()],
        )
        .with_source_format("NEWLINE_DELIMITED_JSON")
        .with_write_disposition("WRITE_APPEND"),
    )
}

fn job_body(job_id: &str, status: serde_json::Value) -> serde_json::Value {
    json!({
        "jobReference": {"projectId": "proj", "jobId": job_id, "location": "US"},
        "configuration": {"load": {
            "sourceUris": ["gs://staging/job-1/part-00000"],
            "destinationTable": {"projectId": "proj", "datasetId": "sales", "tableId": "orders"}
        }},
        "status": status
    })
}

#[test_log::test(tokio::test)]
async fn insert_job_posts_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/proj/jobs"))
        .and(header("Authorization", "Bearer test_token"))
        .and(body_partial_json(json!({
            "jobReference": {"projectId": "proj", "jobId": "load_1"},
            "configuration": {"load": {"writeDisposition": "WRITE_APPEND"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "PENDING"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let job = client_for(&server).insert_job(load_job("load_1")).await.unwrap();
    assert_eq!(job.state(), Some(JobState::Pending));
    assert_eq!(job.job_reference.location.as_deref(), Some("US"));
}

#[test_log::test(tokio::test)]
async fn insert_conflict_fetches_existing_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/proj/jobs"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": 409, "message": "Already Exists: Job proj:load_1", "status": "ALREADY_EXISTS"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/load_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "RUNNING"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let job = client_for(&server).insert_job(load_job("load_1")).await.unwrap();
    assert_eq!(job.state(), Some(JobState::Running));
}

#[test_log::test(tokio::test)]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/load_1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/load_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "DONE"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let job = client_for(&server)
        .get_job(&JobReference::new("proj", "load_1"))
        .await
        .unwrap();
    assert!(job.is_done());
}

#[test_log::test(tokio::test)]
async fn exhausted_retries_surface_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_job(&JobReference::new("proj", "load_1"))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, Error::ApiError { status: 429, message } if message == "RESOURCE_EXHAUSTED: Quota exceeded"),
        "unexpected error: {err}"
    );
    assert!(err.is_transient());
}

#[test_log::test(tokio::test)]
async fn get_job_passes_location_and_maps_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/load_9"))
        .and(query_param("location", "EU"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get_job(&JobReference::new("proj", "load_9").with_location("EU"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::JobNotFound(id) if id == "load_9"));
}

#[test_log::test(tokio::test)]
async fn unauthorized_is_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .insert_job(load_job("load_1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed));
}

#[test_log::test(tokio::test)]
async fn run_job_waits_until_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "PENDING"}),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/load_1"))
        .and(query_param("location", "US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "RUNNING"}),
        )))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/load_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "DONE"}),
        )))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let job = run_job(&client, load_job("load_1"), Some(client.wait_options()))
        .await
        .unwrap();
    assert!(job.is_done());
    assert!(job.error_result().is_none());
}

#[test_log::test(tokio::test)]
async fn failed_job_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "RUNNING"}),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({
                "state": "DONE",
                "errorResult": {"reason": "invalid", "message": "JSON parsing error in row starting at position 0"}
            }),
        )))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = run_job(&client, load_job("load_1"), Some(client.wait_options()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::JobFailed { job_id, reason, .. } if job_id == "load_1" && reason == "invalid"
    ));
}

#[test_log::test(tokio::test)]
async fn wait_gives_up_after_max_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "RUNNING"}),
        )))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let options = WaitOptions {
        poll_interval: Duration::from_millis(5),
        max_wait: Duration::from_millis(30),
    };
    let err = wait_for_job(&client, &JobReference::new("proj", "load_1"), options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { waited, .. } if waited >= Duration::from_millis(30)));
}

#[test_log::test(tokio::test)]
async fn requests_carry_user_agent_and_quota_project() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("User-Agent", bq_client::USER_AGENT))
        .and(header("x-goog-user-project", "billing-proj"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "DONE"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::build("test_token")
        .with_base_url(format!("{}/bigquery/v2/", server.uri()))
        .with_quota_project("billing-proj")
        .build()
        .unwrap();
    let job = BigQueryClient::new(config)
        .unwrap()
        .get_job(&JobReference::new("proj", "load_1"))
        .await
        .unwrap();
    assert!(job.is_done());
}

#[test_log::test(tokio::test)]
async fn wait_polls_through_transient_errors() {
    let server = MockServer::start().await;
    // one failed poll: the first request plus both of its retries
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/load_1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/load_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "DONE"}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let job = wait_for_job(&client, &JobReference::new("proj", "load_1"), client.wait_options())
        .await
        .unwrap();
    assert!(job.is_done());
}

#[test_log::test(tokio::test)]
async fn wait_stops_on_permanent_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = wait_for_job(&client, &JobReference::new("proj", "load_1"), client.wait_options())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::JobNotFound(id) if id == "load_1"));
}

#[test_log::test(tokio::test)]
async fn run_job_without_waiting_returns_submitted_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(
            "load_1",
            json!({"state": "PENDING"}),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let job = run_job(&client, load_job("load_1"), None).await.unwrap();
    assert_eq!(job.state(), Some(JobState::Pending));
}
