//! Tests for the API client module

use super::*;
use crate::config::Credentials;
use crate::types::QueryWindow;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> ApiClient {
    ApiClientBuilder::new(7146, 85553)
        .base_url(base_url)
        .timeout(Duration::from_secs(5))
        .max_retries(2)
        .rate_limit(1000, 1000)
        .backoff(Duration::from_millis(1), Duration::from_millis(10))
        .build()
        .unwrap()
}

fn window(lower: &str, upper: &str, page: u32, per_page: u32) -> QueryWindow {
    QueryWindow::new(lower.parse().unwrap(), upper.parse().unwrap(), page, per_page)
}

#[tokio::test]
async fn test_fetch_page_sends_date_filtered_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/observations"))
        .and(query_param("order_by", "observed_on"))
        .and(query_param("order", "asc"))
        .and(query_param("d1", "1979-04-22"))
        .and(query_param("d2", "2021-01-01"))
        .and(query_param("page", "3"))
        .and(query_param("per_page", "100"))
        .and(query_param("place_id", "7146"))
        .and(query_param("taxon_id", "85553"))
        .and(query_param("verifiable", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": 1 }]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let page = client
        .fetch_page(&window("1979-04-22", "2021-01-01", 3, 100))
        .await
        .unwrap();

    assert_eq!(page["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_oldest_observation_date() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/observations"))
        .and(query_param("per_page", "1"))
        .and(query_param("page", "1"))
        .and(query_param("order", "asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": 505236,
                "observed_on_details": { "date": "1979-04-22" }
            }]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let date = client.oldest_observation_date().await.unwrap();
    assert_eq!(date, "1979-04-22".parse().unwrap());
}

#[tokio::test]
async fn test_oldest_observation_date_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/observations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.oldest_observation_date().await.unwrap_err();
    assert!(matches!(
        err,
        crate::error::Error::OldestRecordUnavailable { .. }
    ));
}

#[tokio::test]
async fn test_fetch_page_unfiltered_orders_by_id_desc() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/observations"))
        .and(query_param("order_by", "observations.id"))
        .and(query_param("order", "desc"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let page = client.fetch_page_unfiltered(2, 50).await.unwrap();
    assert!(page["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_on_server_error_then_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/observations"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/observations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let page = client
        .fetch_page(&window("1979-04-22", "2021-01-01", 1, 100))
        .await
        .unwrap();
    assert!(page["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/observations"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad filter"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch_page(&window("1979-04-22", "2021-01-01", 1, 100))
        .await
        .unwrap_err();
    match err {
        crate::error::Error::HttpStatus { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "bad filter");
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_after_retries_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/observations"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch_page(&window("1979-04-22", "2021-01-01", 1, 100))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        crate::error::Error::HttpStatus { status: 502, .. }
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_session_login_flow() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<form><input type="hidden" name="authenticity_token" value="tok123" /></form>"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_string_contains("authenticity_token=tok123"))
        .and(body_string_contains("user%5Bemail%5D=someone%40example.com"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<h1><a href="/people/someone@example.com">profile</a></h1>"#,
        ))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let auth = SessionAuth::new(Credentials {
        username: "someone@example.com".to_string(),
        password: "hunter2".to_string(),
    });
    auth.login(client.http(), &server.uri()).await.unwrap();
}

#[tokio::test]
async fn test_session_login_unverified() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<input name="authenticity_token" value="tok123" />"#,
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // Home page without the profile link means the login did not stick
    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>guest</html>"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let auth = SessionAuth::new(Credentials {
        username: "someone@example.com".to_string(),
        password: "wrong".to_string(),
    });
    let err = auth.login(client.http(), &server.uri()).await.unwrap_err();
    assert!(matches!(err, crate::error::Error::Auth { .. }));
}
