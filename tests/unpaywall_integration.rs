//! Integration tests for the Unpaywall lookup client against a mock server.

use std::time::Duration;

use paperfetch::unpaywall::{UnpaywallClient, build_candidate_urls};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> UnpaywallClient {
    UnpaywallClient::with_base_url("test@example.org", server.uri(), Duration::from_secs(5))
        .unwrap()
}

#[tokio::test]
async fn test_lookup_parses_record_and_sends_email() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/10.1234%2Fabc"))
        .and(query_param("email", "test@example.org"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "is_oa": true,
            "title": "A Landmark Result",
            "best_oa_location": {
                "url_for_pdf": "https://host.org/paper.pdf",
                "url": "https://host.org/landing"
            },
            "oa_locations": [
                {"url_for_pdf": null, "url": "https://mirror.org/landing"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client(&server).lookup("10.1234/abc").await.unwrap();

    assert!(record.is_oa);
    assert_eq!(record.title.as_deref(), Some("A Landmark Result"));
    assert_eq!(
        build_candidate_urls(&record),
        vec![
            "https://host.org/paper.pdf",
            "https://host.org/landing",
            "https://mirror.org/landing"
        ]
    );
}

#[tokio::test]
async fn test_lookup_http_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"error\":true}"))
        .mount(&server)
        .await;

    let err = client(&server).lookup("10.1234/missing").await.unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("unpaywall_http_404:"), "got: {message}");
    assert!(message.contains("{\"error\":true}"));
}

#[tokio::test]
async fn test_lookup_invalid_json_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server).lookup("10.1234/garbled").await.unwrap_err();
    assert!(err.to_string().starts_with("unpaywall_error:"));
}

#[tokio::test]
async fn test_lookup_closed_paper_has_no_candidates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "is_oa": false,
            "title": "Paywalled"
        })))
        .mount(&server)
        .await;

    let record = client(&server).lookup("10.1234/closed").await.unwrap();
    assert!(!record.is_oa);
    assert!(build_candidate_urls(&record).is_empty());
}
