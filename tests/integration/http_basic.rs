//! Basic HTTP tests: GET, HEAD, 404, streaming, redirects, etc.

use crate::helpers::*;
use reqwest::StatusCode;

/// Test GET request to the index
#[tokio::test]
async fn test_get_index() {
    let server = TestServer::start().await;
    let resp = server.get("/").await;

    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Hello World");
}

/// Test HEAD request returns no body
#[tokio::test]
async fn test_head_request() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .head(server.url("/echo"))
        .send()
        .await
        .expect("HEAD request failed");

    assert_status(&resp, StatusCode::OK);
    assert!(resp.text().await.unwrap().is_empty());
}

/// Test 404 with the handler's body
#[tokio::test]
async fn test_404_not_found() {
    let server = TestServer::start().await;
    let resp = server.get("/nonexistent").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
    assert_eq!(resp.text().await.unwrap(), "Not found");
}

/// Test POST to the index is not the greeting
#[tokio::test]
async fn test_post_index_is_not_found() {
    let server = TestServer::start().await;
    let resp = server.post_form("/", &[("a", "1")]).await;

    assert_status(&resp, StatusCode::NOT_FOUND);
}

/// Test body written in several pieces arrives complete
#[tokio::test]
async fn test_streamed_body() {
    let server = TestServer::start().await;
    let resp = server.get("/stream").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "x-stream", "1");
    assert_eq!(resp.text().await.unwrap(), "one,two,three");
}

/// Test status change after the body started is ignored
#[tokio::test]
async fn test_status_after_body_is_ignored() {
    let server = TestServer::start().await;
    let resp = server.get("/late-status").await;

    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "partial");
}

/// Test redirect sets status and location
#[tokio::test]
async fn test_redirect() {
    let server = TestServer::start().await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let resp = client.get(server.url("/redirect")).send().await.unwrap();

    assert_status(&resp, StatusCode::MOVED_PERMANENTLY);
    assert_header(&resp, "location", "/");
}

/// Test redirect is followed by a regular client
#[tokio::test]
async fn test_redirect_followed() {
    let server = TestServer::start().await;
    let resp = server.get("/redirect").await;

    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Hello World");
}

/// Test JSON content gets a JSON content type
#[tokio::test]
async fn test_json_content_type() {
    let server = TestServer::start().await;
    let resp = server.get("/echo").await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "application/json");
}

/// Test malformed multipart body is rejected by the host
#[tokio::test]
async fn test_bad_multipart_is_400() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .post(server.url("/echo"))
        .header("content-type", "multipart/form-data")
        .body("garbage")
        .send()
        .await
        .unwrap();

    assert_status(&resp, StatusCode::BAD_REQUEST);
}

/// Test concurrent requests
#[tokio::test]
async fn test_concurrent_requests() {
    let server = TestServer::start().await;

    let requests = (0..10).map(|_| server.get("/"));
    let responses = futures_util::future::join_all(requests).await;

    for resp in responses {
        assert_status(&resp, StatusCode::OK);
    }
}

/// Test shutdown drains open connections
#[tokio::test]
async fn test_graceful_shutdown() {
    let server = TestServer::start().await;
    let resp = server.get("/").await;
    assert_status(&resp, StatusCode::OK);

    assert!(server.shutdown().await);
    assert!(server.shutdown().await);
}
