//! Request adapter tests: parameters, headers, client metadata.

use crate::helpers::*;
use reqwest::StatusCode;
use serde_json::json;

/// Test query string parameters, including bracket keys
#[tokio::test]
async fn test_query_params() {
    let server = TestServer::start().await;
    let resp = server.get("/echo?name=alice&tags%5B%5D=a&tags%5B%5D=b").await;

    assert_status(&resp, StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["method"], "GET");
    assert_eq!(body["uri"], "/echo?name=alice&tags%5B%5D=a&tags%5B%5D=b");
    assert_eq!(body["query"]["name"], "alice");
    assert_eq!(body["query"]["tags"], json!({"0": "a", "1": "b"}));
    assert_eq!(body["request"]["name"], "alice");
    assert_eq!(body["post"], json!({}));
}

/// Test form body overrides the query in the combined view
#[tokio::test]
async fn test_post_form_overrides_query() {
    let server = TestServer::start().await;
    let resp = server
        .post_form("/echo?name=alice&page=2", &[("name", "bob")])
        .await;

    let body = json_body(resp).await;
    assert_eq!(body["method"], "POST");
    assert_eq!(body["post"]["name"], "bob");
    assert_eq!(body["query"]["name"], "alice");
    assert_eq!(body["request"]["name"], "bob");
    assert_eq!(body["request"]["page"], "2");
    assert_eq!(body["put"], json!({}));
}

/// Test PUT body lands in the put parameters
#[tokio::test]
async fn test_put_form() {
    let server = TestServer::start().await;
    let resp = server.put_form("/echo", &[("title", "draft")]).await;

    let body = json_body(resp).await;
    assert_eq!(body["method"], "PUT");
    assert_eq!(body["put"]["title"], "draft");
    assert_eq!(body["post"], json!({}));
}

/// Test JSON object body is readable as post parameters
#[tokio::test]
async fn test_json_body() {
    let server = TestServer::start().await;
    let resp = server
        .post_json("/echo", &json!({"name": "carol", "n": 3}))
        .await;

    let body = json_body(resp).await;
    assert_eq!(body["post"]["name"], "carol");
    assert_eq!(body["post"]["n"], "3");
    assert!(body["request"].get("name").is_none());
}

/// Test filtered lookup with a default
#[tokio::test]
async fn test_filtered_param() {
    let server = TestServer::start().await;

    let body = json_body(server.get("/echo?age=42abc").await).await;
    assert_eq!(body["age"], "42");

    let body = json_body(server.get("/echo").await).await;
    assert_eq!(body["age"], "0");
}

/// Test header lookup with underscores in the name
#[tokio::test]
async fn test_header_lookup() {
    let server = TestServer::start().await;
    let resp = server
        .get_with_headers("/echo", &[("X-Foo", "bar")])
        .await;

    let body = json_body(resp).await;
    assert_eq!(body["header_foo"], "bar");
}

/// Test client address with and without a forwarding header
#[tokio::test]
async fn test_client_address() {
    let server = TestServer::start().await;

    let body = json_body(server.get("/echo").await).await;
    assert_eq!(body["client"], "127.0.0.1");

    let resp = server
        .get_with_headers("/echo", &[("X-Forwarded-For", "10.0.0.1, 10.0.0.2")])
        .await;
    let body = json_body(resp).await;
    assert_eq!(body["client"], "10.0.0.1");
}

/// Test best language from Accept-Language
#[tokio::test]
async fn test_best_language() {
    let server = TestServer::start().await;
    let resp = server
        .get_with_headers("/echo", &[("Accept-Language", "en;q=0.5, de, fr;q=0.8")])
        .await;

    let body = json_body(resp).await;
    assert_eq!(body["language"], "de");
}

/// Test AJAX detection
#[tokio::test]
async fn test_ajax() {
    let server = TestServer::start().await;

    let body = json_body(server.get("/echo").await).await;
    assert_eq!(body["ajax"], false);

    let resp = server
        .get_with_headers("/echo", &[("X-Requested-With", "XMLHttpRequest")])
        .await;
    let body = json_body(resp).await;
    assert_eq!(body["ajax"], true);
}

/// Test basic auth credentials
#[tokio::test]
async fn test_basic_auth() {
    let server = TestServer::start().await;

    let body = json_body(server.get("/echo").await).await;
    assert!(body["basic"].is_null());

    let resp = server
        .client
        .get(server.url("/echo"))
        .basic_auth("admin", Some("secret"))
        .send()
        .await
        .unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["basic"], "admin");
}

/// Test cookies show up in the combined view
#[tokio::test]
async fn test_cookies_in_request_params() {
    let server = TestServer::start().await;
    let resp = server
        .get_with_headers("/echo?session=query", &[("Cookie", "session=abc; theme=dark")])
        .await;

    let body = json_body(resp).await;
    assert_eq!(body["request"]["session"], "abc");
    assert_eq!(body["request"]["theme"], "dark");
}
