//! Multipart upload tests: file enumeration, size limit, temp file cleanup.

use std::time::Duration;

use crate::helpers::*;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

fn text_part(name: &str, content: &[u8]) -> Part {
    Part::bytes(content.to_vec())
        .file_name(name.to_string())
        .mime_str("text/plain")
        .unwrap()
}

/// Test single file upload alongside a form field
#[tokio::test]
async fn test_single_upload() {
    let server = TestServer::start().await;
    let form = Form::new()
        .text("title", "report")
        .part("doc", text_part("report.txt", b"hello upload"));

    let resp = server.post_multipart("/echo", form).await;
    assert_status(&resp, StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["post"]["title"], "report");
    assert_eq!(body["num_files"], 1);

    let file = &body["files"][0];
    assert_eq!(file["key"], "doc");
    assert_eq!(file["name"], "report.txt");
    assert_eq!(file["size"], 12);
    assert_eq!(file["error"], 0);
    assert_eq!(file["uploaded"], true);
    assert!(file["tmp_name"]
        .as_str()
        .unwrap()
        .starts_with(server.upload_dir.path().to_str().unwrap()));
}

/// Test bracket field names flatten to dotted keys
#[tokio::test]
async fn test_grouped_uploads() {
    let server = TestServer::start().await;
    let form = Form::new()
        .part("docs[]", text_part("a.txt", b"a"))
        .part("docs[]", text_part("b.txt", b"bb"));

    let body = json_body(server.post_multipart("/echo", form).await).await;
    assert_eq!(body["num_files"], 2);
    assert_eq!(body["files"][0]["key"], "docs.0");
    assert_eq!(body["files"][0]["name"], "a.txt");
    assert_eq!(body["files"][1]["key"], "docs.1");
    assert_eq!(body["files"][1]["size"], 2);
}

/// Test oversize file is reported with an error and not stored
#[tokio::test]
async fn test_oversize_upload() {
    let server = TestServer::start().await;
    let big = vec![b'x'; (TEST_UPLOAD_LIMIT as usize) * 2];
    let form = Form::new()
        .part("small", text_part("small.txt", b"ok"))
        .part("big", text_part("big.bin", &big));

    let body = json_body(server.post_multipart("/echo", form).await).await;
    assert_eq!(body["num_files"], 2);

    let big = &body["files"][1];
    assert_eq!(big["key"], "big");
    assert_eq!(big["error"], 1);
    assert_eq!(big["tmp_name"], "");
    assert_eq!(big["uploaded"], false);
    assert_eq!(body["files"][0]["error"], 0);
}

/// Test temp files are removed once the response is done
#[tokio::test]
async fn test_upload_cleanup() {
    let server = TestServer::start().await;
    let form = Form::new()
        .part("one", text_part("1.txt", b"first"))
        .part("two", text_part("2.txt", b"second"));

    let resp = server.post_multipart("/echo", form).await;
    assert_status(&resp, StatusCode::OK);
    let _ = resp.bytes().await;

    assert!(
        server
            .wait_for_upload_cleanup(Duration::from_secs(2))
            .await,
        "upload directory not cleaned, {} entries left",
        server.upload_dir_entries()
    );
}

/// Test a panicking handler still answers 500 and cleans up temp files
#[tokio::test]
async fn test_handler_panic_cleans_uploads() {
    let server = TestServer::start().await;
    let form = Form::new().part("doc", text_part("doc.txt", b"left behind?"));

    let resp = server.post_multipart("/panic", form).await;
    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(
        server
            .wait_for_upload_cleanup(Duration::from_secs(2))
            .await,
        "upload directory not cleaned, {} entries left",
        server.upload_dir_entries()
    );

    // The connection keeps serving after the failed request.
    let resp = server.get("/").await;
    assert_status(&resp, StatusCode::OK);
}
