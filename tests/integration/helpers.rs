//! Test helpers and utilities

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use tokio_bridge::bridge::{
    Lookup, Request, RequestInterface, Response as BridgeResponse, ResponseInterface, Sanitizer,
};
use tokio_bridge::config::{ServerConfig, UploadConfig};
use tokio_bridge::server::{Handler, Server};
use tokio_bridge::types::{ParamList, ParamValue};

/// Parameter list as a JSON object.
fn params(list: &ParamList) -> ParamValue {
    ParamValue::Array(list.clone())
}

/// Upload size limit used by the test server.
pub const TEST_UPLOAD_LIMIT: u64 = 1024;

/// Application wired into the test server.
///
/// - `GET /` and any unknown path behave like the demo binary.
/// - `/echo` answers with a JSON dump of what the request adapter sees.
/// - `/stream` writes its body in several pieces.
/// - `/late-status` changes the status after the body started.
/// - `/redirect` redirects to `/`.
pub struct TestApp;

#[async_trait]
impl Handler for TestApp {
    async fn handle(&self, request: Request, response: &mut BridgeResponse) {
        match request.get_uri(true) {
            "/" if request.is_get() => {
                response.set_content("Hello World");
            }
            "/echo" => {
                let files: Vec<Value> = request
                    .get_uploaded_files(false)
                    .iter()
                    .map(|f| {
                        json!({
                            "key": f.key(),
                            "name": f.name(),
                            "size": f.size(),
                            "error": f.error(),
                            "tmp_name": f.tmp_name(),
                            "uploaded": f.is_uploaded_file(),
                        })
                    })
                    .collect();

                let age = request
                    .get_with("age", &Lookup::new().filter("int").default_value("0"))
                    .ok()
                    .flatten();

                let body = json!({
                    "method": request.get_method(),
                    "uri": request.get_uri(false),
                    "query": params(request.query_params()),
                    "post": params(request.post_params()),
                    "put": params(request.put_params()),
                    "request": params(request.request_params()),
                    "age": age,
                    "header_foo": request.get_header("x_foo"),
                    "client": request.get_client_address(true),
                    "language": request.get_best_language(),
                    "ajax": request.is_ajax(),
                    "basic": request.get_basic_auth().map(|a| a.username),
                    "num_files": request.num_files(false),
                    "files": files,
                });
                response.set_json_content(&body);
            }
            "/stream" => {
                response.set_header("x-stream", "1");
                for part in ["one,", "two,", "three"] {
                    response.append_content(part);
                    tokio::task::yield_now().await;
                }
            }
            "/late-status" => {
                response.set_content("partial").set_status_code(500, None);
            }
            "/redirect" => {
                response.redirect("/", Some(301));
            }
            "/panic" => {
                panic!("handler failure");
            }
            _ => {
                response
                    .set_status_code(404, Some("Not Found"))
                    .set_content("Not found");
            }
        }
    }
}

/// In-process server bound to an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub upload_dir: TempDir,
    server: Arc<Server<TestApp>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Start a server on 127.0.0.1 with a fresh upload directory.
    pub async fn start() -> Self {
        let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");

        let config = ServerConfig::default().with_listen_addr("127.0.0.1:0".parse().unwrap());
        let upload = UploadConfig::default()
            .with_dir(upload_dir.path())
            .with_max_size(TEST_UPLOAD_LIMIT);

        let server = Arc::new(
            Server::new(config, upload, TestApp).with_filter(Arc::new(Sanitizer::new())),
        );
        let listener = server.bind().await.expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to read local addr");

        tokio::spawn({
            let server = Arc::clone(&server);
            async move {
                let _ = server.serve(listener).await;
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{}", addr),
            client,
            upload_dir,
            server,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request to the server
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Make a GET request with custom headers
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut req = self.client.get(self.url(path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.send().await.expect("GET request failed")
    }

    /// Make a POST request with form data
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Make a PUT request with form data
    pub async fn put_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .put(self.url(path))
            .form(form)
            .send()
            .await
            .expect("PUT request failed")
    }

    /// Make a POST request with JSON body
    pub async fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, json: &T) -> Response {
        self.client
            .post(self.url(path))
            .json(json)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Make a POST request with a multipart body
    pub async fn post_multipart(&self, path: &str, form: reqwest::multipart::Form) -> Response {
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("multipart request failed")
    }

    /// Number of files left in the upload directory.
    pub fn upload_dir_entries(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Wait until the upload directory is empty.
    pub async fn wait_for_upload_cleanup(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if self.upload_dir_entries() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    /// Stop accepting and wait for open connections to finish.
    pub async fn shutdown(&self) -> bool {
        self.server.trigger_shutdown();
        self.server.wait_for_drain(Duration::from_secs(2)).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.trigger_shutdown();
    }
}

/// Assert that response has expected status
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert that response contains header
pub fn assert_header(response: &Response, name: &str, expected: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert_eq!(value, expected, "Header '{}' mismatch", name);
}

/// Assert that response contains header with prefix
pub fn assert_header_starts_with(response: &Response, name: &str, prefix: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert!(
        value.starts_with(prefix),
        "Header '{}' expected to start with '{}', got '{}'",
        name,
        prefix,
        value
    );
}

/// Read the body as JSON.
pub async fn json_body(response: Response) -> Value {
    response.json().await.expect("Failed to parse JSON body")
}
