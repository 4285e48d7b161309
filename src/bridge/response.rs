//! Response adapter over a live host response.

use bytes::{Bytes, BytesMut};
use http::StatusCode;
use serde::Serialize;

use super::interface::ResponseInterface;
use crate::host::HostResponse;

/// Response adapter.
///
/// Status, headers and body writes go straight to the host connection. The
/// adapter also keeps the content it wrote so framework code can read it back.
/// It never ends the response; the host does that once the handler returns.
#[derive(Debug)]
pub struct Response {
    host: HostResponse,
    status: u16,
    reason: Option<String>,
    content: BytesMut,
}

impl Response {
    pub fn new(host: HostResponse) -> Self {
        Self {
            status: host.status().as_u16(),
            host,
            reason: None,
            content: BytesMut::new(),
        }
    }

    /// Underlying host response.
    pub fn host(&self) -> &HostResponse {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut HostResponse {
        &mut self.host
    }

    pub fn into_host(self) -> HostResponse {
        self.host
    }

    fn write(&mut self, content: Bytes) {
        if let Err(e) = self.host.write(content.clone()) {
            tracing::warn!(error = %e, "response write rejected by connection");
        }
        self.content.extend_from_slice(&content);
    }
}

impl ResponseInterface for Response {
    fn set_status_code(&mut self, code: u16, reason: Option<&str>) -> &mut Self {
        match self.host.set_status_code(code, reason.unwrap_or("")) {
            Ok(()) => {
                self.status = code;
                self.reason = reason.filter(|r| !r.is_empty()).map(str::to_string);
            }
            Err(e) => tracing::warn!(error = %e, code, "status change rejected by connection"),
        }
        self
    }

    fn get_status_code(&self) -> u16 {
        self.status
    }

    fn get_reason_phrase(&self) -> Option<&str> {
        self.reason.as_deref().or_else(|| {
            StatusCode::from_u16(self.status)
                .ok()
                .and_then(|status| status.canonical_reason())
        })
    }

    fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        if let Err(e) = self.host.set_header(name, value) {
            tracing::warn!(error = %e, header = name, "header rejected by connection");
        }
        self
    }

    fn set_raw_header(&mut self, raw: &str) -> &mut Self {
        let raw = raw.trim();

        if let Some(status_line) = raw.strip_prefix("HTTP/") {
            let mut parts = status_line.splitn(3, ' ').skip(1);
            match parts.next().and_then(|code| code.parse::<u16>().ok()) {
                Some(code) => return self.set_status_code(code, parts.next().map(str::trim)),
                None => {
                    tracing::warn!(raw, "malformed raw status line");
                    return self;
                }
            }
        }

        match raw.split_once(':') {
            Some((name, value)) => self.set_header(name.trim(), value.trim()),
            None => {
                tracing::warn!(raw, "malformed raw header");
                self
            }
        }
    }

    fn remove_header(&mut self, name: &str) -> &mut Self {
        if let Err(e) = self.host.remove_header(name) {
            tracing::warn!(error = %e, header = name, "header removal rejected by connection");
        }
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.host.headers().contains_key(name.to_ascii_lowercase().as_str())
    }

    fn get_headers(&self) -> Vec<(String, String)> {
        self.host
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    fn set_content(&mut self, content: impl Into<Bytes>) -> &mut Self {
        self.content.clear();
        self.write(content.into());
        self
    }

    fn append_content(&mut self, content: impl Into<Bytes>) -> &mut Self {
        self.write(content.into());
        self
    }

    fn get_content(&self) -> &[u8] {
        &self.content
    }

    fn is_sent(&self) -> bool {
        self.host.is_committed()
    }

    fn set_json_content<T: Serialize + ?Sized>(&mut self, value: &T) -> &mut Self {
        let body = match serde_json::to_vec(value) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode JSON content");
                return self;
            }
        };

        if !self.has_header("content-type") {
            self.set_content_type("application/json", Some("UTF-8"));
        }
        self.set_content(body)
    }
}
