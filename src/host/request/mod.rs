//! Parsed request snapshot handed to the request adapter.
//!
//! The host reads the whole body, parses query, cookie, form and multipart
//! data once, and freezes everything into a [`HostRequest`].

mod multipart;
mod parser;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};

use crate::config::UploadConfig;
use crate::core::Result;
use crate::types::{FileEntry, FileList, NestedBuilder, ParamList, UploadedFile};

pub use multipart::parse_multipart;
pub use parser::{form_decode, parse_cookies, parse_form, parse_json_object, parse_query_string};

/// Server metadata keys (lower-case, one entry per key).
pub mod server_keys {
    pub const REQUEST_METHOD: &str = "request_method";
    pub const REQUEST_URI: &str = "request_uri";
    pub const PATH_INFO: &str = "path_info";
    pub const QUERY_STRING: &str = "query_string";
    pub const SERVER_PROTOCOL: &str = "server_protocol";
    pub const SERVER_NAME: &str = "server_name";
    pub const SERVER_ADDR: &str = "server_addr";
    pub const SERVER_PORT: &str = "server_port";
    pub const REMOTE_ADDR: &str = "remote_addr";
    pub const REMOTE_PORT: &str = "remote_port";
    pub const REQUEST_TIME: &str = "request_time";
    pub const REQUEST_TIME_FLOAT: &str = "request_time_float";
    pub const HTTPS: &str = "https";
    pub const AUTH_USER: &str = "php_auth_user";
    pub const AUTH_PW: &str = "php_auth_pw";
    pub const AUTH_DIGEST: &str = "php_auth_digest";
}

/// Connection-level facts the host knows about a request.
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    /// Remote client address
    pub remote_addr: SocketAddr,
    /// Local address the connection was accepted on
    pub local_addr: SocketAddr,
    /// Whether the connection is encrypted (or terminated by a trusted proxy)
    pub secure: bool,
    /// Configured server name
    pub server_name: Option<Arc<str>>,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            remote_addr: ([127, 0, 0, 1], 0).into(),
            local_addr: ([127, 0, 0, 1], 80).into(),
            secure: false,
            server_name: None,
        }
    }
}

/// Methods whose body the host parses into parameters.
#[inline]
fn has_body(method: &Method) -> bool {
    matches!(
        method.as_str(),
        "POST" | "PUT" | "PATCH" | "DELETE" | "OPTIONS" | "QUERY"
    )
}

/// Already-parsed request as produced by the host server.
///
/// Immutable after construction. Clone is not derived; the adapter owns it.
#[derive(Debug)]
pub struct HostRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    query: ParamList,
    body_params: ParamList,
    cookies: ParamList,
    files: FileList,
    server: Vec<(String, String)>,
    raw_body: Bytes,
}

impl HostRequest {
    /// Builder for requests assembled outside the server (embedding, tests).
    pub fn builder() -> HostRequestBuilder {
        HostRequestBuilder::new()
    }

    /// Build the snapshot from request parts and the fully read body.
    pub async fn from_parts(
        parts: Parts,
        body: Bytes,
        conn: &ConnectionInfo,
        upload: &UploadConfig,
    ) -> Result<Self> {
        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let (body_params, files) = if has_body(&parts.method)
            && content_type
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        {
            parse_multipart(&content_type, body.clone(), upload).await?
        } else {
            (parse_body(&parts.method, &content_type, &body), Vec::new())
        };

        Ok(Self::assemble(parts, body, body_params, files, conn))
    }

    fn assemble(
        parts: Parts,
        body: Bytes,
        body_params: ParamList,
        files: FileList,
        conn: &ConnectionInfo,
    ) -> Self {
        let query = parts.uri.query().map(parse_query_string).unwrap_or_default();

        let cookies = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookies)
            .collect::<ParamList>();

        let server = server_vars(&parts, conn);

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            query,
            body_params,
            cookies,
            files,
            server,
            raw_body: body,
        }
    }

    /// Get the HTTP method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the full URI.
    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Get the HTTP version.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value by name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Query string parameters.
    #[inline]
    pub fn query(&self) -> &ParamList {
        &self.query
    }

    /// Form or multipart body parameters.
    #[inline]
    pub fn body_params(&self) -> &ParamList {
        &self.body_params
    }

    /// Cookies.
    #[inline]
    pub fn cookies(&self) -> &ParamList {
        &self.cookies
    }

    /// Uploaded files.
    #[inline]
    pub fn files(&self) -> &FileList {
        &self.files
    }

    /// All server metadata.
    #[inline]
    pub fn server(&self) -> &[(String, String)] {
        &self.server
    }

    /// One server metadata value by exact key.
    #[inline]
    pub fn server_var(&self, key: &str) -> Option<&str> {
        self.server
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Raw request body.
    #[inline]
    pub fn raw_body(&self) -> &Bytes {
        &self.raw_body
    }

    /// Temporary paths of every stored upload.
    pub fn upload_paths(&self) -> Vec<PathBuf> {
        fn collect(entries: &FileList, out: &mut Vec<PathBuf>) {
            for (_, entry) in entries {
                match entry {
                    FileEntry::Single(file) if !file.tmp_name.is_empty() => {
                        out.push(PathBuf::from(&file.tmp_name))
                    }
                    FileEntry::Single(_) => {}
                    FileEntry::Group(members) => collect(members, out),
                }
            }
        }

        let mut paths = Vec::new();
        collect(&self.files, &mut paths);
        paths
    }
}

/// Parse a non-multipart body into parameters.
fn parse_body(method: &Method, content_type: &str, body: &[u8]) -> ParamList {
    if has_body(method)
        && content_type
            .to_ascii_lowercase()
            .starts_with("application/x-www-form-urlencoded")
    {
        parse_form(body)
    } else {
        Vec::new()
    }
}

/// Protocol string as reported in `server_protocol`.
fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Build server metadata for one request.
fn server_vars(parts: &Parts, conn: &ConnectionInfo) -> Vec<(String, String)> {
    use server_keys::*;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let mut vars: Vec<(&str, String)> = Vec::with_capacity(16);
    vars.push((REQUEST_METHOD, parts.method.as_str().to_string()));
    vars.push((
        REQUEST_URI,
        parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
    ));
    vars.push((PATH_INFO, parts.uri.path().to_string()));
    if let Some(query) = parts.uri.query() {
        vars.push((QUERY_STRING, query.to_string()));
    }
    vars.push((SERVER_PROTOCOL, protocol(parts.version).to_string()));
    if let Some(ref name) = conn.server_name {
        vars.push((SERVER_NAME, name.to_string()));
    }
    vars.push((SERVER_ADDR, conn.local_addr.ip().to_string()));
    vars.push((SERVER_PORT, conn.local_addr.port().to_string()));
    vars.push((REMOTE_ADDR, conn.remote_addr.ip().to_string()));
    vars.push((REMOTE_PORT, conn.remote_addr.port().to_string()));
    vars.push((REQUEST_TIME, now.as_secs().to_string()));
    vars.push((REQUEST_TIME_FLOAT, format!("{:.6}", now.as_secs_f64())));
    if conn.secure {
        vars.push((HTTPS, "on".to_string()));
    }

    let authorization = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if let Some(auth) = authorization {
        if let Some(encoded) = strip_scheme(auth, "basic") {
            if let Some((user, password)) = decode_basic(encoded) {
                vars.push((AUTH_USER, user));
                vars.push((AUTH_PW, password));
            }
        } else if let Some(digest) = strip_scheme(auth, "digest") {
            vars.push((AUTH_DIGEST, digest.to_string()));
        }
    }

    vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Credentials after an auth scheme name (case-insensitive).
fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let (name, rest) = value.trim().split_once(' ')?;
    name.eq_ignore_ascii_case(scheme).then(|| rest.trim())
}

/// Decode `base64(user:password)`.
fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Builder for [`HostRequest`].
///
/// Query, cookies and urlencoded bodies are parsed on `build()`; uploaded
/// files are attached directly with [`HostRequestBuilder::file`].
pub struct HostRequestBuilder {
    inner: http::request::Builder,
    body: Bytes,
    files: NestedBuilder<FileEntry>,
    conn: ConnectionInfo,
}

impl Default for HostRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRequestBuilder {
    pub fn new() -> Self {
        Self {
            inner: http::Request::builder(),
            body: Bytes::new(),
            files: NestedBuilder::new(),
            conn: ConnectionInfo::default(),
        }
    }

    pub fn method<M>(mut self, method: M) -> Self
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
    {
        self.inner = self.inner.method(method);
        self
    }

    pub fn uri<U>(mut self, uri: U) -> Self
    where
        Uri: TryFrom<U>,
        <Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        self.inner = self.inner.uri(uri);
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.inner = self.inner.version(version);
        self
    }

    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.inner = self.inner.header(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach an uploaded file under a (possibly bracketed) field name.
    pub fn file(mut self, field: &str, file: UploadedFile) -> Self {
        self.files.insert(field, FileEntry::Single(file));
        self
    }

    pub fn connection(mut self, conn: ConnectionInfo) -> Self {
        self.conn = conn;
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.conn.remote_addr = addr;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.conn.secure = secure;
        self
    }

    pub fn build(self) -> Result<HostRequest> {
        let (parts, ()) = self.inner.body(())?.into_parts();

        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let body_params = parse_body(&parts.method, content_type, &self.body);

        Ok(HostRequest::assemble(
            parts,
            self.body,
            body_params,
            self.files.finish(),
            &self.conn,
        ))
    }
}
