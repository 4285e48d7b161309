//! Request adapter over a host request snapshot.

use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use http::header;
use regex::Regex;

use super::file::{self, File};
use super::filter::Filter;
use super::interface::RequestInterface;
use super::method::{is_valid_http_method, MethodSet, METHOD_PUT};
use super::negotiation::{parse_quality_header, QualityItem};
use crate::core::{Error, Result};
use crate::host::request::parse_json_object;
use crate::host::{server_keys, HostRequest};
use crate::types::{find_param, merge_params, ParamList, ParamValue};

/// Options for a filtered parameter lookup.
///
/// ```
/// use tokio_bridge::bridge::Lookup;
///
/// let lookup = Lookup::new().filter("trim").filter("int").default_value("1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    filters: Vec<String>,
    default: Option<ParamValue>,
    not_allow_empty: bool,
    no_recursive: bool,
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sanitizing rule; rules run in the order they were added.
    pub fn filter(mut self, rule: impl Into<String>) -> Self {
        self.filters.push(rule.into());
        self
    }

    pub fn filters<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.extend(rules.into_iter().map(Into::into));
        self
    }

    /// Value returned when the parameter is missing, empty (with
    /// `not_allow_empty`) or rejected by a filter.
    pub fn default_value(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Treat an empty string or empty array like a missing parameter.
    pub fn not_allow_empty(mut self) -> Self {
        self.not_allow_empty = true;
        self
    }

    /// Do not descend into array values when filtering.
    pub fn no_recursive(mut self) -> Self {
        self.no_recursive = true;
        self
    }
}

/// Credentials from a Basic `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

static DIGEST_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)=(?:"([^"]*)"|'([^']*)'|([^'" ,]+))"#).expect("valid digest pattern")
});

/// Request adapter.
///
/// Owns the host snapshot plus the parameter views derived from it; nothing
/// is read from process-wide state.
pub struct Request {
    host: HostRequest,
    combined: ParamList,
    post: ParamList,
    put: ParamList,
    filter: Option<Arc<dyn Filter>>,
}

impl Request {
    pub fn new(host: HostRequest) -> Self {
        let combined = merge_params(&[host.query(), host.body_params(), host.cookies()]);

        let body = if host.body_params().is_empty() && is_json(host.header("content-type")) {
            parse_json_object(host.raw_body())
        } else {
            host.body_params().clone()
        };

        let (post, put) = if host.method().as_str() == METHOD_PUT {
            (Vec::new(), body)
        } else {
            (body, Vec::new())
        };

        Self {
            host,
            combined,
            post,
            put,
            filter: None,
        }
    }

    /// Wire in the filter used by lookups that name sanitizing rules.
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Underlying host snapshot.
    pub fn host(&self) -> &HostRequest {
        &self.host
    }

    fn lookup(&self, source: &ParamList, name: &str, lookup: &Lookup) -> Result<Option<ParamValue>> {
        let Some(value) = find_param(source, name) else {
            return Ok(lookup.default.clone());
        };

        if lookup.not_allow_empty && value.is_empty() {
            return Ok(lookup.default.clone());
        }

        if lookup.filters.is_empty() {
            return Ok(Some(value.clone()));
        }

        let filter = self.filter.as_ref().ok_or(Error::FilterUnavailable)?;
        match filter.sanitize(value, &lookup.filters, lookup.no_recursive)? {
            Some(clean) => Ok(Some(clean)),
            None => Ok(lookup.default.clone()),
        }
    }

    fn quality_header(&self, name: &str, kind: &'static str) -> Vec<QualityItem> {
        parse_quality_header(self.get_header(name), kind)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", self.host.method())
            .field("uri", self.host.uri())
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}

/// `x_forwarded_for` -> `x-forwarded-for`.
fn header_key(name: &str) -> String {
    name.replace('_', "-").to_ascii_lowercase()
}

/// `x-forwarded-for` -> `X-Forwarded-For`.
fn title_case(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Drop a trailing `:port`, leaving bracketed IPv6 hosts intact.
fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port))
            if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) && !name.ends_with(':') =>
        {
            name
        }
        _ => host,
    }
}

impl RequestInterface for Request {
    fn get(&self, name: &str) -> Option<&ParamValue> {
        find_param(&self.combined, name)
    }

    fn get_with(&self, name: &str, lookup: &Lookup) -> Result<Option<ParamValue>> {
        self.lookup(&self.combined, name, lookup)
    }

    fn request_params(&self) -> &ParamList {
        &self.combined
    }

    fn get_query(&self, name: &str) -> Option<&ParamValue> {
        find_param(self.host.query(), name)
    }

    fn get_query_with(&self, name: &str, lookup: &Lookup) -> Result<Option<ParamValue>> {
        self.lookup(self.host.query(), name, lookup)
    }

    fn query_params(&self) -> &ParamList {
        self.host.query()
    }

    fn get_post(&self, name: &str) -> Option<&ParamValue> {
        find_param(&self.post, name)
    }

    fn get_post_with(&self, name: &str, lookup: &Lookup) -> Result<Option<ParamValue>> {
        self.lookup(&self.post, name, lookup)
    }

    fn post_params(&self) -> &ParamList {
        &self.post
    }

    fn get_put(&self, name: &str) -> Option<&ParamValue> {
        find_param(&self.put, name)
    }

    fn get_put_with(&self, name: &str, lookup: &Lookup) -> Result<Option<ParamValue>> {
        self.lookup(&self.put, name, lookup)
    }

    fn put_params(&self) -> &ParamList {
        &self.put
    }

    fn get_header(&self, name: &str) -> &str {
        self.host.header(&header_key(name)).unwrap_or("")
    }

    fn get_headers(&self) -> Vec<(String, String)> {
        let headers = self.host.headers();
        headers
            .keys()
            .map(|name| {
                let value = headers
                    .get_all(name)
                    .iter()
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                    .collect::<Vec<_>>()
                    .join(", ");
                (title_case(name.as_str()), value)
            })
            .collect()
    }

    fn has_header(&self, name: &str) -> bool {
        self.host.headers().contains_key(header_key(name).as_str())
    }

    fn get_server(&self, name: &str) -> Option<&str> {
        self.host.server_var(&name.to_ascii_lowercase())
    }

    fn get_content_type(&self) -> Option<&str> {
        self.host.header(header::CONTENT_TYPE.as_str())
    }

    fn get_http_host(&self) -> String {
        let host = self
            .host
            .header(header::HOST.as_str())
            .filter(|h| !h.trim().is_empty())
            .or_else(|| self.get_server(server_keys::SERVER_NAME))
            .or_else(|| self.get_server(server_keys::SERVER_ADDR))
            .unwrap_or("");

        strip_port(host.trim()).to_ascii_lowercase()
    }

    fn get_port(&self) -> u16 {
        let Some(host) = self.host.header(header::HOST.as_str()) else {
            return self
                .get_server(server_keys::SERVER_PORT)
                .and_then(|p| p.parse().ok())
                .unwrap_or(80);
        };

        host.rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or(if self.is_secure() { 443 } else { 80 })
    }

    fn get_scheme(&self) -> &'static str {
        match self.get_server(server_keys::HTTPS) {
            Some(https) if !https.is_empty() && !https.eq_ignore_ascii_case("off") => "https",
            _ => "http",
        }
    }

    fn get_uri(&self, only_path: bool) -> &str {
        let uri = self.host.uri();
        if only_path {
            return uri.path();
        }
        uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
    }

    fn get_method(&self) -> &str {
        self.host.method().as_str()
    }

    fn get_server_address(&self) -> &str {
        self.get_server(server_keys::SERVER_ADDR)
            .unwrap_or("127.0.0.1")
    }

    fn get_server_name(&self) -> &str {
        self.get_server(server_keys::SERVER_NAME)
            .filter(|name| !name.is_empty())
            .unwrap_or("localhost")
    }

    fn get_client_address(&self, trust_forwarded: bool) -> Option<&str> {
        let mut address = None;
        if trust_forwarded {
            address = self
                .host
                .header("x-forwarded-for")
                .or_else(|| self.host.header("client-ip"));
        }

        let address = address.or_else(|| self.get_server(server_keys::REMOTE_ADDR))?;
        address.split(',').next().map(str::trim)
    }

    fn get_raw_body(&self) -> &Bytes {
        self.host.raw_body()
    }

    fn is_method<M: MethodSet>(&self, methods: M, strict: bool) -> Result<bool> {
        let current = self.get_method();
        let mut matched = false;

        for method in methods.method_names() {
            if strict && !is_valid_http_method(method) {
                return Err(Error::InvalidMethod(method.to_string()));
            }
            matched |= method == current;
        }

        Ok(matched)
    }

    fn is_soap(&self) -> bool {
        self.has_header("soapaction")
            || self
                .get_content_type()
                .is_some_and(|ct| ct.contains("application/soap+xml"))
    }

    fn get_uploaded_files(&self, only_successful: bool) -> Vec<File> {
        file::flatten(self.host.files(), only_successful)
    }

    fn num_files(&self, only_successful: bool) -> usize {
        file::count(self.host.files(), only_successful)
    }

    fn get_acceptable_content(&self) -> Vec<QualityItem> {
        self.quality_header("accept", "accept")
    }

    fn get_client_charsets(&self) -> Vec<QualityItem> {
        self.quality_header("accept-charset", "charset")
    }

    fn get_languages(&self) -> Vec<QualityItem> {
        self.quality_header("accept-language", "language")
    }

    fn get_basic_auth(&self) -> Option<BasicAuth> {
        let username = self.get_server(server_keys::AUTH_USER)?;
        let password = self.get_server(server_keys::AUTH_PW)?;
        Some(BasicAuth {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn get_digest_auth(&self) -> Vec<(String, String)> {
        let Some(digest) = self.get_server(server_keys::AUTH_DIGEST) else {
            return Vec::new();
        };

        DIGEST_PAIR
            .captures_iter(digest)
            .map(|caps| {
                let value = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|m| m.as_str())
                    .unwrap_or("");
                (caps[1].to_string(), value.to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::filter::Sanitizer;
    use crate::host::ConnectionInfo;
    use crate::types::UploadedFile;

    fn request(method: &str, uri: &str, headers: &[(&str, &str)], body: &str) -> Request {
        let mut builder = HostRequest::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        Request::new(builder.body(body.to_string()).build().unwrap())
    }

    fn scalar(s: &str) -> ParamValue {
        ParamValue::from(s)
    }

    const FORM: (&str, &str) = ("content-type", "application/x-www-form-urlencoded");

    #[test]
    fn test_combined_view_precedence() {
        let req = request(
            "POST",
            "/?a=query&b=query",
            &[FORM, ("cookie", "b=cookie")],
            "a=body",
        );

        assert_eq!(req.get("a"), Some(&scalar("body")));
        assert_eq!(req.get("b"), Some(&scalar("cookie")));
        let keys: Vec<&str> = req.request_params().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(req.has("a"));
        assert!(!req.has("missing"));
        assert_eq!(req.get("missing"), None);
    }

    #[test]
    fn test_lookup_defaults_and_empty() {
        let req = request("GET", "/?zero=0&empty=&list[]=", &[], "");

        let fallback = Lookup::new().default_value("d").not_allow_empty();
        assert_eq!(req.get_with("missing", &fallback).unwrap(), Some(scalar("d")));
        assert_eq!(req.get_with("empty", &fallback).unwrap(), Some(scalar("d")));
        assert_eq!(req.get_with("zero", &fallback).unwrap(), Some(scalar("0")));
        assert_eq!(
            req.get_with("empty", &Lookup::new().default_value("d")).unwrap(),
            Some(scalar(""))
        );
        assert_eq!(req.get_with("missing", &Lookup::new()).unwrap(), None);
    }

    #[test]
    fn test_filters_require_capability() {
        let req = request("GET", "/?n=12abc", &[], "");
        let lookup = Lookup::new().filter("int");

        assert!(matches!(
            req.get_query_with("n", &lookup),
            Err(Error::FilterUnavailable)
        ));

        let req = req.with_filter(Arc::new(Sanitizer::new()));
        assert_eq!(req.get_query_with("n", &lookup).unwrap(), Some(scalar("12")));
        assert!(matches!(
            req.get_query_with("n", &Lookup::new().filter("bogus")),
            Err(Error::UnknownFilter(_))
        ));
    }

    #[test]
    fn test_filter_rejection_yields_default() {
        let sanitizer = Sanitizer::new().with_rule("digits", |v| {
            v.bytes().all(|b| b.is_ascii_digit()).then(|| v.to_string())
        });
        let req = request("GET", "/?id=x1", &[], "").with_filter(Arc::new(sanitizer));

        let lookup = Lookup::new().filter("digits").default_value("0");
        assert_eq!(req.get_with("id", &lookup).unwrap(), Some(scalar("0")));
    }

    #[test]
    fn test_post_and_put_sources() {
        let post = request("POST", "/", &[FORM], "name=ann");
        assert_eq!(post.get_post("name"), Some(&scalar("ann")));
        assert!(post.has_post("name"));
        assert!(!post.has_put("name"));

        let put = request("PUT", "/", &[FORM], "name=bob");
        assert_eq!(put.get_put("name"), Some(&scalar("bob")));
        assert!(put.post_params().is_empty());
        assert_eq!(put.get("name"), Some(&scalar("bob")));
    }

    #[test]
    fn test_post_json_fallback() {
        let req = request(
            "POST",
            "/",
            &[("content-type", "application/json")],
            r#"{"name":"ann","tags":["a","b"]}"#,
        );

        assert_eq!(req.get_post("name"), Some(&scalar("ann")));
        assert_eq!(
            req.get_post("tags").and_then(|t| t.get("1")),
            Some(&scalar("b"))
        );
        assert_eq!(
            req.get_json_raw_body().and_then(|v| v["name"].as_str().map(String::from)),
            Some("ann".to_string())
        );
    }

    #[test]
    fn test_json_body_failure_is_none() {
        #[derive(serde::Deserialize)]
        struct Payload {
            #[allow(dead_code)]
            id: u32,
        }

        let req = request("POST", "/", &[("content-type", "application/json")], "{oops");
        assert!(req.get_json_raw_body().is_none());
        assert!(req.get_json_raw_body_as::<Payload>().is_none());

        let req = request("POST", "/", &[], r#"{"id":7}"#);
        assert_eq!(req.get_json_raw_body_as::<Payload>().map(|p| p.id), Some(7));
    }

    #[test]
    fn test_header_normalization() {
        let req = request("GET", "/", &[("X-Foo", "bar"), ("accept", "a"), ("accept", "b")], "");

        assert_eq!(req.get_header("X-Foo"), "bar");
        assert_eq!(req.get_header("x_foo"), "bar");
        assert_eq!(req.get_header("missing"), "");
        assert!(req.has_header("X_FOO"));

        let headers = req.get_headers();
        assert!(headers.contains(&("X-Foo".to_string(), "bar".to_string())));
        assert!(headers.contains(&("Accept".to_string(), "a, b".to_string())));
    }

    #[test]
    fn test_server_lookup_is_per_key() {
        let req = request("GET", "/a?b=1", &[], "");

        assert_eq!(req.get_server("REQUEST_METHOD"), Some("GET"));
        assert_eq!(req.get_server("query_string"), Some("b=1"));
        assert_eq!(req.get_server("nope"), None);
        assert!(req.has_server("request_uri"));
    }

    #[test]
    fn test_host_port_and_scheme() {
        let req = request("GET", "/", &[("host", "Example.COM:8080")], "");
        assert_eq!(req.get_http_host(), "example.com");
        assert_eq!(req.get_port(), 8080);
        assert_eq!(req.get_scheme(), "http");

        let secure = Request::new(
            HostRequest::builder()
                .uri("/")
                .header("host", "example.com")
                .secure(true)
                .build()
                .unwrap(),
        );
        assert_eq!(secure.get_port(), 443);
        assert!(secure.is_secure());

        let bare = request("GET", "/", &[], "");
        assert_eq!(bare.get_http_host(), "127.0.0.1");
        assert_eq!(bare.get_port(), 80);
        assert_eq!(bare.get_server_name(), "localhost");
        assert_eq!(bare.get_server_address(), "127.0.0.1");
    }

    #[test]
    fn test_uri_and_method() {
        let req = request("DELETE", "/items/3?force=1", &[], "");
        assert_eq!(req.get_uri(false), "/items/3?force=1");
        assert_eq!(req.get_uri(true), "/items/3");
        assert_eq!(req.get_method(), "DELETE");
        assert!(req.is_delete());
        assert!(!req.is_get());
    }

    #[test]
    fn test_is_method() {
        let req = request("POST", "/", &[], "");

        assert!(req.is_method(["GET", "POST"], false).unwrap());
        assert!(req.is_method("POST", true).unwrap());
        assert!(!req.is_method("BOGUS", false).unwrap());
        assert!(matches!(
            req.is_method("BOGUS", true),
            Err(Error::InvalidMethod(m)) if m == "BOGUS"
        ));
        assert!(req.is_valid_http_method("purge"));
    }

    #[test]
    fn test_ajax_and_soap() {
        let req = request(
            "POST",
            "/",
            &[
                ("x-requested-with", "XMLHttpRequest"),
                ("content-type", "application/soap+xml; charset=utf-8"),
            ],
            "",
        );
        assert!(req.is_ajax());
        assert!(req.is_soap());

        let action = request("POST", "/", &[("soapaction", "urn:x")], "");
        assert!(action.is_soap());
        assert!(!action.is_ajax());
    }

    #[test]
    fn test_client_address() {
        let host = HostRequest::builder()
            .uri("/")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("client-ip", "198.51.100.2")
            .connection(ConnectionInfo {
                remote_addr: "10.0.0.5:4000".parse().unwrap(),
                ..ConnectionInfo::default()
            })
            .build()
            .unwrap();
        let req = Request::new(host);

        assert_eq!(req.get_client_address(false), Some("10.0.0.5"));
        assert_eq!(req.get_client_address(true), Some("203.0.113.9"));

        let client_ip = request("GET", "/", &[("client-ip", "198.51.100.2")], "");
        assert_eq!(client_ip.get_client_address(true), Some("198.51.100.2"));
    }

    #[test]
    fn test_negotiation() {
        let req = request(
            "GET",
            "/",
            &[
                ("accept", "text/html;q=0.8, application/json"),
                ("accept-charset", "iso-8859-1;q=0.5, utf-8;q=0.5"),
                ("accept-language", "en-US,en;q=0.9"),
            ],
            "",
        );

        assert_eq!(req.get_best_accept(), "application/json");
        assert_eq!(req.get_best_charset(), "iso-8859-1");
        assert_eq!(req.get_best_language(), "en-US");
        assert_eq!(req.get_languages().len(), 2);

        let none = request("GET", "/", &[], "");
        assert_eq!(none.get_best_language(), "");
        assert!(none.get_acceptable_content().is_empty());
    }

    #[test]
    fn test_client_charsets_in_arrival_order() {
        let req = request(
            "GET",
            "/",
            &[("accept-charset", "iso-8859-5, unicode-1-1;q=0.8")],
            "",
        );

        let charsets = req.get_client_charsets();
        assert_eq!(charsets.len(), 2);
        assert_eq!(charsets[0].value, "iso-8859-5");
        assert_eq!(charsets[0].quality, 1.0);
        assert_eq!(charsets[1].value, "unicode-1-1");
        assert_eq!(charsets[1].quality, 0.8);

        assert_eq!(
            serde_json::to_value(&charsets).unwrap(),
            serde_json::json!([
                {"charset": "iso-8859-5", "quality": 1.0},
                {"charset": "unicode-1-1", "quality": 0.8}
            ])
        );
        assert_eq!(
            serde_json::to_string(&charsets).unwrap(),
            r#"[{"charset":"iso-8859-5","quality":1.0},{"charset":"unicode-1-1","quality":0.8}]"#
        );
    }

    #[test]
    fn test_basic_auth() {
        let req = request("GET", "/", &[("authorization", "Basic YW5uOnMzY3JldA==")], "");
        assert_eq!(
            req.get_basic_auth(),
            Some(BasicAuth {
                username: "ann".to_string(),
                password: "s3cret".to_string(),
            })
        );
        assert_eq!(request("GET", "/", &[], "").get_basic_auth(), None);
    }

    #[test]
    fn test_digest_auth() {
        let req = request(
            "GET",
            "/",
            &[(
                "authorization",
                "Digest username=\"ann\", realm=\"my api\", nc=00000001, qop='auth'",
            )],
            "",
        );

        assert_eq!(
            req.get_digest_auth(),
            vec![
                ("username".to_string(), "ann".to_string()),
                ("realm".to_string(), "my api".to_string()),
                ("nc".to_string(), "00000001".to_string()),
                ("qop".to_string(), "auth".to_string()),
            ]
        );
        assert!(request("GET", "/", &[], "").get_digest_auth().is_empty());
    }

    #[test]
    fn test_uploaded_files() {
        let ok = UploadedFile {
            name: "a.txt".into(),
            mime_type: "text/plain".into(),
            tmp_name: "/tmp/upload-a".into(),
            size: 1,
            error: 0,
        };
        let missing = UploadedFile {
            name: String::new(),
            tmp_name: String::new(),
            size: 0,
            error: 4,
            ..ok.clone()
        };

        let host = HostRequest::builder()
            .method("POST")
            .uri("/")
            .file("docs[]", ok.clone())
            .file("docs[]", missing)
            .file("avatar", ok)
            .build()
            .unwrap();
        let req = Request::new(host);

        assert_eq!(req.num_files(false), 3);
        assert_eq!(req.num_files(true), 2);
        assert!(req.has_files());

        let named: Vec<String> = req
            .get_uploaded_files_named(false)
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(named, vec!["docs.0", "docs.1", "avatar"]);
        assert_eq!(req.get_uploaded_files(true).len(), 2);
    }
}
