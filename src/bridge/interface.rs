//! Request and response contracts consumed by framework code.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::file::File;
use super::method::{
    MethodSet, METHOD_CONNECT, METHOD_DELETE, METHOD_GET, METHOD_HEAD, METHOD_OPTIONS,
    METHOD_PATCH, METHOD_POST, METHOD_PURGE, METHOD_PUT, METHOD_TRACE,
};
use super::negotiation::{best_quality, QualityItem};
use super::request::{BasicAuth, Lookup};
use crate::core::Result;
use crate::types::{ParamList, ParamValue};

/// Read-only view of one incoming request.
pub trait RequestInterface {
    // Parameters

    /// Value from the combined query, body and cookie view.
    fn get(&self, name: &str) -> Option<&ParamValue>;
    /// Combined-view lookup with default, emptiness check and filters.
    fn get_with(&self, name: &str, lookup: &Lookup) -> Result<Option<ParamValue>>;
    /// The whole combined view.
    fn request_params(&self) -> &ParamList;

    fn get_query(&self, name: &str) -> Option<&ParamValue>;
    fn get_query_with(&self, name: &str, lookup: &Lookup) -> Result<Option<ParamValue>>;
    fn query_params(&self) -> &ParamList;

    fn get_post(&self, name: &str) -> Option<&ParamValue>;
    fn get_post_with(&self, name: &str, lookup: &Lookup) -> Result<Option<ParamValue>>;
    fn post_params(&self) -> &ParamList;

    fn get_put(&self, name: &str) -> Option<&ParamValue>;
    fn get_put_with(&self, name: &str, lookup: &Lookup) -> Result<Option<ParamValue>>;
    fn put_params(&self) -> &ParamList;

    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn has_query(&self, name: &str) -> bool {
        self.get_query(name).is_some()
    }

    fn has_post(&self, name: &str) -> bool {
        self.get_post(name).is_some()
    }

    fn has_put(&self, name: &str) -> bool {
        self.get_put(name).is_some()
    }

    // Headers and server metadata

    /// Header value; `_` and `-` and letter case are interchangeable in `name`.
    /// Empty when absent.
    fn get_header(&self, name: &str) -> &str;
    /// All headers with `Title-Case` names.
    fn get_headers(&self) -> Vec<(String, String)>;
    fn has_header(&self, name: &str) -> bool;

    fn get_server(&self, name: &str) -> Option<&str>;

    fn has_server(&self, name: &str) -> bool {
        self.get_server(name).is_some()
    }

    fn get_content_type(&self) -> Option<&str>;

    fn get_user_agent(&self) -> &str {
        self.get_header("user-agent")
    }

    fn get_http_referer(&self) -> &str {
        self.get_header("referer")
    }

    fn get_http_host(&self) -> String;
    fn get_port(&self) -> u16;
    fn get_scheme(&self) -> &'static str;
    fn get_uri(&self, only_path: bool) -> &str;
    fn get_method(&self) -> &str;
    fn get_server_address(&self) -> &str;
    fn get_server_name(&self) -> &str;
    fn get_client_address(&self, trust_forwarded: bool) -> Option<&str>;

    // Body

    fn get_raw_body(&self) -> &Bytes;

    /// Body decoded as JSON; `None` when it is not valid JSON.
    fn get_json_raw_body(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(self.get_raw_body()).ok()
    }

    /// Body decoded as JSON into `T`; `None` on any decode failure.
    fn get_json_raw_body_as<T: DeserializeOwned>(&self) -> Option<T>
    where
        Self: Sized,
    {
        serde_json::from_slice(self.get_raw_body()).ok()
    }

    // Method checks

    fn is_get(&self) -> bool {
        self.get_method() == METHOD_GET
    }

    fn is_post(&self) -> bool {
        self.get_method() == METHOD_POST
    }

    fn is_put(&self) -> bool {
        self.get_method() == METHOD_PUT
    }

    fn is_patch(&self) -> bool {
        self.get_method() == METHOD_PATCH
    }

    fn is_delete(&self) -> bool {
        self.get_method() == METHOD_DELETE
    }

    fn is_head(&self) -> bool {
        self.get_method() == METHOD_HEAD
    }

    fn is_options(&self) -> bool {
        self.get_method() == METHOD_OPTIONS
    }

    fn is_connect(&self) -> bool {
        self.get_method() == METHOD_CONNECT
    }

    fn is_trace(&self) -> bool {
        self.get_method() == METHOD_TRACE
    }

    fn is_purge(&self) -> bool {
        self.get_method() == METHOD_PURGE
    }

    /// Whether the request method equals any of `methods`.
    ///
    /// With `strict`, every candidate must be a known HTTP verb or
    /// [`Error::InvalidMethod`](crate::core::Error::InvalidMethod) is returned.
    fn is_method<M: MethodSet>(&self, methods: M, strict: bool) -> Result<bool>
    where
        Self: Sized;

    fn is_valid_http_method(&self, method: &str) -> bool {
        super::method::is_valid_http_method(method)
    }

    fn is_ajax(&self) -> bool {
        self.get_header("x-requested-with") == "XMLHttpRequest"
    }

    fn is_secure(&self) -> bool {
        self.get_scheme() == "https"
    }

    fn is_soap(&self) -> bool;

    // Files

    fn get_uploaded_files(&self, only_successful: bool) -> Vec<File>;

    /// Uploaded files paired with their dotted keys.
    fn get_uploaded_files_named(&self, only_successful: bool) -> Vec<(String, File)> {
        self.get_uploaded_files(only_successful)
            .into_iter()
            .map(|file| (file.key().to_string(), file))
            .collect()
    }

    fn num_files(&self, only_successful: bool) -> usize;

    fn has_files(&self) -> bool {
        self.num_files(true) > 0
    }

    // Negotiation

    fn get_acceptable_content(&self) -> Vec<QualityItem>;
    fn get_client_charsets(&self) -> Vec<QualityItem>;
    fn get_languages(&self) -> Vec<QualityItem>;

    fn get_best_accept(&self) -> String {
        best_quality(&self.get_acceptable_content()).to_string()
    }

    fn get_best_charset(&self) -> String {
        best_quality(&self.get_client_charsets()).to_string()
    }

    fn get_best_language(&self) -> String {
        best_quality(&self.get_languages()).to_string()
    }

    // Authentication

    fn get_basic_auth(&self) -> Option<BasicAuth>;
    fn get_digest_auth(&self) -> Vec<(String, String)>;
}

/// Writable facade over a live response.
///
/// Setters forward to the connection immediately and return `&mut Self` for
/// chaining. A change the connection refuses (for example a header after the
/// body started) is logged and otherwise ignored.
pub trait ResponseInterface {
    fn set_status_code(&mut self, code: u16, reason: Option<&str>) -> &mut Self;
    fn get_status_code(&self) -> u16;
    fn get_reason_phrase(&self) -> Option<&str>;

    fn set_header(&mut self, name: &str, value: &str) -> &mut Self;
    /// Either a `Name: value` line or an `HTTP/x.y CODE Reason` status line.
    fn set_raw_header(&mut self, raw: &str) -> &mut Self;
    fn remove_header(&mut self, name: &str) -> &mut Self;
    fn has_header(&self, name: &str) -> bool;
    fn get_headers(&self) -> Vec<(String, String)>;

    /// Write `content` to the connection and keep it as the response content.
    fn set_content(&mut self, content: impl Into<Bytes>) -> &mut Self
    where
        Self: Sized;
    /// Write `content` to the connection and append it to the stored content.
    fn append_content(&mut self, content: impl Into<Bytes>) -> &mut Self
    where
        Self: Sized;
    fn get_content(&self) -> &[u8];

    /// Whether the status line and headers already went out.
    fn is_sent(&self) -> bool;

    fn set_content_type(&mut self, content_type: &str, charset: Option<&str>) -> &mut Self {
        match charset {
            Some(charset) => {
                let value = format!("{}; charset={}", content_type, charset);
                self.set_header("content-type", &value)
            }
            None => self.set_header("content-type", content_type),
        }
    }

    fn set_content_length(&mut self, length: u64) -> &mut Self {
        self.set_header("content-length", &length.to_string())
    }

    fn set_etag(&mut self, etag: &str) -> &mut Self {
        self.set_header("etag", etag)
    }

    fn set_not_modified(&mut self) -> &mut Self {
        self.set_status_code(304, Some("Not modified"))
    }

    /// Serialize `value` as the JSON content, setting `application/json`
    /// unless a content type is already present.
    fn set_json_content<T: Serialize + ?Sized>(&mut self, value: &T) -> &mut Self
    where
        Self: Sized;

    /// Redirect to `location`. Status defaults to 302 and must be 3xx.
    fn redirect(&mut self, location: &str, status: Option<u16>) -> &mut Self {
        let code = status.filter(|code| (300..=308).contains(code)).unwrap_or(302);
        self.set_status_code(code, None).set_header("location", location)
    }
}
