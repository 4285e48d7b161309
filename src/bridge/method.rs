//! HTTP method names understood by the request adapter.

pub const METHOD_CONNECT: &str = "CONNECT";
pub const METHOD_DELETE: &str = "DELETE";
pub const METHOD_GET: &str = "GET";
pub const METHOD_HEAD: &str = "HEAD";
pub const METHOD_OPTIONS: &str = "OPTIONS";
pub const METHOD_PATCH: &str = "PATCH";
pub const METHOD_POST: &str = "POST";
/// Cache invalidation verb used by Squid and Varnish.
pub const METHOD_PURGE: &str = "PURGE";
pub const METHOD_PUT: &str = "PUT";
pub const METHOD_TRACE: &str = "TRACE";

const KNOWN_METHODS: [&str; 10] = [
    METHOD_CONNECT,
    METHOD_DELETE,
    METHOD_GET,
    METHOD_HEAD,
    METHOD_OPTIONS,
    METHOD_PATCH,
    METHOD_POST,
    METHOD_PURGE,
    METHOD_PUT,
    METHOD_TRACE,
];

/// Check if a name is a known HTTP method (case-insensitive).
pub fn is_valid_http_method(method: &str) -> bool {
    KNOWN_METHODS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(method))
}

/// One method name or a list of them, as accepted by `is_method`.
pub trait MethodSet {
    fn method_names(&self) -> Vec<&str>;
}

impl MethodSet for str {
    fn method_names(&self) -> Vec<&str> {
        vec![self]
    }
}

impl MethodSet for String {
    fn method_names(&self) -> Vec<&str> {
        vec![self.as_str()]
    }
}

impl MethodSet for [&str] {
    fn method_names(&self) -> Vec<&str> {
        self.to_vec()
    }
}

impl<const N: usize> MethodSet for [&str; N] {
    fn method_names(&self) -> Vec<&str> {
        self.to_vec()
    }
}

impl MethodSet for Vec<&str> {
    fn method_names(&self) -> Vec<&str> {
        self.clone()
    }
}

impl MethodSet for [String] {
    fn method_names(&self) -> Vec<&str> {
        self.iter().map(String::as_str).collect()
    }
}

impl MethodSet for Vec<String> {
    fn method_names(&self) -> Vec<&str> {
        self.iter().map(String::as_str).collect()
    }
}

impl<T: MethodSet + ?Sized> MethodSet for &T {
    fn method_names(&self) -> Vec<&str> {
        (**self).method_names()
    }
}
