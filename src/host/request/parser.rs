//! Request parsing utilities.

use std::borrow::Cow;

use crate::types::{NestedBuilder, ParamList, ParamValue};

/// Percent decode a form component; `+` means space.
///
/// Returns a borrowed slice when nothing needs decoding.
#[inline]
pub fn form_decode(s: &str) -> Cow<'_, str> {
    if !s.contains(['%', '+']) {
        return Cow::Borrowed(s);
    }

    let spaced = s.replace('+', " ");
    Cow::Owned(
        percent_encoding::percent_decode_str(&spaced)
            .decode_utf8_lossy()
            .into_owned(),
    )
}

/// Parse a query string into parameters.
///
/// Bracketed keys (`tags[]=a`, `user[name]=x`) build nested arrays; a
/// repeated plain key keeps the last value. Pairs over the input limits are
/// dropped.
pub fn parse_query_string(query: &str) -> ParamList {
    let mut params = NestedBuilder::new();

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = match pair.find('=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, ""),
        };

        if key.is_empty() {
            continue;
        }

        params.insert(
            &form_decode(key),
            ParamValue::Scalar(form_decode(value).into_owned()),
        );
    }

    params.finish()
}

/// Parse an `application/x-www-form-urlencoded` body.
pub fn parse_form(body: &[u8]) -> ParamList {
    parse_query_string(&String::from_utf8_lossy(body))
}

/// Parse a Cookie header into name-value pairs.
pub fn parse_cookies(cookie_header: &str) -> ParamList {
    let mut cookies = NestedBuilder::new();

    for cookie in cookie_header.split(';') {
        let cookie = cookie.trim();
        if cookie.is_empty() {
            continue;
        }

        let (name, value) = match cookie.find('=') {
            Some(pos) => (cookie[..pos].trim(), cookie[pos + 1..].trim()),
            None => continue,
        };

        if name.is_empty() {
            continue;
        }

        let value = percent_encoding::percent_decode_str(value.trim_matches('"'))
            .decode_utf8_lossy()
            .into_owned();
        cookies.insert(name, ParamValue::Scalar(value));
    }

    cookies.finish()
}

/// Top-level members of a JSON object body as parameters.
///
/// Strings are taken verbatim, other scalars use their JSON text, nested
/// objects and arrays become nested parameter arrays. Non-object bodies yield
/// no parameters.
pub fn parse_json_object(body: &[u8]) -> ParamList {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(members)) => members
            .into_iter()
            .map(|(key, value)| (key, json_to_param(value)))
            .collect(),
        _ => Vec::new(),
    }
}

fn json_to_param(value: serde_json::Value) -> ParamValue {
    match value {
        serde_json::Value::String(s) => ParamValue::Scalar(s),
        serde_json::Value::Null => ParamValue::Scalar(String::new()),
        serde_json::Value::Array(items) => ParamValue::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), json_to_param(v)))
                .collect(),
        ),
        serde_json::Value::Object(members) => ParamValue::Array(
            members
                .into_iter()
                .map(|(k, v)| (k, json_to_param(v)))
                .collect(),
        ),
        other => ParamValue::Scalar(other.to_string()),
    }
}
