//! Sanitizing filters applied by `get_with` lookups.
//!
//! The request adapter never looks a filter up on its own; one is handed to
//! it explicitly with [`Request::with_filter`](super::Request::with_filter).

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::core::{Error, Result};
use crate::types::ParamValue;

/// Sanitizing capability.
pub trait Filter: Send + Sync {
    /// Apply one rule to a scalar. `Ok(None)` means the rule rejected the value.
    fn apply(&self, value: &str, rule: &str) -> Result<Option<String>>;

    /// Apply rules in order to a parameter value.
    ///
    /// Arrays are filtered member by member, dropping rejected members. With
    /// `no_recursive` an array is not descended into and is rejected as a whole.
    fn sanitize(
        &self,
        value: &ParamValue,
        rules: &[String],
        no_recursive: bool,
    ) -> Result<Option<ParamValue>> {
        match value {
            ParamValue::Scalar(s) => {
                let mut current = s.clone();
                for rule in rules {
                    match self.apply(&current, rule)? {
                        Some(next) => current = next,
                        None => return Ok(None),
                    }
                }
                Ok(Some(ParamValue::Scalar(current)))
            }
            ParamValue::Array(_) if no_recursive => Ok(None),
            ParamValue::Array(items) => {
                let mut filtered = Vec::with_capacity(items.len());
                for (key, member) in items {
                    if let Some(clean) = self.sanitize(member, rules, false)? {
                        filtered.push((key.clone(), clean));
                    }
                }
                Ok(Some(ParamValue::Array(filtered)))
            }
        }
    }
}

type CustomRule = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Built-in sanitizer.
///
/// Rules: `absint`, `alnum`, `alpha`, `bool`, `email`, `float`, `int`,
/// `lower`, `string`, `striptags`, `trim`, `upper`, `upperfirst`, `url`.
/// Extra rules can be registered with [`Sanitizer::with_rule`].
#[derive(Clone, Default)]
pub struct Sanitizer {
    custom: HashMap<String, CustomRule>,
}

static TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag pattern"));

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom rule; it shadows a built-in rule of the same name.
    pub fn with_rule<F>(mut self, name: &str, rule: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.custom.insert(name.to_ascii_lowercase(), Arc::new(rule));
        self
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.custom.keys().collect();
        names.sort();
        f.debug_struct("Sanitizer")
            .field("custom", &names)
            .finish()
    }
}

impl Filter for Sanitizer {
    fn apply(&self, value: &str, rule: &str) -> Result<Option<String>> {
        let rule = rule.trim().to_ascii_lowercase();
        if let Some(custom) = self.custom.get(&rule) {
            return Ok(custom(value));
        }

        let out = match rule.as_str() {
            "absint" => leading_int(&keep_number_chars(value, false))
                .unsigned_abs()
                .to_string(),
            "int" => leading_int(&keep_number_chars(value, false)).to_string(),
            "float" => leading_float(&keep_number_chars(value, true)).to_string(),
            "alnum" => value.chars().filter(|c| c.is_alphanumeric()).collect(),
            "alpha" => value.chars().filter(|c| c.is_alphabetic()).collect(),
            "bool" => {
                let truthy = matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "on" | "yes" | "y"
                );
                if truthy { "1" } else { "0" }.to_string()
            }
            "email" => value
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-=?^_`{|}~@.[]".contains(*c))
                .collect(),
            "url" => value
                .chars()
                .filter(|c| {
                    c.is_ascii_alphanumeric() || "$-_.+!*'(),{}|\\^~[]`<>#%\";/?:@&=".contains(*c)
                })
                .collect(),
            "lower" => value.to_lowercase(),
            "upper" => value.to_uppercase(),
            "upperfirst" => {
                let mut chars = value.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            "string" | "striptags" => TAGS.replace_all(value, "").into_owned(),
            "trim" => value.trim().to_string(),
            _ => return Err(Error::UnknownFilter(rule)),
        };

        Ok(Some(out))
    }
}

/// Keep digits and signs (and `.`/exponent markers for floats).
fn keep_number_chars(value: &str, fraction: bool) -> String {
    value
        .chars()
        .filter(|c| {
            c.is_ascii_digit() || *c == '+' || *c == '-' || (fraction && matches!(c, '.' | 'e' | 'E'))
        })
        .collect()
}

/// Integer value of the longest numeric prefix; 0 when there is none.
fn leading_int(s: &str) -> i64 {
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+') | Some(b'-')));
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    s[..end].parse().unwrap_or(0)
}

/// Float value of the longest numeric prefix; 0 when there is none.
///
/// The prefix is `[sign] digits [. digits] [e [sign] digits]`, scanned once.
/// Values past the `f64` range saturate to the largest finite magnitude.
fn leading_float(s: &str) -> f64 {
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let start = usize::from(matches!(bytes.first(), Some(b'+') | Some(b'-')));
    let mut end = digits_from(start);
    let mut mantissa_digits = end - start;
    if bytes.get(end) == Some(&b'.') {
        let fraction_end = digits_from(end + 1);
        mantissa_digits += fraction_end - end - 1;
        end = fraction_end;
    }
    if mantissa_digits == 0 {
        return 0.0;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let exp_start = end + 1 + usize::from(matches!(bytes.get(end + 1), Some(b'+') | Some(b'-')));
        let exp_end = digits_from(exp_start);
        if exp_end > exp_start {
            end = exp_end;
        }
    }

    match s[..end].parse::<f64>() {
        Ok(f) if f.is_infinite() => f64::MAX.copysign(f),
        Ok(f) => f,
        Err(_) => 0.0,
    }
}
