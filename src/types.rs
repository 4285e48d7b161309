//! Core types for request parameters and uploaded files.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered key-value list for parameters (faster than HashMap for small collections).
pub type ParamList = Vec<(String, ParamValue)>;

/// Uploaded files keyed by form field name.
pub type FileList = Vec<(String, FileEntry)>;

/// Upload finished without errors.
pub const UPLOAD_ERR_OK: u8 = 0;
/// File exceeds the configured upload size limit.
pub const UPLOAD_ERR_SIZE: u8 = 1;
/// Field was submitted without a file.
pub const UPLOAD_ERR_NO_FILE: u8 = 4;

// =============================================================================
// Parameter values
// =============================================================================

/// A request parameter: a scalar, or a nested array built from bracket keys
/// such as `tags[]=a` or `user[name]=x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Scalar(String),
    Array(ParamList),
}

impl ParamValue {
    /// Scalar value, if this is not an array.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(s) => Some(s),
            ParamValue::Array(_) => None,
        }
    }

    /// Array members, if this is an array.
    #[inline]
    pub fn as_array(&self) -> Option<&ParamList> {
        match self {
            ParamValue::Scalar(_) => None,
            ParamValue::Array(items) => Some(items),
        }
    }

    /// Empty string or empty array.
    ///
    /// Numeric strings are never empty, so `"0"` survives a not-empty check.
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Scalar(s) => s.is_empty(),
            ParamValue::Array(items) => items.is_empty(),
        }
    }

    /// Look up a member of an array value.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.as_array().and_then(|items| find_param(items, key))
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Scalar(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Scalar(s)
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Scalar(s) => serializer.serialize_str(s),
            ParamValue::Array(items) => {
                let mut map = serializer.serialize_map(Some(items.len()))?;
                for (key, value) in items {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Find a parameter by exact key.
#[inline]
pub fn find_param<'a>(params: &'a ParamList, key: &str) -> Option<&'a ParamValue> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// Merge parameter sources in order.
///
/// A later source replaces the value of an existing key in place, so the key
/// keeps the position of its first occurrence.
pub fn merge_params(sources: &[&ParamList]) -> ParamList {
    let capacity = sources.iter().map(|s| s.len()).sum();
    let mut merged: ParamList = Vec::with_capacity(capacity);

    for source in sources {
        for (key, value) in source.iter() {
            match merged.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.clone(),
                None => merged.push((key.clone(), value.clone())),
            }
        }
    }

    merged
}

// =============================================================================
// Uploaded files
// =============================================================================

/// Represents an uploaded file from multipart form data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Original filename
    pub name: String,
    /// MIME type sent by the client
    pub mime_type: String,
    /// Temporary file path on disk (empty when nothing was stored)
    pub tmp_name: String,
    /// File size in bytes
    pub size: u64,
    /// Upload error code (0 = success)
    pub error: u8,
}

impl UploadedFile {
    /// Whether the upload finished without errors.
    #[inline]
    pub fn is_successful(&self) -> bool {
        self.error == UPLOAD_ERR_OK
    }
}

/// A file input: a single file, or a group for array-style names like `docs[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEntry {
    Single(UploadedFile),
    Group(FileList),
}

// =============================================================================
// Bracket-key nesting
// =============================================================================

/// Tree values that can hold nested groups.
pub(crate) trait Nested: Sized {
    fn group() -> Self;
    fn members_mut(&mut self) -> Option<&mut Vec<(String, Self)>>;
}

impl Nested for ParamValue {
    fn group() -> Self {
        ParamValue::Array(Vec::new())
    }

    fn members_mut(&mut self) -> Option<&mut Vec<(String, Self)>> {
        match self {
            ParamValue::Array(items) => Some(items),
            ParamValue::Scalar(_) => None,
        }
    }
}

impl Nested for FileEntry {
    fn group() -> Self {
        FileEntry::Group(Vec::new())
    }

    fn members_mut(&mut self) -> Option<&mut Vec<(String, Self)>> {
        match self {
            FileEntry::Group(items) => Some(items),
            FileEntry::Single(_) => None,
        }
    }
}

/// Deepest bracket nesting accepted in an input key (`a[b][c]` has depth 2).
pub const MAX_NESTING_DEPTH: usize = 64;

/// Most input variables accepted from one source (query, body, cookies,
/// multipart fields, multipart files).
pub const MAX_INPUT_VARS: usize = 1000;

/// Split `a[b][]` into `("a", ["b", ""])`.
///
/// Keys without brackets, keys starting with `[` and keys with an unclosed
/// bracket are treated literally. Text after the last `]` is ignored.
/// Returns `None` for keys nested deeper than [`MAX_NESTING_DEPTH`].
fn split_key(key: &str) -> Option<(&str, Vec<&str>)> {
    let open = match key.find('[') {
        Some(pos) if pos > 0 => pos,
        _ => return Some((key, Vec::new())),
    };

    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return Some((key, Vec::new()));
        };
        if segments.len() == MAX_NESTING_DEPTH {
            return None;
        }
        segments.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }

    Some((&key[..open], segments))
}

/// First free numeric index of a group that was not built here.
fn next_free_index<T>(items: &[(String, T)]) -> usize {
    items
        .iter()
        .filter_map(|(k, _)| k.parse::<usize>().ok())
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

/// Builds a parameter or file tree from bracketed keys.
///
/// The next append index (`[]`) is kept per group, so an append never rescans
/// its siblings. Inputs past [`MAX_INPUT_VARS`] and keys nested deeper than
/// [`MAX_NESTING_DEPTH`] are dropped.
pub(crate) struct NestedBuilder<T> {
    items: Vec<(String, T)>,
    /// Group path -> next append index.
    next_index: HashMap<String, usize>,
    accepted: usize,
    dropped: usize,
}

impl<T: Nested> NestedBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            next_index: HashMap::new(),
            accepted: 0,
            dropped: 0,
        }
    }

    /// Insert a value under a possibly bracketed key.
    ///
    /// Returns `false` when the value was dropped.
    pub(crate) fn insert(&mut self, key: &str, value: T) -> bool {
        if self.accepted >= MAX_INPUT_VARS {
            self.dropped += 1;
            return false;
        }
        let Some((base, segments)) = split_key(key) else {
            self.dropped += 1;
            return false;
        };
        if base.is_empty() {
            return false;
        }
        self.accepted += 1;

        let next_index = &mut self.next_index;
        let mut current = &mut self.items;
        let mut key = base.to_string();
        // Whether `key` is known to be absent from `current`.
        let mut fresh = false;
        let mut path = String::new();

        for segment in segments {
            // Length-prefixed so distinct key sequences never share a path.
            path.push_str(&key.len().to_string());
            path.push(':');
            path.push_str(&key);

            let existing = if fresh {
                None
            } else {
                current.iter().position(|(k, _)| *k == key)
            };
            let idx = match existing {
                Some(idx) if current[idx].1.members_mut().is_some() => idx,
                Some(idx) => {
                    current[idx].1 = T::group();
                    next_index.insert(path.clone(), 0);
                    idx
                }
                None => {
                    current.push((key, T::group()));
                    next_index.insert(path.clone(), 0);
                    current.len() - 1
                }
            };

            let Some(members) = current[idx].1.members_mut() else {
                return false;
            };
            let counter = next_index
                .entry(path.clone())
                .or_insert_with(|| next_free_index(members.as_slice()));

            if segment.is_empty() {
                key = (*counter).to_string();
                fresh = *counter < usize::MAX;
                *counter = counter.saturating_add(1);
            } else {
                if let Ok(n) = segment.parse::<usize>() {
                    *counter = (*counter).max(n.saturating_add(1));
                }
                key = segment.to_string();
                fresh = false;
            }
            current = members;
        }

        if fresh {
            current.push((key, value));
        } else {
            match current.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => current.push((key, value)),
            }
        }
        true
    }

    /// Finished tree; logs how many inputs were dropped.
    pub(crate) fn finish(self) -> Vec<(String, T)> {
        if self.dropped > 0 {
            tracing::warn!(
                dropped = self.dropped,
                max_vars = MAX_INPUT_VARS,
                max_depth = MAX_NESTING_DEPTH,
                "input variables dropped"
            );
        }
        self.items
    }
}

/// Build a tree from `(key, value)` pairs.
pub(crate) fn nest<T, K, I>(pairs: I) -> Vec<(String, T)>
where
    T: Nested,
    K: AsRef<str>,
    I: IntoIterator<Item = (K, T)>,
{
    let mut builder = NestedBuilder::new();
    for (key, value) in pairs {
        builder.insert(key.as_ref(), value);
    }
    builder.finish()
}
