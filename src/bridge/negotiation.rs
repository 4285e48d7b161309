//! Quality-value parsing for `Accept`, `Accept-Charset` and `Accept-Language`.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// One entry of a quality-weighted header.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityItem {
    /// Result key for the value: `accept`, `charset` or `language`.
    pub kind: &'static str,
    pub value: String,
    pub quality: f64,
    /// Extra `key=value` parameters other than `q`.
    pub params: Vec<(String, String)>,
}

impl Serialize for QualityItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.params.len()))?;
        map.serialize_entry(self.kind, &self.value)?;
        map.serialize_entry("quality", &self.quality)?;
        for (key, value) in &self.params {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Split a header into quality items in arrival order.
///
/// Entries are separated by `,`, parameters by `;`. A missing or unparsable
/// `q` counts as 1.0. Empty entries are skipped.
pub fn parse_quality_header(header: &str, kind: &'static str) -> Vec<QualityItem> {
    let mut items = Vec::new();

    for entry in header.split(',') {
        let mut parts = entry.split(';').map(str::trim);
        let value = match parts.next() {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => continue,
        };

        let mut quality = 1.0;
        let mut params = Vec::new();
        for part in parts {
            let Some((key, val)) = part.split_once('=') else {
                continue;
            };
            let (key, val) = (key.trim(), val.trim());
            if key.eq_ignore_ascii_case("q") {
                quality = val.parse::<f64>().unwrap_or(1.0);
            } else {
                params.push((key.to_string(), val.to_string()));
            }
        }

        items.push(QualityItem {
            kind,
            value,
            quality,
            params,
        });
    }

    items
}

/// Value with the highest quality; the first one wins on ties.
pub fn best_quality(items: &[QualityItem]) -> &str {
    let mut best: Option<&QualityItem> = None;
    for item in items {
        if best.map_or(true, |b| item.quality > b.quality) {
            best = Some(item);
        }
    }
    best.map(|item| item.value.as_str()).unwrap_or("")
}
