//! Selectable asset references.
//!
//! Asset listing services return loosely shaped JSON. [`normalize_listing`]
//! folds the known variants into [`AssetRef`] so nothing downstream has to
//! care which service produced the listing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A logo or photo that can be placed on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Stable identifier from the listing service.
    pub id: String,
    /// Fetchable URL of the asset bytes.
    pub url: String,
    /// Display name.
    pub filename: String,
}

const ID_KEYS: [&str; 3] = ["public_id", "asset_id", "id"];
const URL_KEYS: [&str; 2] = ["secure_url", "url"];
const NAME_KEYS: [&str; 3] = ["filename", "original_filename", "display_name"];

/// Normalize a listing response into asset references.
///
/// Accepts a bare array or an object wrapping the array in `resources` or
/// `assets`. Entries without an id or url are dropped.
#[must_use]
pub fn normalize_listing(listing: &Value) -> Vec<AssetRef> {
    let entries = match listing {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("resources").or_else(|| map.get("assets")) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let assets: Vec<AssetRef> = entries.iter().filter_map(normalize_entry).collect();
    if assets.len() < entries.len() {
        tracing::debug!(
            dropped = entries.len() - assets.len(),
            "listing entries without id or url skipped"
        );
    }
    assets
}

fn normalize_entry(entry: &Value) -> Option<AssetRef> {
    let id = first_string(entry, &ID_KEYS)?;
    let url = first_string(entry, &URL_KEYS)?;
    let filename = first_string(entry, &NAME_KEYS).unwrap_or_else(|| last_segment(&url));
    Some(AssetRef { id, url, filename })
}

fn first_string(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match entry.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn last_segment(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}
