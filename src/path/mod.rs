//! Dotted-path value extraction
//!
//! Resolves a path such as `items.tag` or `items.0.tag` against a document:
//! - on an object, a segment selects the field of that name
//! - on an array, a numeric segment selects that element (out of range
//!   contributes nothing), any other segment is applied to every element
//! - a terminal array contributes its elements, one level deep
//! - `null` or missing intermediate values contribute nothing
//!
//! [`DistinctValues`] collects the extracted values without duplicates.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::{DataApiError, Result};

/// Split and validate a dotted path
///
/// # Arguments
/// * `path` - Dotted path, e.g. `items.0.tag`
///
/// # Returns
/// * `Result<Vec<&str>>` - Path segments, or an error for empty segments
pub fn parse_path(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() {
        return Err(DataApiError::InvalidArgument(
            "path must not be empty".to_string(),
        ));
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(DataApiError::InvalidArgument(format!(
            "path '{path}' contains an empty segment"
        )));
    }
    Ok(segments)
}

/// Extract every value found at `segments` in `value`
pub fn extract_values<'a>(value: &'a Value, segments: &[&str]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    walk(value, segments, &mut out);
    out
}

fn walk<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        match value {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(other),
        }
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(*segment) {
                walk(child, rest, out);
            }
        }
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(child) = items.get(index) {
                    walk(child, rest, out);
                }
            }
            // Fan out: the same segment applies to every element
            Err(_) => {
                for item in items {
                    walk(item, segments, out);
                }
            }
        },
        _ => {}
    }
}

/// Projection path for a distinct query: the prefix before the first numeric segment
pub fn projection_prefix(segments: &[&str]) -> String {
    segments
        .iter()
        .take_while(|segment| segment.parse::<usize>().is_err())
        .copied()
        .collect::<Vec<_>>()
        .join(".")
}

/// Insertion-ordered set of JSON values
///
/// Values are keyed by their canonical JSON rendering; object keys are kept
/// sorted by `serde_json::Map`, so structurally equal objects collide.
#[derive(Debug, Default)]
pub struct DistinctValues {
    seen: HashSet<String>,
    values: Vec<Value>,
}

impl DistinctValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, returning whether it was new
    pub fn insert(&mut self, value: &Value) -> bool {
        let key = value.to_string();
        if self.seen.insert(key) {
            self.values.push(value.clone());
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
