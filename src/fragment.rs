//! Fragment: the partial output of one extractor.
//!
//! A fragment mirrors the release's shape but contains only the fields its
//! extractor produced, e.g. `{"tender": {"lots": [{"id": "LOT-0001", ...}]}}`.
//! Fragments are plain JSON values; the merge-hint schema, not the fragment,
//! decides how each path folds into the release.

use serde_json::{Map, Value};

/// Partial, address-keyed release data produced by one extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment(Map<String, Value>);

impl Fragment {
    /// Build a fragment from a JSON object.
    ///
    /// Returns `None` for non-object values; an extractor with nothing to
    /// contribute returns no fragment at all rather than an empty one.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Fragment(map)),
            _ => None,
        }
    }

    /// Build a fragment from an object map.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Fragment(map)
    }

    /// True when the fragment carries no fields. Merging it is a no-op.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Top-level entries of the fragment.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrow the underlying object map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the fragment into its object map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Read a record's `id` as a string.
///
/// OCDS ids are strings on the wire, but extractors occasionally produce
/// numeric lot or award numbers; those are coerced. Anything else counts as
/// missing.
pub fn record_id(record: &Value) -> Option<String> {
    match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
