//! Identity resolution for records without native ids.
//!
//! Some source notices carry entities with no identifier of their own (the
//! synthetic "European Union" funder party is the canonical case). The first
//! fragment to mention such an entity creates it with a generated id; every
//! later fragment naming the same entity must resolve to that record, not
//! create a duplicate. Synthetic ids are `len + 1` at creation time, which is
//! reproducible because the extractor run order is fixed by the registry.

use serde_json::{Map, Value};

use crate::fragment::record_id;
use crate::release::{Cursor, Release};

/// Resolve a record in an identity-keyed collection by natural key, creating
/// it when no record matches.
///
/// # Arguments
/// * `collection` - Dotted collection path, e.g. `parties`
/// * `predicate` - Natural-key match, e.g. `party.name == "European Union"`
/// * `factory` - Builds the new record (given its assigned id) when no
///   record matches
///
/// # Returns
/// The resolved id, stable across calls for the same release.
///
/// # Errors
/// Fails on a frozen release or a factory that does not produce an object.
pub fn resolve_or_create<P, F>(
    release: &mut Release,
    collection: &str,
    predicate: P,
    factory: F,
) -> Result<String, String>
where
    P: Fn(&Value) -> bool,
    F: FnOnce(&str) -> Value,
{
    resolve_or_create_at(release, &Cursor::from_dotted(collection), predicate, factory)
}

/// Cursor-addressed form of [`resolve_or_create`], used by the assembler for
/// collections it is already positioned at.
pub(crate) fn resolve_or_create_at<P, F>(
    release: &mut Release,
    cursor: &Cursor,
    predicate: P,
    factory: F,
) -> Result<String, String>
where
    P: Fn(&Value) -> bool,
    F: FnOnce(&str) -> Value,
{
    if release.is_frozen() {
        return Err(format!(
            "cannot resolve '{}' in a frozen release",
            cursor.dotted()
        ));
    }

    if let Some(records) = release.records(cursor) {
        for record in records {
            if predicate(record) {
                if let Some(id) = record_id(record) {
                    return Ok(id);
                }
            }
        }
    }

    let id = release.next_synthetic_id(cursor);
    let mut record = match factory(&id) {
        Value::Object(map) => map,
        other => {
            return Err(format!(
                "factory for '{}' produced a non-object record: {}",
                cursor.dotted(),
                other
            ));
        }
    };
    // The resolver owns id assignment; a factory-set id is overridden.
    record.insert("id".to_string(), Value::String(id.clone()));
    release.append_record(cursor, &id, Value::Object(record));

    Ok(id)
}

/// Resolve by equality on a string field, e.g. parties by `name`.
pub fn resolve_by_key(
    release: &mut Release,
    collection: &str,
    key: &str,
    value: &str,
) -> Result<String, String> {
    resolve_by_key_at(release, &Cursor::from_dotted(collection), key, value)
}

/// Cursor-addressed form of [`resolve_by_key`].
pub(crate) fn resolve_by_key_at(
    release: &mut Release,
    cursor: &Cursor,
    key: &str,
    value: &str,
) -> Result<String, String> {
    resolve_or_create_at(
        release,
        cursor,
        |record| record.get(key).and_then(Value::as_str) == Some(value),
        |_id| {
            let mut map = Map::new();
            map.insert(key.to_string(), Value::String(value.to_string()));
            Value::Object(map)
        },
    )
}
