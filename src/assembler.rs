//! Release assembler: the schema-directed deep merge.
//!
//! Applies extractor fragments to the release one at a time, in registry
//! order, maintaining the release invariants: ids are unique and never
//! reassigned, role-like arrays behave as sets, monetary values replace
//! atomically, scalars are last-write-wins. Malformed records are skipped
//! per-record with a warning; a fragment never aborts the merge.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::Warning;
use crate::fragment::{record_id, Fragment};
use crate::identity;
use crate::release::{Cursor, Release};
use crate::schema::{MergePolicy, MergeSchema};

/// The merge engine. Stateless apart from the schema it consults.
pub struct Assembler<'s> {
    schema: &'s MergeSchema,
}

impl<'s> Assembler<'s> {
    pub fn new(schema: &'s MergeSchema) -> Self {
        Self { schema }
    }

    /// Merge one fragment into the release.
    ///
    /// An empty fragment is a no-op. Mutates the release in place; never
    /// fails for well-formed fragments. Records that cannot be addressed
    /// (no `id`, no resolvable natural key) are skipped with a warning and
    /// the rest of the fragment still merges.
    pub fn merge_fragment(
        &self,
        release: &mut Release,
        fragment: &Fragment,
        warnings: &mut Vec<Warning>,
    ) {
        if release.is_frozen() {
            warn!("merge into frozen release ignored");
            warnings.push(Warning::FrozenRelease);
            return;
        }
        if fragment.is_empty() {
            return;
        }

        let mut cursor = Cursor::new();
        for (key, value) in fragment.entries() {
            cursor.push_key(key);
            self.merge_value(release, &mut cursor, value, warnings);
            cursor.pop();
        }
    }

    /// Merge one value at the cursor under the effective policy.
    fn merge_value(
        &self,
        release: &mut Release,
        cursor: &mut Cursor,
        incoming: &Value,
        warnings: &mut Vec<Warning>,
    ) {
        // Null never overwrites; extractors signal absence by omission.
        if incoming.is_null() {
            return;
        }

        match self.effective_policy(cursor, incoming) {
            MergePolicy::Identity { natural_key } => {
                self.merge_identity(release, cursor, incoming, natural_key.as_deref(), warnings);
            }
            MergePolicy::SetUnion => self.merge_set_union(release, cursor, incoming),
            MergePolicy::Atomic | MergePolicy::Scalar => {
                release.set(cursor, incoming.clone());
            }
            MergePolicy::DeepMerge => self.merge_object(release, cursor, incoming, warnings),
            MergePolicy::Reference { collection, key } => {
                self.merge_reference(release, cursor, incoming, &collection, &key, warnings);
            }
        }
    }

    /// Declared policy for the cursor's logical path, else inferred from the
    /// incoming shape: objects deep-merge, arrays of id-carrying records are
    /// identity collections, other arrays are set unions, scalars overwrite.
    fn effective_policy(&self, cursor: &Cursor, incoming: &Value) -> MergePolicy {
        let keys = cursor.logical();
        if let Some(policy) = self.schema.policy_for(&keys) {
            return policy.clone();
        }
        match incoming {
            Value::Object(_) => MergePolicy::DeepMerge,
            Value::Array(items) => {
                if !items.is_empty()
                    && items.iter().all(|v| v.is_object() && record_id(v).is_some())
                {
                    MergePolicy::Identity { natural_key: None }
                } else {
                    MergePolicy::SetUnion
                }
            }
            _ => MergePolicy::Scalar,
        }
    }

    /// Key-by-key merge of an object.
    fn merge_object(
        &self,
        release: &mut Release,
        cursor: &mut Cursor,
        incoming: &Value,
        warnings: &mut Vec<Warning>,
    ) {
        let Some(map) = incoming.as_object() else {
            // Declared deep-merge but a scalar arrived: last write wins.
            release.set(cursor, incoming.clone());
            return;
        };
        for (key, value) in map {
            cursor.push_key(key);
            self.merge_value(release, cursor, value, warnings);
            cursor.pop();
        }
    }

    /// Order-preserving set union of a plain array.
    fn merge_set_union(&self, release: &mut Release, cursor: &Cursor, incoming: &Value) {
        let Some(items) = incoming.as_array() else {
            release.set(cursor, incoming.clone());
            return;
        };
        let Some(target) = release.array_mut(cursor) else {
            return;
        };
        for item in items {
            if !target.contains(item) {
                target.push(item.clone());
            }
        }
    }

    /// Record-by-record merge of an identity-keyed collection.
    fn merge_identity(
        &self,
        release: &mut Release,
        cursor: &mut Cursor,
        incoming: &Value,
        natural_key: Option<&str>,
        warnings: &mut Vec<Warning>,
    ) {
        let Some(records) = incoming.as_array() else {
            self.skip_record(
                cursor,
                "identity-keyed collection received a non-array value",
                warnings,
            );
            return;
        };

        for record in records {
            let Some(fields) = record.as_object() else {
                self.skip_record(cursor, "identity-keyed record is not an object", warnings);
                continue;
            };

            let id = match record_id(record) {
                Some(id) => id,
                None => {
                    let natural = natural_key.and_then(|nk| {
                        record.get(nk).and_then(Value::as_str).map(|v| (nk, v))
                    });
                    match natural {
                        Some((nk, value)) => {
                            match identity::resolve_by_key_at(release, cursor, nk, value) {
                                Ok(id) => id,
                                Err(reason) => {
                                    self.skip_record(cursor, &reason, warnings);
                                    continue;
                                }
                            }
                        }
                        None => {
                            self.skip_record(
                                cursor,
                                "record has no id and no resolvable natural key",
                                warnings,
                            );
                            continue;
                        }
                    }
                }
            };

            // Appending the id-only shell first and deep-merging every field
            // through the regular policy walk keeps set/atomic semantics
            // uniform for first writes and overlays alike.
            let pos = match release.position_of(cursor, &id) {
                Some(pos) => pos,
                None => release.append_record(cursor, &id, json!({ "id": id.clone() })),
            };

            cursor.push_item(pos);
            for (key, value) in fields {
                if key == "id" {
                    continue;
                }
                cursor.push_key(key);
                self.merge_value(release, cursor, value, warnings);
                cursor.pop();
            }
            cursor.pop();
        }
    }

    /// Merge an organization-reference object, resolving a missing id
    /// against the referenced collection by natural key.
    ///
    /// On an array path (e.g. award suppliers) each element is resolved and
    /// then merged into the target array as an identity record.
    fn merge_reference(
        &self,
        release: &mut Release,
        cursor: &mut Cursor,
        incoming: &Value,
        collection: &str,
        key: &str,
        warnings: &mut Vec<Warning>,
    ) {
        if let Some(items) = incoming.as_array() {
            for item in items {
                let Some(fields) = item.as_object() else {
                    self.skip_record(cursor, "reference element is not an object", warnings);
                    continue;
                };
                let id = match record_id(item) {
                    Some(id) => id,
                    None => {
                        let Some(value) = fields.get(key).and_then(Value::as_str) else {
                            self.skip_record(
                                cursor,
                                "reference has neither id nor natural key",
                                warnings,
                            );
                            continue;
                        };
                        match identity::resolve_by_key(release, collection, key, value) {
                            Ok(id) => id,
                            Err(reason) => {
                                self.skip_record(cursor, &reason, warnings);
                                continue;
                            }
                        }
                    }
                };

                let pos = match release.position_of(cursor, &id) {
                    Some(pos) => pos,
                    None => release.append_record(cursor, &id, json!({ "id": id.clone() })),
                };
                cursor.push_item(pos);
                for (field, value) in fields {
                    if field == "id" {
                        continue;
                    }
                    cursor.push_key(field);
                    self.merge_value(release, cursor, value, warnings);
                    cursor.pop();
                }
                cursor.pop();
            }
            return;
        }

        let Some(fields) = incoming.as_object() else {
            release.set(cursor, incoming.clone());
            return;
        };

        // A reference that already carries an id is preserved verbatim even
        // if it dangles; only unidentified references get resolved.
        if record_id(incoming).is_none() {
            if let Some(value) = fields.get(key).and_then(Value::as_str) {
                match identity::resolve_by_key(release, collection, key, value) {
                    Ok(id) => {
                        debug!(collection, key = value, id = %id, "resolved reference");
                        cursor.push_key("id");
                        release.set(cursor, Value::String(id));
                        cursor.pop();
                    }
                    Err(reason) => {
                        warnings.push(Warning::MalformedRecord {
                            collection: collection.to_string(),
                            reason,
                        });
                    }
                }
            }
        }

        for (field, value) in fields {
            cursor.push_key(field);
            self.merge_value(release, cursor, value, warnings);
            cursor.pop();
        }
    }

    fn skip_record(&self, cursor: &Cursor, reason: &str, warnings: &mut Vec<Warning>) {
        let collection = cursor.dotted();
        warn!(collection = %collection, reason, "skipped malformed record");
        warnings.push(Warning::MalformedRecord {
            collection,
            reason: reason.to_string(),
        });
    }
}
