//! The Release: root aggregate assembled for one notice.
//!
//! An ordered JSON object plus a hashed id index per identity-keyed
//! collection. Created empty, mutated in place by successive merges, frozen
//! before emission. No entity is ever deleted during assembly.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// One navigation step into the release tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Object key.
    Key(String),
    /// Array position.
    Item(usize),
}

/// A concrete location in the release tree.
///
/// The logical form (object keys only, array positions skipped) addresses the
/// merge-hint schema; the concrete form addresses the actual node and keys
/// the id index.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    steps: Vec<Step>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor for a dotted keys-only path such as `tender.lots`.
    pub fn from_dotted(path: &str) -> Self {
        Self {
            steps: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| Step::Key(s.to_string()))
                .collect(),
        }
    }

    pub fn push_key(&mut self, key: &str) {
        self.steps.push(Step::Key(key.to_string()));
    }

    pub fn push_item(&mut self, pos: usize) {
        self.steps.push(Step::Item(pos));
    }

    pub fn pop(&mut self) {
        self.steps.pop();
    }

    /// Object keys only, for schema lookup.
    pub fn logical(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                Step::Key(k) => Some(k.as_str()),
                Step::Item(_) => None,
            })
            .collect()
    }

    /// Concrete form including array positions, e.g. `tender.lots[0].value`.
    pub fn concrete(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            match step {
                Step::Key(k) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(k);
                }
                Step::Item(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }

    /// Dotted logical form, for messages and index keys of top-level
    /// collections.
    pub fn dotted(&self) -> String {
        self.logical().join(".")
    }

    fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// The release being assembled.
#[derive(Debug, Clone)]
pub struct Release {
    root: Value,
    /// concrete collection path -> record id -> position.
    index: HashMap<String, HashMap<String, usize>>,
    frozen: bool,
}

impl Release {
    /// Create an empty release.
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
            index: HashMap::new(),
            frozen: false,
        }
    }

    /// Mark the release read-only. Subsequent merges are rejected.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Borrow the release as a JSON value.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Consume the release into its JSON value.
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Navigate a dotted keys-only path, e.g. `tender.title`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        let mut node = &self.root;
        for key in dotted.split('.').filter(|s| !s.is_empty()) {
            node = node.get(key)?;
        }
        Some(node)
    }

    /// Node at a cursor, if present.
    pub fn node(&self, cursor: &Cursor) -> Option<&Value> {
        let mut node = &self.root;
        for step in cursor.steps() {
            node = match step {
                Step::Key(k) => node.get(k.as_str())?,
                Step::Item(i) => node.get(*i)?,
            };
        }
        Some(node)
    }

    /// Mutable node at a cursor, creating intermediate objects for missing
    /// keys. A non-object intermediate is replaced by an object (last write
    /// wins on type conflicts). Array positions must already exist.
    pub fn node_mut(&mut self, cursor: &Cursor) -> Option<&mut Value> {
        let mut node = &mut self.root;
        for step in cursor.steps() {
            match step {
                Step::Key(k) => {
                    if !node.is_object() {
                        *node = Value::Object(Map::new());
                    }
                    let map = node.as_object_mut()?;
                    node = map.entry(k.clone()).or_insert(Value::Null);
                }
                Step::Item(i) => {
                    node = node.get_mut(*i)?;
                }
            }
        }
        Some(node)
    }

    /// Overwrite the node at a cursor.
    pub fn set(&mut self, cursor: &Cursor, value: Value) {
        if let Some(node) = self.node_mut(cursor) {
            *node = value;
        }
    }

    /// Ensure the node at a cursor is an array, replacing any non-array
    /// value, and return it.
    pub fn array_mut(&mut self, cursor: &Cursor) -> Option<&mut Vec<Value>> {
        let node = self.node_mut(cursor)?;
        if !node.is_array() {
            *node = Value::Array(Vec::new());
        }
        node.as_array_mut()
    }

    /// Records of a collection at a cursor.
    pub fn records(&self, cursor: &Cursor) -> Option<&Vec<Value>> {
        self.node(cursor).and_then(Value::as_array)
    }

    /// Position of a record id within a collection, via the hashed index.
    ///
    /// The index for a collection is built on first touch so arrays created
    /// by earlier non-identity merges are picked up.
    pub fn position_of(&mut self, cursor: &Cursor, id: &str) -> Option<usize> {
        self.index_collection(cursor);
        self.index.get(&cursor.concrete())?.get(id).copied()
    }

    /// True when a record with this id exists in the collection.
    pub fn contains_id(&mut self, cursor: &Cursor, id: &str) -> bool {
        self.position_of(cursor, id).is_some()
    }

    /// Append a record to a collection and index it.
    ///
    /// The record must carry the given id; the caller guarantees the id is
    /// not already present (§3: no two records share an id).
    pub fn append_record(&mut self, cursor: &Cursor, id: &str, record: Value) -> usize {
        self.index_collection(cursor);
        let key = cursor.concrete();
        let arr = match self.array_mut(cursor) {
            Some(arr) => arr,
            None => return 0,
        };
        arr.push(record);
        let pos = arr.len() - 1;
        self.index
            .entry(key)
            .or_default()
            .insert(id.to_string(), pos);
        pos
    }

    /// Next free synthetic id for a collection: `len + 1`, probing upward
    /// past any natively numbered records.
    pub fn next_synthetic_id(&mut self, cursor: &Cursor) -> String {
        self.index_collection(cursor);
        let len = self.records(cursor).map(Vec::len).unwrap_or(0);
        let taken = self.index.get(&cursor.concrete());
        let mut candidate = len + 1;
        loop {
            let id = candidate.to_string();
            match taken {
                Some(ids) if ids.contains_key(&id) => candidate += 1,
                _ => return id,
            }
        }
    }

    /// Build the id index for a collection if not yet built.
    fn index_collection(&mut self, cursor: &Cursor) {
        let key = cursor.concrete();
        if self.index.contains_key(&key) {
            return;
        }
        let mut ids = HashMap::new();
        if let Some(records) = self.records(cursor) {
            for (pos, record) in records.iter().enumerate() {
                if let Some(id) = crate::fragment::record_id(record) {
                    ids.insert(id, pos);
                }
            }
        }
        self.index.insert(key, ids);
    }
}

impl Default for Release {
    fn default() -> Self {
        Self::new()
    }
}
