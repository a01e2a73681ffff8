//! Merge-hint schema: declarative classification of release paths.
//!
//! The assembler is generic; everything it needs to know about a field is its
//! merge policy, looked up here. Policies are declared in YAML (embedded
//! default in `config/merge_schema.yaml`, overridable from a file) so the
//! entity layout of the output format stays data, not code.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// How a value at a given release path folds into the release.
#[derive(Debug, Clone, PartialEq)]
pub enum MergePolicy {
    /// Array of records addressed by `id`; merged record-by-record.
    /// `natural_key` names a field used to resolve records arriving without
    /// an `id` (e.g. parties by `name`).
    Identity { natural_key: Option<String> },
    /// Array merged as order-preserving set union, no duplicates.
    SetUnion,
    /// Object replaced wholesale, never field-merged.
    Atomic,
    /// Scalar, last write wins.
    Scalar,
    /// Object merged key-by-key.
    DeepMerge,
    /// Object referencing a record in another collection by a key field;
    /// resolved against that collection, creating the record if needed.
    Reference { collection: String, key: String },
}

/// One dotted path pattern. A `*` segment matches exactly one key.
///
/// Array-element descent does not extend the path, so fields of a lot record
/// live under `tender.lots.<field>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPath {
    raw: String,
    segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Key(String),
    Wildcard,
}

impl SchemaPath {
    /// Parse a dotted path, e.g. `tender.lots.value` or `*.value`.
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "*" {
                    PathSegment::Wildcard
                } else {
                    PathSegment::Key(s.to_string())
                }
            })
            .collect();

        Self {
            raw: path.to_string(),
            segments,
        }
    }

    /// Match against a concrete key chain.
    pub fn matches(&self, keys: &[&str]) -> bool {
        if self.segments.len() != keys.len() {
            return false;
        }
        self.segments.iter().zip(keys).all(|(seg, key)| match seg {
            PathSegment::Key(k) => k == key,
            PathSegment::Wildcard => true,
        })
    }

    /// Number of wildcard segments; fewer is more specific.
    fn wildcards(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, PathSegment::Wildcard))
            .count()
    }

    /// The raw dotted form.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// One declared rule: path pattern plus policy.
#[derive(Debug, Clone)]
struct Rule {
    path: SchemaPath,
    policy: MergePolicy,
}

/// The loaded merge-hint schema.
#[derive(Debug, Clone)]
pub struct MergeSchema {
    version: String,
    rules: Vec<Rule>,
}

// Wire format of merge_schema.yaml.

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    version: Option<String>,
    rules: Vec<RuleDef>,
}

#[derive(Debug, Deserialize)]
struct RuleDef {
    path: String,
    policy: PolicyDef,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PolicyDef {
    Identity {
        #[serde(default)]
        natural_key: Option<String>,
    },
    SetUnion,
    Atomic,
    Scalar,
    DeepMerge,
    Reference {
        collection: String,
        key: String,
    },
}

impl From<PolicyDef> for MergePolicy {
    fn from(def: PolicyDef) -> Self {
        match def {
            PolicyDef::Identity { natural_key } => MergePolicy::Identity { natural_key },
            PolicyDef::SetUnion => MergePolicy::SetUnion,
            PolicyDef::Atomic => MergePolicy::Atomic,
            PolicyDef::Scalar => MergePolicy::Scalar,
            PolicyDef::DeepMerge => MergePolicy::DeepMerge,
            PolicyDef::Reference { collection, key } => MergePolicy::Reference { collection, key },
        }
    }
}

/// Default schema shipped with the crate.
const EMBEDDED_SCHEMA: &str = include_str!("../config/merge_schema.yaml");

impl MergeSchema {
    /// Load the embedded default schema.
    pub fn embedded() -> Result<Self, String> {
        Self::from_yaml_str(EMBEDDED_SCHEMA)
    }

    /// Load a schema from a YAML file.
    ///
    /// # Arguments
    /// * `path` - Path to a merge schema YAML
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or has invalid format.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read merge schema {}: {}", path.display(), e))?;
        Self::from_yaml_str(&contents)
    }

    /// Parse a schema from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        let file: SchemaFile = serde_yaml::from_str(yaml)
            .map_err(|e| format!("Failed to parse merge schema: {}", e))?;

        let rules = file
            .rules
            .into_iter()
            .map(|def| Rule {
                path: SchemaPath::parse(&def.path),
                policy: def.policy.into(),
            })
            .collect();

        Ok(Self {
            version: file.version.unwrap_or_default(),
            rules,
        })
    }

    /// Schema version string from the file.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Declared policy for a key chain, if any.
    ///
    /// The most specific matching rule wins (fewest wildcards, then first
    /// declared). Unlisted paths return `None` and the assembler infers a
    /// policy from the value shapes instead.
    pub fn policy_for(&self, keys: &[&str]) -> Option<&MergePolicy> {
        self.rules
            .iter()
            .filter(|r| r.path.matches(keys))
            .min_by_key(|r| r.path.wildcards())
            .map(|r| &r.policy)
    }

    /// True when the path is a declared identity-keyed collection.
    pub fn is_identity_collection(&self, keys: &[&str]) -> bool {
        matches!(self.policy_for(keys), Some(MergePolicy::Identity { .. }))
    }
}
