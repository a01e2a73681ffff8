//! Form/schema detector.
//!
//! Inspects the root element and namespaces of a parsed notice and classifies
//! it as TED-legacy (sub-typed by form number, e.g. F02/F03) or eForms UBL
//! (sub-typed by notice root element). The classification vocabulary is a
//! versioned YAML lookup table (`config/forms.yaml`) loaded as data.

use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

/// Source schema family of a notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormFamily {
    /// Legacy TED publication schema; `form` is the form number, e.g. `F02`.
    TedLegacy { form: String },
    /// eForms UBL; `notice_type` is the root element, e.g. `ContractNotice`.
    EForms { notice_type: String },
    /// Neither family could be determined. Not an error: the pipeline still
    /// produces a minimal release from the always-applicable extractors.
    Unknown,
}

impl fmt::Display for FormFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormFamily::TedLegacy { form } => write!(f, "TED {}", form),
            FormFamily::EForms { notice_type } => write!(f, "eForms {}", notice_type),
            FormFamily::Unknown => write!(f, "unknown"),
        }
    }
}

/// OCDS release profile of a form: what kind of release it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormProfile {
    /// Human-readable form name.
    pub name: String,
    /// OCDS release tags, e.g. `["award", "contract"]`.
    pub tags: Vec<String>,
    /// OCDS initiation type, `tender` for all current forms.
    pub initiation_type: String,
}

/// Result of classifying one notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormClassification {
    pub family: FormFamily,
    /// Release profile from the forms table; `None` when the family was
    /// recognized but the specific form is not in the table.
    pub profile: Option<FormProfile>,
}

impl FormClassification {
    /// A classification for an undetermined document.
    pub fn unknown() -> Self {
        Self {
            family: FormFamily::Unknown,
            profile: None,
        }
    }

    /// True when a form family was determined.
    pub fn is_known(&self) -> bool {
        self.family != FormFamily::Unknown
    }
}

// Wire format of forms.yaml.

#[derive(Debug, Deserialize)]
struct FormsFile {
    #[serde(default)]
    version: Option<String>,
    ted: TedSection,
    eforms: EformsSection,
}

#[derive(Debug, Deserialize)]
struct TedSection {
    form_pattern: String,
    #[serde(default)]
    namespaces: Vec<String>,
    forms: IndexMap<String, FormProfile>,
}

#[derive(Debug, Deserialize)]
struct EformsSection {
    #[serde(default)]
    namespaces: Vec<String>,
    roots: IndexMap<String, FormProfile>,
}

/// Default forms table shipped with the crate.
const EMBEDDED_FORMS: &str = include_str!("../config/forms.yaml");

/// Loaded classification vocabulary.
#[derive(Debug, Clone)]
pub struct FormTable {
    version: String,
    ted_pattern: Regex,
    ted_namespaces: Vec<String>,
    ted_forms: IndexMap<String, FormProfile>,
    eforms_namespaces: Vec<String>,
    eforms_roots: IndexMap<String, FormProfile>,
}

impl FormTable {
    /// Load the embedded default table.
    pub fn embedded() -> Result<Self, String> {
        Self::from_yaml_str(EMBEDDED_FORMS)
    }

    /// Load a forms table from a YAML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, has invalid format, or
    /// carries an invalid form pattern.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read forms table {}: {}", path.display(), e))?;
        Self::from_yaml_str(&contents)
    }

    /// Parse a forms table from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        let file: FormsFile = serde_yaml::from_str(yaml)
            .map_err(|e| format!("Failed to parse forms table: {}", e))?;

        let ted_pattern = Regex::new(&file.ted.form_pattern)
            .map_err(|e| format!("Invalid TED form pattern: {}", e))?;

        Ok(Self {
            version: file.version.unwrap_or_default(),
            ted_pattern,
            ted_namespaces: file.ted.namespaces,
            ted_forms: file.ted.forms,
            eforms_namespaces: file.eforms.namespaces,
            eforms_roots: file.eforms.roots,
        })
    }

    /// Table version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Classify a parsed document.
    ///
    /// Never fails; a document matching neither family classifies as
    /// `Unknown`.
    pub fn classify(&self, doc: &roxmltree::Document) -> FormClassification {
        let root = doc.root_element();
        let root_name = root.tag_name().name();
        let root_ns = root.tag_name().namespace().unwrap_or("");

        // eForms: UBL notice root element or namespace.
        if self.eforms_roots.contains_key(root_name)
            || self.eforms_namespaces.iter().any(|ns| ns == root_ns)
        {
            return FormClassification {
                profile: self.eforms_roots.get(root_name).cloned(),
                family: FormFamily::EForms {
                    notice_type: root_name.to_string(),
                },
            };
        }

        // TED legacy: the form element is either the root itself or nested
        // under TED_EXPORT/FORM_SECTION.
        if let Some(form) = self.ted_form_number(root_name) {
            return self.ted_classification(form);
        }
        if root_name == "TED_EXPORT" || self.ted_namespaces.iter().any(|ns| ns == root_ns) {
            for node in root.descendants().filter(|n| n.is_element()) {
                if let Some(form) = self.ted_form_number(node.tag_name().name()) {
                    return self.ted_classification(form);
                }
            }
        }

        FormClassification::unknown()
    }

    /// Extract the form number from an element name like `F02_2014`.
    fn ted_form_number(&self, element_name: &str) -> Option<String> {
        self.ted_pattern
            .captures(element_name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn ted_classification(&self, form: String) -> FormClassification {
        FormClassification {
            profile: self.ted_forms.get(&form).cloned(),
            family: FormFamily::TedLegacy { form },
        }
    }
}
