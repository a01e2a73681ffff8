//! Notice-level metadata extractors: ocid, release id, language, tags,
//! dispatch date.

use serde_json::{json, Map, Value};

use crate::detect::{FormClassification, FormFamily};
use crate::document::{self, Notice};
use crate::fragment::Fragment;
use crate::registry::{BtExtractor, Group};

use super::{fragment, language_code, ted_form};

/// Base release metadata. Always applicable; an unclassifiable document
/// yields whatever can still be read, which may be nothing.
pub struct NoticeMetadata {
    ocid_prefix: String,
}

impl NoticeMetadata {
    pub fn new(ocid_prefix: &str) -> Self {
        Self {
            ocid_prefix: ocid_prefix.to_string(),
        }
    }

    /// ocid-safe form of a notice or procedure identifier.
    fn sanitize(raw: &str) -> String {
        raw.trim()
            .chars()
            .map(|c| if c == '/' || c.is_whitespace() { '-' } else { c })
            .collect()
    }
}

impl BtExtractor for NoticeMetadata {
    fn id(&self) -> &'static str {
        "notice-metadata"
    }

    fn group(&self) -> Group {
        Group::Notice
    }

    fn bt(&self) -> u16 {
        1
    }

    fn applies_to(&self, _classification: &FormClassification) -> bool {
        true
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let mut out = Map::new();

        let (notice_id, procedure_id, language) = match notice.family() {
            FormFamily::TedLegacy { .. } => {
                let notice_id = notice
                    .descendant("NO_DOC_OJS")
                    .and_then(document::text_of);
                let language = notice
                    .descendant("LG_ORIG")
                    .and_then(document::text_of)
                    .or_else(|| ted_form(notice).and_then(|f| document::attr(f, "LG")));
                // TED has no separate procedure identifier; the notice
                // number anchors the ocid.
                (notice_id.clone(), notice_id, language)
            }
            FormFamily::EForms { .. } => {
                let notice_id = notice.text(&["ID"]);
                let folder = notice.text(&["ContractFolderID"]);
                let language = notice.text(&["NoticeLanguageCode"]);
                (notice_id, folder, language)
            }
            FormFamily::Unknown => (None, None, None),
        };

        if let Some(id) = notice_id {
            out.insert("id".to_string(), json!(id));
        }
        if let Some(procedure) = procedure_id {
            out.insert(
                "ocid".to_string(),
                json!(format!("{}-{}", self.ocid_prefix, Self::sanitize(&procedure))),
            );
        }
        if let Some(lang) = language {
            out.insert("language".to_string(), json!(language_code(&lang)));
        }
        if let Some(profile) = &notice.classification().profile {
            out.insert("tag".to_string(), json!(profile.tags));
            out.insert(
                "initiationType".to_string(),
                json!(profile.initiation_type),
            );
        }

        if out.is_empty() {
            return Ok(None);
        }
        fragment(Value::Object(out))
    }
}

/// BT-05: notice dispatch date, mapped to the release date.
pub struct DispatchDate;

impl BtExtractor for DispatchDate {
    fn id(&self) -> &'static str {
        "bt-05-dispatch-date"
    }

    fn group(&self) -> Group {
        Group::Notice
    }

    fn bt(&self) -> u16 {
        5
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        classification.is_known()
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let raw = match notice.family() {
            FormFamily::TedLegacy { .. } => notice
                .descendant("DATE_DISPATCH_NOTICE")
                .and_then(document::text_of),
            FormFamily::EForms { .. } => notice.text(&["IssueDate"]),
            FormFamily::Unknown => None,
        };

        let Some(raw) = raw else {
            return Ok(None);
        };
        let date = document::normalize_date(&raw)
            .ok_or_else(|| format!("unrecognized dispatch date '{}'", raw))?;
        fragment(json!({ "date": date }))
    }
}
