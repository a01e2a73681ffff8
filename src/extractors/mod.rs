//! Built-in business-term extractors.
//!
//! Each extractor is a pure function of the parsed notice producing one
//! OCDS-shaped fragment; the assembler owns all merge behavior. Extractors
//! handle the form families they apply to and return `Ok(None)` otherwise.
//! The set here covers every release entity collection for both families; it
//! is representative, not exhaustive over the several hundred business terms
//! the eForms standard defines.

pub mod awards;
pub mod bids;
pub mod notice;
pub mod parties;
pub mod tender;

use roxmltree::Node;
use serde_json::{json, Value};

use crate::detect::{FormClassification, FormFamily};
use crate::document::Notice;
use crate::fragment::Fragment;
use crate::registry::BtExtractor;

/// Default ocid prefix used by the built-in registry.
pub const DEFAULT_OCID_PREFIX: &str = "ocds-213czf";

/// The built-in extractor set, ready for registry construction.
pub fn builtin() -> Vec<Box<dyn BtExtractor>> {
    builtin_with_prefix(DEFAULT_OCID_PREFIX)
}

/// Built-in extractors with a custom ocid prefix.
pub fn builtin_with_prefix(ocid_prefix: &str) -> Vec<Box<dyn BtExtractor>> {
    vec![
        Box::new(notice::NoticeMetadata::new(ocid_prefix)),
        Box::new(notice::DispatchDate),
        Box::new(parties::Buyer),
        Box::new(parties::EuFunds),
        Box::new(tender::ProcedureTitle),
        Box::new(tender::ProcedureDescription),
        Box::new(tender::ProcedureType),
        Box::new(tender::EstimatedValue),
        Box::new(tender::Lots),
        Box::new(tender::LotGroups),
        Box::new(tender::MainClassification),
        Box::new(tender::SubmissionDeadline),
        Box::new(tender::ProcurementDocuments),
        Box::new(awards::AwardResults),
        Box::new(awards::Contracts),
        Box::new(bids::BidStatistics),
        Box::new(bids::TenderDetails),
        Box::new(bids::WithheldInformation),
        Box::new(bids::PreviousPublication),
    ]
}

/// Wrap an extractor's JSON output as a fragment.
///
/// Non-object output is an extractor bug and reported as a failure, not
/// silently dropped.
pub(crate) fn fragment(value: Value) -> Result<Option<Fragment>, String> {
    match Fragment::from_value(value) {
        Some(f) => Ok(Some(f)),
        None => Err("extractor produced a non-object fragment".to_string()),
    }
}

pub(crate) fn is_ted(classification: &FormClassification) -> bool {
    matches!(classification.family, FormFamily::TedLegacy { .. })
}

pub(crate) fn is_eforms(classification: &FormClassification) -> bool {
    matches!(classification.family, FormFamily::EForms { .. })
}

/// TED award-type forms, the ones carrying result sections.
pub(crate) fn is_ted_award(classification: &FormClassification) -> bool {
    match &classification.family {
        FormFamily::TedLegacy { form } => {
            matches!(form.as_str(), "F03" | "F06" | "F13" | "F25")
        }
        _ => false,
    }
}

pub(crate) fn is_eforms_award(classification: &FormClassification) -> bool {
    matches!(
        &classification.family,
        FormFamily::EForms { notice_type } if notice_type == "ContractAwardNotice"
    )
}

/// True for TED form container element names such as `F02_2014`.
pub(crate) fn is_ted_form_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 4
        && bytes[0] == b'F'
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && bytes[3] == b'_'
}

/// The TED form container (`F02_2014` etc.), whether it is the document root
/// or nested under `TED_EXPORT/FORM_SECTION`.
pub(crate) fn ted_form<'a, 'input>(notice: &Notice<'a, 'input>) -> Option<Node<'a, 'input>> {
    let root = notice.root();
    if is_ted_form_name(root.tag_name().name()) {
        return Some(root);
    }
    root.descendants()
        .find(|n| n.is_element() && is_ted_form_name(n.tag_name().name()))
}

/// Build an OCDS value object from an amount string and optional currency.
pub(crate) fn money(amount: &str, currency: Option<String>) -> Option<Value> {
    let amount: f64 = amount.trim().parse().ok()?;
    let mut value = json!({ "amount": amount });
    if let Some(currency) = currency {
        value["currency"] = json!(currency);
    }
    Some(value)
}

/// Map a notice language to the lowercase two-letter form OCDS uses.
///
/// TED publishes ISO 639-1 (`EN`); eForms publishes ISO 639-3 (`ENG`). The
/// table covers the EU publication languages; anything unlisted passes
/// through lowercased.
pub(crate) fn language_code(raw: &str) -> String {
    let raw = raw.trim();
    match raw.to_ascii_uppercase().as_str() {
        "BUL" => "bg",
        "CES" | "CZE" => "cs",
        "DAN" => "da",
        "DEU" | "GER" => "de",
        "ELL" | "GRE" => "el",
        "ENG" => "en",
        "EST" => "et",
        "FIN" => "fi",
        "FRA" | "FRE" => "fr",
        "GLE" => "ga",
        "HRV" => "hr",
        "HUN" => "hu",
        "ITA" => "it",
        "LAV" => "lv",
        "LIT" => "lt",
        "MLT" => "mt",
        "NLD" | "DUT" => "nl",
        "POL" => "pl",
        "POR" => "pt",
        "RON" | "RUM" => "ro",
        "SLK" | "SLO" => "sk",
        "SLV" => "sl",
        "SPA" => "es",
        "SWE" => "sv",
        other => return other.to_ascii_lowercase(),
    }
    .to_string()
}
