//! Tender extractors: procedure fields, lots, lot groups, items, documents,
//! submission deadline.

use roxmltree::Node;
use serde_json::{json, Value};

use crate::detect::{FormClassification, FormFamily};
use crate::document::{self, Notice};
use crate::fragment::Fragment;
use crate::registry::{BtExtractor, Group};

use super::{fragment, is_eforms, is_ted, money, ted_form};

/// TED `OBJECT_CONTRACT` section of the form, where the procedure object
/// lives.
fn ted_object<'a, 'input>(notice: &Notice<'a, 'input>) -> Option<Node<'a, 'input>> {
    ted_form(notice).and_then(|f| document::child(f, "OBJECT_CONTRACT"))
}

/// BT-21: procedure title.
pub struct ProcedureTitle;

impl BtExtractor for ProcedureTitle {
    fn id(&self) -> &'static str {
        "bt-21-title"
    }

    fn group(&self) -> Group {
        Group::Tender
    }

    fn bt(&self) -> u16 {
        21
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let title = match notice.family() {
            FormFamily::TedLegacy { .. } => {
                ted_object(notice).and_then(|o| document::child_text(o, "TITLE"))
            }
            FormFamily::EForms { .. } => notice.text(&["ProcurementProject", "Name"]),
            FormFamily::Unknown => None,
        };
        match title {
            Some(title) => fragment(json!({ "tender": { "title": title } })),
            None => Ok(None),
        }
    }
}

/// BT-24: procedure description.
pub struct ProcedureDescription;

impl BtExtractor for ProcedureDescription {
    fn id(&self) -> &'static str {
        "bt-24-description"
    }

    fn group(&self) -> Group {
        Group::Tender
    }

    fn bt(&self) -> u16 {
        24
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let description = match notice.family() {
            FormFamily::TedLegacy { .. } => {
                ted_object(notice).and_then(|o| document::child_text(o, "SHORT_DESCR"))
            }
            FormFamily::EForms { .. } => notice.text(&["ProcurementProject", "Description"]),
            FormFamily::Unknown => None,
        };
        match description {
            Some(description) => {
                fragment(json!({ "tender": { "description": description } }))
            }
            None => Ok(None),
        }
    }
}

/// BT-105: procedure type, mapped to the OCDS procurement method codelist.
pub struct ProcedureType;

impl ProcedureType {
    /// TED procedure elements to (method, details).
    const TED_PROCEDURES: &'static [(&'static str, &'static str, &'static str)] = &[
        ("PT_OPEN", "open", "Open procedure"),
        ("PT_RESTRICTED", "selective", "Restricted procedure"),
        (
            "PT_COMPETITIVE_NEGOTIATION",
            "selective",
            "Competitive procedure with negotiation",
        ),
        (
            "PT_COMPETITIVE_DIALOGUE",
            "selective",
            "Competitive dialogue",
        ),
        (
            "PT_INNOVATION_PARTNERSHIP",
            "selective",
            "Innovation partnership",
        ),
        (
            "PT_NEGOTIATED_WITHOUT_PUBLICATION",
            "limited",
            "Negotiated without prior publication",
        ),
    ];

    /// eForms procedure codes to (method, details).
    const EFORMS_PROCEDURES: &'static [(&'static str, &'static str, &'static str)] = &[
        ("open", "open", "Open procedure"),
        ("restricted", "selective", "Restricted procedure"),
        (
            "neg-w-call",
            "selective",
            "Negotiated with prior publication of a call for competition",
        ),
        (
            "neg-wo-call",
            "limited",
            "Negotiated without prior call for competition",
        ),
        ("comp-dial", "selective", "Competitive dialogue"),
        ("innovation", "selective", "Innovation partnership"),
    ];
}

impl BtExtractor for ProcedureType {
    fn id(&self) -> &'static str {
        "bt-105-procedure-type"
    }

    fn group(&self) -> Group {
        Group::Tender
    }

    fn bt(&self) -> u16 {
        105
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let mapped = match notice.family() {
            FormFamily::TedLegacy { .. } => {
                let procedure = ted_form(notice).and_then(|f| document::child(f, "PROCEDURE"));
                procedure.and_then(|p| {
                    Self::TED_PROCEDURES
                        .iter()
                        .find(|(element, _, _)| document::child(p, element).is_some())
                })
            }
            FormFamily::EForms { .. } => notice
                .find(&["TenderingProcess", "ProcedureCode"])
                .and_then(document::text_of)
                .and_then(|code| {
                    Self::EFORMS_PROCEDURES
                        .iter()
                        .find(|(c, _, _)| *c == code.as_str())
                }),
            FormFamily::Unknown => None,
        };

        match mapped {
            Some((_, method, details)) => fragment(json!({
                "tender": {
                    "procurementMethod": method,
                    "procurementMethodDetails": details
                }
            })),
            None => Ok(None),
        }
    }
}

/// BT-27: estimated total value of the procedure.
pub struct EstimatedValue;

impl BtExtractor for EstimatedValue {
    fn id(&self) -> &'static str {
        "bt-27-estimated-value"
    }

    fn group(&self) -> Group {
        Group::Tender
    }

    fn bt(&self) -> u16 {
        27
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let value = match notice.family() {
            FormFamily::TedLegacy { .. } => ted_object(notice)
                .and_then(|o| document::child(o, "VAL_ESTIMATED_TOTAL"))
                .and_then(|node| {
                    money(
                        &document::text_of(node)?,
                        document::attr(node, "CURRENCY"),
                    )
                }),
            FormFamily::EForms { .. } => notice
                .find(&[
                    "ProcurementProject",
                    "RequestedTenderTotal",
                    "EstimatedOverallContractAmount",
                ])
                .and_then(|node| {
                    money(
                        &document::text_of(node)?,
                        document::attr(node, "currencyID"),
                    )
                }),
            FormFamily::Unknown => None,
        };
        match value {
            Some(value) => fragment(json!({ "tender": { "value": value } })),
            None => Ok(None),
        }
    }
}

/// BT-137: lots. TED numbers lots with `LOT_NO`; eForms identifies them with
/// `LOT-xxxx` ids.
pub struct Lots;

impl Lots {
    fn ted(notice: &Notice) -> Option<Value> {
        let object = ted_object(notice)?;
        let descrs = document::children(object, "OBJECT_DESCR");
        if descrs.is_empty() {
            return None;
        }

        let lots: Vec<Value> = descrs
            .iter()
            .enumerate()
            .map(|(i, descr)| {
                let id = document::child_text(*descr, "LOT_NO")
                    .unwrap_or_else(|| (i + 1).to_string());
                let mut lot = json!({ "id": id, "status": "active" });
                if let Some(title) = document::child_text(*descr, "TITLE") {
                    lot["title"] = json!(title);
                }
                if let Some(descr_text) = document::child_text(*descr, "SHORT_DESCR") {
                    lot["description"] = json!(descr_text);
                }
                if let Some(value) = document::child(*descr, "VAL_OBJECT").and_then(|node| {
                    money(&document::text_of(node)?, document::attr(node, "CURRENCY"))
                }) {
                    lot["value"] = value;
                }
                lot
            })
            .collect();

        Some(json!({ "tender": { "lots": lots } }))
    }

    fn eforms(notice: &Notice) -> Option<Value> {
        let lot_nodes = notice.find_all(&["ProcurementProjectLot"]);
        if lot_nodes.is_empty() {
            return None;
        }

        let lots: Vec<Value> = lot_nodes
            .iter()
            .filter_map(|lot_node| {
                let id = document::child_text(*lot_node, "ID")?;
                let project = document::child(*lot_node, "ProcurementProject");
                let mut lot = json!({ "id": id, "status": "active" });
                if let Some(project) = project {
                    if let Some(name) = document::child_text(project, "Name") {
                        lot["title"] = json!(name);
                    }
                    if let Some(descr) = document::child_text(project, "Description") {
                        lot["description"] = json!(descr);
                    }
                    if let Some(value) = document::child(project, "RequestedTenderTotal")
                        .and_then(|t| document::child(t, "EstimatedOverallContractAmount"))
                        .and_then(|node| {
                            money(
                                &document::text_of(node)?,
                                document::attr(node, "currencyID"),
                            )
                        })
                    {
                        lot["value"] = value;
                    }
                }
                Some(lot)
            })
            .collect();

        if lots.is_empty() {
            return None;
        }
        Some(json!({ "tender": { "lots": lots } }))
    }
}

impl BtExtractor for Lots {
    fn id(&self) -> &'static str {
        "bt-137-lots"
    }

    fn group(&self) -> Group {
        Group::Tender
    }

    fn bt(&self) -> u16 {
        137
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let value = match notice.family() {
            FormFamily::TedLegacy { .. } => Self::ted(notice),
            FormFamily::EForms { .. } => Self::eforms(notice),
            FormFamily::Unknown => None,
        };
        match value {
            Some(value) => fragment(value),
            None => Ok(None),
        }
    }
}

/// BT-330: lot groups. eForms only; TED forms have no group concept.
pub struct LotGroups;

impl BtExtractor for LotGroups {
    fn id(&self) -> &'static str {
        "bt-330-lot-groups"
    }

    fn group(&self) -> Group {
        Group::Tender
    }

    fn bt(&self) -> u16 {
        330
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let groups: Vec<Value> = notice
            .root()
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "LotsGroup")
            .filter_map(|group_node| {
                let id = document::child_text(group_node, "LotsGroupID")?;
                let related: Vec<String> =
                    document::children(group_node, "ProcurementProjectLotReference")
                        .iter()
                        .filter_map(|r| document::child_text(*r, "ID"))
                        .collect();
                let mut group = json!({ "id": id });
                if !related.is_empty() {
                    group["relatedLots"] = json!(related);
                }
                Some(group)
            })
            .collect();

        if groups.is_empty() {
            return Ok(None);
        }
        fragment(json!({ "tender": { "lotGroups": groups } }))
    }
}

/// BT-262: main CPV classification, emitted as the first tender item.
pub struct MainClassification;

impl BtExtractor for MainClassification {
    fn id(&self) -> &'static str {
        "bt-262-main-classification"
    }

    fn group(&self) -> Group {
        Group::Tender
    }

    fn bt(&self) -> u16 {
        262
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let code = match notice.family() {
            FormFamily::TedLegacy { .. } => ted_object(notice)
                .and_then(|o| document::child(o, "CPV_MAIN"))
                .and_then(|m| document::child(m, "CPV_CODE"))
                .and_then(|c| document::attr(c, "CODE")),
            FormFamily::EForms { .. } => notice
                .find(&["ProcurementProject", "MainCommodityClassification"])
                .and_then(|m| document::child_text(m, "ItemClassificationCode")),
            FormFamily::Unknown => None,
        };

        match code {
            Some(code) => fragment(json!({
                "tender": {
                    "items": [
                        {
                            "id": "1",
                            "classification": { "scheme": "CPV", "id": code }
                        }
                    ]
                }
            })),
            None => Ok(None),
        }
    }
}

/// BT-131: tender submission deadline. Procedure-wide for TED, per lot for
/// eForms.
pub struct SubmissionDeadline;

impl SubmissionDeadline {
    /// Compose an eForms `EndDate`/`EndTime` pair into one ISO datetime. The
    /// time carries its own offset when present; otherwise the date's offset
    /// applies to midnight.
    fn compose(date: &str, time: Option<&str>) -> Option<String> {
        let date = date.trim();
        match time.map(str::trim).filter(|t| !t.is_empty()) {
            Some(time) if date.len() >= 10 => {
                let candidate = format!("{}T{}", &date[..10], time);
                chrono::DateTime::parse_from_rfc3339(&candidate)
                    .ok()
                    .map(|dt| dt.to_rfc3339())
                    .or_else(|| document::normalize_date(date))
            }
            _ => document::normalize_date(date),
        }
    }
}

impl BtExtractor for SubmissionDeadline {
    fn id(&self) -> &'static str {
        "bt-131-deadline"
    }

    fn group(&self) -> Group {
        Group::Tender
    }

    fn bt(&self) -> u16 {
        131
    }

    fn dependencies(&self) -> Vec<&'static str> {
        // Lot records must exist so the per-lot deadline lands as an overlay.
        vec!["bt-137-lots"]
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        match notice.family() {
            FormFamily::TedLegacy { .. } => {
                let procedure = ted_form(notice).and_then(|f| document::child(f, "PROCEDURE"));
                let Some(procedure) = procedure else {
                    return Ok(None);
                };
                let Some(date) = document::child_text(procedure, "DATE_RECEIPT_TENDERS") else {
                    return Ok(None);
                };
                let time = document::child_text(procedure, "TIME_RECEIPT_TENDERS");
                match document::combine_date_time(&date, time.as_deref()) {
                    Some(end) => fragment(json!({
                        "tender": { "tenderPeriod": { "endDate": end } }
                    })),
                    None => Err(format!("unrecognized submission deadline '{}'", date)),
                }
            }
            FormFamily::EForms { .. } => {
                let lots: Vec<Value> = notice
                    .find_all(&["ProcurementProjectLot"])
                    .iter()
                    .filter_map(|lot_node| {
                        let id = document::child_text(*lot_node, "ID")?;
                        let period = document::child(*lot_node, "TenderingProcess")
                            .and_then(|p| {
                                document::child(p, "TenderSubmissionDeadlinePeriod")
                            })?;
                        let date = document::child_text(period, "EndDate")?;
                        let time = document::child_text(period, "EndTime");
                        let end = Self::compose(&date, time.as_deref())?;
                        Some(json!({ "id": id, "tenderPeriod": { "endDate": end } }))
                    })
                    .collect();

                if lots.is_empty() {
                    return Ok(None);
                }
                fragment(json!({ "tender": { "lots": lots } }))
            }
            FormFamily::Unknown => Ok(None),
        }
    }
}

/// BT-15: procurement documents URL.
pub struct ProcurementDocuments;

impl BtExtractor for ProcurementDocuments {
    fn id(&self) -> &'static str {
        "bt-15-documents"
    }

    fn group(&self) -> Group {
        Group::Tender
    }

    fn bt(&self) -> u16 {
        15
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let documents: Vec<Value> = match notice.family() {
            FormFamily::TedLegacy { .. } => {
                let body = ted_form(notice)
                    .and_then(|f| document::child(f, "CONTRACTING_BODY"));
                body.and_then(|b| document::child_text(b, "URL_DOCUMENT"))
                    .map(|url| {
                        vec![json!({
                            "id": "1",
                            "documentType": "biddingDocuments",
                            "url": url
                        })]
                    })
                    .unwrap_or_default()
            }
            FormFamily::EForms { .. } => notice
                .root()
                .descendants()
                .filter(|n| {
                    n.is_element()
                        && n.tag_name().name() == "CallForTendersDocumentReference"
                })
                .filter_map(|reference| {
                    let id = document::child_text(reference, "ID")?;
                    let mut doc = json!({ "id": id, "documentType": "biddingDocuments" });
                    if let Some(url) = document::child(reference, "Attachment")
                        .and_then(|a| document::child(a, "ExternalReference"))
                        .and_then(|e| document::child_text(e, "URI"))
                    {
                        doc["url"] = json!(url);
                    }
                    Some(doc)
                })
                .collect(),
            FormFamily::Unknown => Vec::new(),
        };

        if documents.is_empty() {
            return Ok(None);
        }
        fragment(json!({ "tender": { "documents": documents } }))
    }
}
