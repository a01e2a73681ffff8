//! Bid statistics, withheld information, and previous-publication links.

use serde_json::{json, Value};

use crate::detect::{FormClassification, FormFamily};
use crate::document::{self, Notice};
use crate::fragment::Fragment;
use crate::registry::{BtExtractor, Group};

use super::{fragment, is_eforms, is_eforms_award, is_ted, is_ted_award, ted_form};

/// Parse a statistic count, keeping integers integral on the wire.
fn statistic_value(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(json!(n));
    }
    raw.parse::<f64>().ok().map(|n| json!(n))
}

/// BT-759: received-submissions statistics.
pub struct BidStatistics;

impl BidStatistics {
    /// eForms statistics codes to OCDS bid-statistics measures.
    fn eforms_measure(code: &str) -> String {
        match code {
            "tenders" => "bids",
            "t-sme" => "smeBids",
            "t-micro" => "microBids",
            "t-small" => "smallBids",
            "t-med" => "mediumBids",
            other => other,
        }
        .to_string()
    }

    fn ted(notice: &Notice) -> Option<Value> {
        let form = ted_form(notice)?;
        let mut statistics = Vec::new();

        for section in document::children(form, "AWARD_CONTRACT") {
            let lot = document::child_text(section, "LOT_NO");
            let Some(tenders) = document::child(section, "AWARDED_CONTRACT")
                .and_then(|a| document::child(a, "TENDERS"))
            else {
                continue;
            };

            for (element, measure) in [
                ("NB_TENDERS_RECEIVED", "bids"),
                ("NB_TENDERS_RECEIVED_SME", "smeBids"),
                ("NB_TENDERS_RECEIVED_OTHER_EU", "foreignBidsFromEU"),
                ("NB_TENDERS_RECEIVED_NON_EU", "foreignBidsFromNonEU"),
                ("NB_TENDERS_RECEIVED_EMEANS", "electronicBids"),
            ] {
                let Some(value) = document::child_text(tenders, element)
                    .as_deref()
                    .and_then(statistic_value)
                else {
                    continue;
                };
                let mut stat = json!({
                    "id": (statistics.len() + 1).to_string(),
                    "measure": measure,
                    "value": value
                });
                if let Some(lot) = &lot {
                    stat["relatedLot"] = json!(lot);
                }
                statistics.push(stat);
            }
        }

        if statistics.is_empty() {
            return None;
        }
        Some(json!({ "bids": { "statistics": statistics } }))
    }

    fn eforms(notice: &Notice) -> Option<Value> {
        let result = notice.descendant("NoticeResult")?;
        let mut statistics = Vec::new();

        for lot_result in document::children(result, "LotResult") {
            let lot = document::child(lot_result, "TenderLot")
                .and_then(|t| document::child_text(t, "ID"));

            for stats_node in
                document::children(lot_result, "ReceivedSubmissionsStatistics")
            {
                let Some(code) = document::child_text(stats_node, "StatisticsCode") else {
                    continue;
                };
                let Some(value) = document::child_text(stats_node, "StatisticsNumeric")
                    .as_deref()
                    .and_then(statistic_value)
                else {
                    continue;
                };
                let mut stat = json!({
                    "id": (statistics.len() + 1).to_string(),
                    "measure": Self::eforms_measure(&code),
                    "value": value
                });
                if let Some(lot) = &lot {
                    stat["relatedLot"] = json!(lot);
                }
                statistics.push(stat);
            }
        }

        if statistics.is_empty() {
            return None;
        }
        Some(json!({ "bids": { "statistics": statistics } }))
    }
}

impl BtExtractor for BidStatistics {
    fn id(&self) -> &'static str {
        "bt-759-bid-statistics"
    }

    fn group(&self) -> Group {
        Group::Bids
    }

    fn bt(&self) -> u16 {
        759
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted_award(classification) || is_eforms_award(classification)
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

/// BT-3201: tenders received, one bid record per `LotTender`. eForms only;
/// TED legacy publishes counts, not individual tenders.
pub struct TenderDetails;

impl BtExtractor for TenderDetails {
    fn id(&self) -> &'static str {
        "bt-3201-tender-details"
    }

    fn group(&self) -> Group {
        Group::Bids
    }

    fn bt(&self) -> u16 {
        3201
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_eforms_award(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let Some(result) = notice.descendant("NoticeResult") else {
            return Ok(None);
        };

        let details: Vec<Value> = document::children(result, "LotTender")
            .iter()
            .filter_map(|tender| {
                let id = document::child_text(*tender, "ID")?;
                let mut bid = json!({ "id": id });
                if let Some(value) = document::child(*tender, "LegalMonetaryTotal")
                    .and_then(|t| document::child(t, "PayableAmount"))
                    .and_then(|amount| {
                        super::money(
                            &document::text_of(amount)?,
                            document::attr(amount, "currencyID"),
                        )
                    })
                {
                    bid["value"] = value;
                }
                let lots: Vec<String> = document::children(*tender, "TenderLot")
                    .iter()
                    .filter_map(|t| document::child_text(*t, "ID"))
                    .collect();
                if !lots.is_empty() {
                    bid["relatedLots"] = json!(lots);
                }
                Some(bid)
            })
            .collect();

        if details.is_empty() {
            return Ok(None);
        }
        fragment(json!({ "bids": { "details": details } }))
    }
}

/// BT-195: unpublished fields. eForms marks withheld values with
/// `FieldsPrivacy`; TED legacy has no equivalent.
pub struct WithheldInformation;

impl BtExtractor for WithheldInformation {
    fn id(&self) -> &'static str {
        "bt-195-withheld-information"
    }

    fn group(&self) -> Group {
        Group::Bids
    }

    fn bt(&self) -> u16 {
        195
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let withheld: Vec<Value> = notice
            .root()
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "FieldsPrivacy")
            .enumerate()
            .filter_map(|(i, privacy)| {
                let field = document::child_text(privacy, "FieldIdentifierCode")?;
                let mut record = json!({
                    "id": format!("{}-{}", field, i + 1),
                    "field": field
                });
                if let Some(reason) = document::child_text(privacy, "ReasonDescription") {
                    record["rationale"] = json!(reason);
                }
                if let Some(date) = document::child_text(privacy, "PublicationDate")
                    .as_deref()
                    .and_then(document::normalize_date)
                {
                    record["availabilityDate"] = json!(date);
                }
                Some(record)
            })
            .collect();

        if withheld.is_empty() {
            return Ok(None);
        }
        fragment(json!({ "withheldInformation": withheld }))
    }
}

/// BT-125: reference to the previous planning publication.
pub struct PreviousPublication;

impl BtExtractor for PreviousPublication {
    fn id(&self) -> &'static str {
        "bt-125-previous-publication"
    }

    fn group(&self) -> Group {
        Group::Bids
    }

    fn bt(&self) -> u16 {
        125
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        let identifier = match notice.family() {
            FormFamily::TedLegacy { .. } => notice
                .descendant("NOTICE_NUMBER_OJ")
                .and_then(document::text_of),
            FormFamily::EForms { .. } => notice
                .find(&["TenderingProcess", "NoticeDocumentReference", "ID"])
                .and_then(document::text_of),
            FormFamily::Unknown => None,
        };

        match identifier {
            Some(identifier) => fragment(json!({
                "relatedProcesses": [
                    {
                        "id": "1",
                        "relationship": ["planning"],
                        "scheme": "ojs-notice-id",
                        "identifier": identifier
                    }
                ]
            })),
            None => Ok(None),
        }
    }
}
