//! Award and contract extractors for result notices.
//!
//! TED publishes results as `AWARD_CONTRACT` sections; eForms nests them in
//! the notice-result extension (`NoticeResult`/`LotResult`/`SettledContract`).

use roxmltree::Node;
use serde_json::{json, Map, Value};

use crate::detect::{FormClassification, FormFamily};
use crate::document::{self, Notice};
use crate::fragment::Fragment;
use crate::registry::{BtExtractor, Group};

use super::{fragment, is_eforms_award, is_ted_award, money, ted_form};

/// TED `AWARD_CONTRACT` sections of the form.
fn ted_award_sections<'a, 'input>(notice: &Notice<'a, 'input>) -> Vec<Node<'a, 'input>> {
    ted_form(notice)
        .map(|f| document::children(f, "AWARD_CONTRACT"))
        .unwrap_or_default()
}

/// Award id for a TED section: the `ITEM` attribute, else its position.
fn ted_award_id(section: Node, position: usize) -> String {
    document::attr(section, "ITEM").unwrap_or_else(|| (position + 1).to_string())
}

/// BT-142: award results, with winning suppliers linked into `parties`.
pub struct AwardResults;

impl AwardResults {
    fn ted(notice: &Notice) -> Option<Value> {
        let sections = ted_award_sections(notice);
        if sections.is_empty() {
            return None;
        }

        let mut awards = Vec::new();
        let mut parties = Vec::new();

        for (i, section) in sections.iter().enumerate() {
            let mut award = json!({ "id": ted_award_id(*section, i) });

            if let Some(lot) = document::child_text(*section, "LOT_NO") {
                award["relatedLots"] = json!([lot]);
            }

            match document::child(*section, "AWARDED_CONTRACT") {
                Some(awarded) => {
                    award["status"] = json!("active");
                    if let Some(date) =
                        document::child_text(awarded, "DATE_CONCLUSION_CONTRACT")
                            .as_deref()
                            .and_then(document::normalize_date)
                    {
                        award["date"] = json!(date);
                    }
                    if let Some(value) = document::child(awarded, "VAL_TOTAL").and_then(|v| {
                        money(&document::text_of(v)?, document::attr(v, "CURRENCY"))
                    }) {
                        award["value"] = value;
                    }

                    let mut suppliers = Vec::new();
                    for contractor in document::child(awarded, "CONTRACTORS")
                        .map(|c| document::children(c, "CONTRACTOR"))
                        .unwrap_or_default()
                    {
                        let Some(address) = document::child(contractor, "ADDRESS_CONTRACTOR")
                        else {
                            continue;
                        };
                        let Some(name) = document::child_text(address, "OFFICIALNAME") else {
                            continue;
                        };

                        let mut party = json!({ "name": name, "roles": ["supplier"] });
                        if let Some(country) = document::child(address, "COUNTRY")
                            .and_then(|c| document::attr(c, "VALUE"))
                        {
                            party["address"] = json!({ "country": country });
                        }
                        parties.push(party);
                        suppliers.push(json!({ "name": name }));
                    }
                    if !suppliers.is_empty() {
                        award["suppliers"] = json!(suppliers);
                    }
                }
                None => {
                    award["status"] = json!("unsuccessful");
                }
            }

            awards.push(award);
        }

        let mut out = Map::new();
        // Supplier parties first so award supplier references resolve onto
        // the records this same fragment creates.
        if !parties.is_empty() {
            out.insert("parties".to_string(), json!(parties));
        }
        out.insert("awards".to_string(), json!(awards));
        Some(Value::Object(out))
    }

    fn eforms(notice: &Notice) -> Option<Value> {
        let result = notice.descendant("NoticeResult")?;
        let lot_results = document::children(result, "LotResult");
        if lot_results.is_empty() {
            return None;
        }

        let awards: Vec<Value> = lot_results
            .iter()
            .filter_map(|lot_result| {
                let id = document::child_text(*lot_result, "ID")?;
                let mut award = json!({ "id": id });

                if let Some(code) = document::child_text(*lot_result, "TenderResultCode") {
                    let status = match code.as_str() {
                        "selec-w" => Some("active"),
                        "no-awa" | "clos-nw" => Some("unsuccessful"),
                        _ => None,
                    };
                    if let Some(status) = status {
                        award["status"] = json!(status);
                    }
                }

                let lots: Vec<String> = document::children(*lot_result, "TenderLot")
                    .iter()
                    .filter_map(|t| document::child_text(*t, "ID"))
                    .collect();
                if !lots.is_empty() {
                    award["relatedLots"] = json!(lots);
                }

                Some(award)
            })
            .collect();

        if awards.is_empty() {
            return None;
        }
        Some(json!({ "awards": awards }))
    }
}

impl BtExtractor for AwardResults {
    fn id(&self) -> &'static str {
        "bt-142-award-results"
    }

    fn group(&self) -> Group {
        Group::Awards
    }

    fn bt(&self) -> u16 {
        142
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["bt-500-buyer"]
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

/// BT-145: concluded contracts, cross-referenced to their awards by
/// `awardID`.
pub struct Contracts;

impl Contracts {
    fn ted(notice: &Notice) -> Option<Value> {
        let sections = ted_award_sections(notice);
        if sections.is_empty() {
            return None;
        }

        let contracts: Vec<Value> = sections
            .iter()
            .enumerate()
            .filter_map(|(i, section)| {
                // Only awarded sections conclude a contract.
                let awarded = document::child(*section, "AWARDED_CONTRACT")?;
                let contract_no = document::child_text(*section, "CONTRACT_NO")?;

                let mut contract = json!({
                    "id": contract_no,
                    "awardID": ted_award_id(*section, i)
                });
                if let Some(date) = document::child_text(awarded, "DATE_CONCLUSION_CONTRACT")
                    .as_deref()
                    .and_then(document::normalize_date)
                {
                    contract["dateSigned"] = json!(date);
                }
                Some(contract)
            })
            .collect();

        if contracts.is_empty() {
            return None;
        }
        Some(json!({ "contracts": contracts }))
    }

    fn eforms(notice: &Notice) -> Option<Value> {
        let result = notice.descendant("NoticeResult")?;
        let lot_results = document::children(result, "LotResult");

        let contracts: Vec<Value> = document::children(result, "SettledContract")
            .iter()
            .filter_map(|settled| {
                let id = document::child_text(*settled, "ID")?;
                let mut contract = json!({ "id": id });

                // The lot result holding a reference to this contract is the
                // award it belongs to.
                let award_id = lot_results.iter().find_map(|lot_result| {
                    let reference = document::child(*lot_result, "SettledContract")?;
                    if document::child_text(reference, "ID")? == id {
                        document::child_text(*lot_result, "ID")
                    } else {
                        None
                    }
                });
                if let Some(award_id) = award_id {
                    contract["awardID"] = json!(award_id);
                }

                if let Some(date) = document::child_text(*settled, "IssueDate")
                    .as_deref()
                    .and_then(document::normalize_date)
                {
                    contract["dateSigned"] = json!(date);
                }
                Some(contract)
            })
            .collect();

        if contracts.is_empty() {
            return None;
        }
        Some(json!({ "contracts": contracts }))
    }
}

impl BtExtractor for Contracts {
    fn id(&self) -> &'static str {
        "bt-145-contracts"
    }

    fn group(&self) -> Group {
        Group::Awards
    }

    fn bt(&self) -> u16 {
        145
    }

    fn dependencies(&self) -> Vec<&'static str> {
        // awardID references point at records the award extractor creates.
        vec!["bt-142-award-results"]
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
