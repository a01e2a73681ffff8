//! Organization extractors: the contracting body and the EU-funds funder.

use serde_json::{json, Map, Value};

use crate::detect::{FormClassification, FormFamily};
use crate::document::{self, Notice};
use crate::fragment::Fragment;
use crate::registry::{BtExtractor, Group};

use super::{fragment, is_eforms, is_ted, ted_form};

/// BT-500: the contracting body, emitted as a `parties` record with the
/// `buyer` role plus the top-level `buyer` reference.
pub struct Buyer;

impl Buyer {
    fn ted(notice: &Notice) -> Option<Value> {
        let form = ted_form(notice)?;
        let body = document::child(form, "CONTRACTING_BODY")?;
        let address = document::child(body, "ADDRESS_CONTRACTING_BODY")?;
        let name = document::child_text(address, "OFFICIALNAME")?;

        let mut addr = Map::new();
        if let Some(street) = document::child_text(address, "ADDRESS") {
            addr.insert("streetAddress".to_string(), json!(street));
        }
        if let Some(town) = document::child_text(address, "TOWN") {
            addr.insert("locality".to_string(), json!(town));
        }
        if let Some(postal) = document::child_text(address, "POSTAL_CODE") {
            addr.insert("postalCode".to_string(), json!(postal));
        }
        if let Some(country) =
            document::child(address, "COUNTRY").and_then(|c| document::attr(c, "VALUE"))
        {
            addr.insert("country".to_string(), json!(country));
        }

        let mut party = json!({ "name": name, "roles": ["buyer"] });
        if !addr.is_empty() {
            party["address"] = Value::Object(addr);
        }

        Some(json!({
            "parties": [party],
            "buyer": { "name": name }
        }))
    }

    fn eforms(notice: &Notice) -> Option<Value> {
        let party_node = notice.find(&["ContractingParty", "Party"])?;
        let name = document::child(party_node, "PartyName")
            .and_then(|n| document::child_text(n, "Name"))?;
        let org_id = document::child(party_node, "PartyIdentification")
            .and_then(|n| document::child_text(n, "ID"));

        let mut addr = Map::new();
        if let Some(postal) = document::child(party_node, "PostalAddress") {
            if let Some(street) = document::child_text(postal, "StreetName") {
                addr.insert("streetAddress".to_string(), json!(street));
            }
            if let Some(city) = document::child_text(postal, "CityName") {
                addr.insert("locality".to_string(), json!(city));
            }
            if let Some(zone) = document::child_text(postal, "PostalZone") {
                addr.insert("postalCode".to_string(), json!(zone));
            }
            if let Some(country) = document::child(postal, "Country")
                .and_then(|c| document::child_text(c, "IdentificationCode"))
            {
                addr.insert("country".to_string(), json!(country));
            }
        }

        let mut party = json!({ "name": name, "roles": ["buyer"] });
        let mut buyer = json!({ "name": name });
        if let Some(org_id) = org_id {
            party["id"] = json!(org_id);
            buyer["id"] = json!(org_id);
        }
        if !addr.is_empty() {
            party["address"] = Value::Object(addr);
        }

        Some(json!({ "parties": [party], "buyer": buyer }))
    }
}

impl BtExtractor for Buyer {
    fn id(&self) -> &'static str {
        "bt-500-buyer"
    }

    fn group(&self) -> Group {
        Group::Parties
    }

    fn bt(&self) -> u16 {
        500
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

/// BT-60: procurement financed by EU funds. The "European Union" party has
/// no identifier in either source schema; identity resolution gives every
/// mention the same synthetic id.
pub struct EuFunds;

impl EuFunds {
    fn eu_funded(notice: &Notice) -> bool {
        match notice.family() {
            FormFamily::TedLegacy { .. } => notice.descendant("EU_PROGR_RELATED").is_some(),
            FormFamily::EForms { .. } => notice
                .root()
                .descendants()
                .filter(|n| n.is_element() && n.tag_name().name() == "FundingProgramCode")
                .any(|n| {
                    document::text_of(n)
                        .map(|t| t.eq_ignore_ascii_case("eu-funds"))
                        .unwrap_or(false)
                }),
            FormFamily::Unknown => false,
        }
    }
}

impl BtExtractor for EuFunds {
    fn id(&self) -> &'static str {
        "bt-60-eu-funds"
    }

    fn group(&self) -> Group {
        Group::Parties
    }

    fn bt(&self) -> u16 {
        60
    }

    fn dependencies(&self) -> Vec<&'static str> {
        // The buyer claims its synthetic party id before the EU record does.
        vec!["bt-500-buyer"]
    }

    fn applies_to(&self, classification: &FormClassification) -> bool {
        is_ted(classification) || is_eforms(classification)
    }

    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String> {
        if !Self::eu_funded(notice) {
            return Ok(None);
        }
        fragment(json!({
            "parties": [
                { "name": "European Union", "roles": ["funder"] }
            ],
            "planning": {
                "budget": {
                    "finance": [
                        {
                            "id": "1",
                            "financingParty": { "name": "European Union" }
                        }
                    ]
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FormTable;

    fn extract_with<E: BtExtractor>(extractor: &E, xml: &str) -> Option<Fragment> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let class = FormTable::embedded().unwrap().classify(&doc);
        let notice = Notice::new(&doc, class);
        extractor.extract(&notice).unwrap()
    }

    const TED: &str = r#"
<F02_2014 LG="EN">
  <CONTRACTING_BODY>
    <ADDRESS_CONTRACTING_BODY>
      <OFFICIALNAME>Town of Example</OFFICIALNAME>
      <TOWN>Example</TOWN>
      <POSTAL_CODE>12345</POSTAL_CODE>
      <COUNTRY VALUE="DE"/>
    </ADDRESS_CONTRACTING_BODY>
  </CONTRACTING_BODY>
  <OBJECT_CONTRACT>
    <OBJECT_DESCR>
      <LOT_NO>1</LOT_NO>
      <EU_PROGR_RELATED><P>ERDF</P></EU_PROGR_RELATED>
    </OBJECT_DESCR>
  </OBJECT_CONTRACT>
</F02_2014>"#;

    const EFORMS: &str = r#"
<ContractNotice>
  <ContractingParty>
    <Party>
      <PartyIdentification><ID>ORG-0001</ID></PartyIdentification>
      <PartyName><Name>Ministry of Works</Name></PartyName>
      <PostalAddress>
        <CityName>Oslo</CityName>
        <Country><IdentificationCode>NOR</IdentificationCode></Country>
      </PostalAddress>
    </Party>
  </ContractingParty>
  <ProcurementProjectLot>
    <ID>LOT-0001</ID>
    <ProcurementProject>
      <Funding><FundingProgramCode>eu-funds</FundingProgramCode></Funding>
    </ProcurementProject>
  </ProcurementProjectLot>
</ContractNotice>"#;

    #[test]
    fn test_buyer_from_ted() {
        let frag = extract_with(&Buyer, TED).unwrap();
        let map = frag.as_map();

        let party = &map["parties"].as_array().unwrap()[0];
        assert_eq!(party.get("name"), Some(&json!("Town of Example")));
        assert_eq!(party.get("roles"), Some(&json!(["buyer"])));
        assert_eq!(
            party.get("address"),
            Some(&json!({"locality": "Example", "postalCode": "12345", "country": "DE"}))
        );
        // TED bodies carry no organization id; the reference resolves by name.
        assert!(party.get("id").is_none());
        assert_eq!(map.get("buyer"), Some(&json!({"name": "Town of Example"})));
    }

    #[test]
    fn test_buyer_from_eforms() {
        let frag = extract_with(&Buyer, EFORMS).unwrap();
        let map = frag.as_map();

        let party = &map["parties"].as_array().unwrap()[0];
        assert_eq!(party.get("id"), Some(&json!("ORG-0001")));
        assert_eq!(party.get("name"), Some(&json!("Ministry of Works")));
        assert_eq!(
            map.get("buyer"),
            Some(&json!({"name": "Ministry of Works", "id": "ORG-0001"}))
        );
    }

    #[test]
    fn test_buyer_absent() {
        let xml = r#"<F02_2014 LG="EN"><OBJECT_CONTRACT/></F02_2014>"#;
        assert!(extract_with(&Buyer, xml).is_none());
    }

    #[test]
    fn test_eu_funds_ted() {
        let frag = extract_with(&EuFunds, TED).unwrap();
        let map = frag.as_map();

        let party = &map["parties"].as_array().unwrap()[0];
        assert_eq!(party.get("name"), Some(&json!("European Union")));
        assert_eq!(party.get("roles"), Some(&json!(["funder"])));

        let finance = &map["planning"]["budget"]["finance"].as_array().unwrap()[0];
        assert_eq!(
            finance.get("financingParty"),
            Some(&json!({"name": "European Union"}))
        );
    }

    #[test]
    fn test_eu_funds_eforms() {
        assert!(extract_with(&EuFunds, EFORMS).is_some());
    }

    #[test]
    fn test_eu_funds_absent() {
        let xml = r#"<F02_2014 LG="EN"><OBJECT_CONTRACT><OBJECT_DESCR><LOT_NO>1</LOT_NO></OBJECT_DESCR></OBJECT_CONTRACT></F02_2014>"#;
        assert!(extract_with(&EuFunds, xml).is_none());
    }
}
