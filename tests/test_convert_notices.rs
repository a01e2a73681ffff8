//! End-to-end conversion tests: raw notice XML in, assembled release out.

use serde_json::json;

use ocdsify::{Converter, FormFamily};

const TED_F02: &str = r#"
<TED_EXPORT>
  <CODED_DATA_SECTION>
    <NOTICE_DATA>
      <NO_DOC_OJS>2020/S 100-240231</NO_DOC_OJS>
      <LG_ORIG>EN</LG_ORIG>
    </NOTICE_DATA>
  </CODED_DATA_SECTION>
  <FORM_SECTION>
    <F02_2014 LG="EN">
      <CONTRACTING_BODY>
        <ADDRESS_CONTRACTING_BODY>
          <OFFICIALNAME>Town of Example</OFFICIALNAME>
          <TOWN>Example</TOWN>
          <POSTAL_CODE>12345</POSTAL_CODE>
          <COUNTRY VALUE="DE"/>
        </ADDRESS_CONTRACTING_BODY>
        <URL_DOCUMENT>https://tenders.example.org/docs</URL_DOCUMENT>
      </CONTRACTING_BODY>
      <OBJECT_CONTRACT>
        <TITLE><P>Road maintenance</P></TITLE>
        <SHORT_DESCR><P>Maintenance of municipal roads.</P></SHORT_DESCR>
        <CPV_MAIN><CPV_CODE CODE="45233139"/></CPV_MAIN>
        <VAL_ESTIMATED_TOTAL CURRENCY="EUR">1500000</VAL_ESTIMATED_TOTAL>
        <OBJECT_DESCR>
          <LOT_NO>1</LOT_NO>
          <TITLE><P>North district</P></TITLE>
          <VAL_OBJECT CURRENCY="EUR">800000</VAL_OBJECT>
          <EU_PROGR_RELATED><P>ERDF</P></EU_PROGR_RELATED>
        </OBJECT_DESCR>
        <OBJECT_DESCR>
          <LOT_NO>2</LOT_NO>
          <TITLE><P>South district</P></TITLE>
          <VAL_OBJECT CURRENCY="EUR">700000</VAL_OBJECT>
        </OBJECT_DESCR>
      </OBJECT_CONTRACT>
      <PROCEDURE>
        <PT_OPEN/>
        <DATE_RECEIPT_TENDERS>2020-06-15</DATE_RECEIPT_TENDERS>
        <TIME_RECEIPT_TENDERS>12:00</TIME_RECEIPT_TENDERS>
        <NOTICE_NUMBER_OJ>2020/S 050-118380</NOTICE_NUMBER_OJ>
      </PROCEDURE>
      <COMPLEMENTARY_INFO>
        <DATE_DISPATCH_NOTICE>2020-05-20</DATE_DISPATCH_NOTICE>
      </COMPLEMENTARY_INFO>
    </F02_2014>
  </FORM_SECTION>
</TED_EXPORT>"#;

const TED_F03: &str = r#"
<TED_EXPORT>
  <CODED_DATA_SECTION>
    <NOTICE_DATA>
      <NO_DOC_OJS>2020/S 150-367001</NO_DOC_OJS>
      <LG_ORIG>EN</LG_ORIG>
    </NOTICE_DATA>
  </CODED_DATA_SECTION>
  <FORM_SECTION>
    <F03_2014 LG="EN">
      <CONTRACTING_BODY>
        <ADDRESS_CONTRACTING_BODY>
          <OFFICIALNAME>Town of Example</OFFICIALNAME>
          <COUNTRY VALUE="DE"/>
        </ADDRESS_CONTRACTING_BODY>
      </CONTRACTING_BODY>
      <OBJECT_CONTRACT>
        <TITLE><P>Road maintenance</P></TITLE>
        <CPV_MAIN><CPV_CODE CODE="45233139"/></CPV_MAIN>
      </OBJECT_CONTRACT>
      <AWARD_CONTRACT ITEM="1">
        <CONTRACT_NO>CN-2020-17</CONTRACT_NO>
        <LOT_NO>1</LOT_NO>
        <AWARDED_CONTRACT>
          <DATE_CONCLUSION_CONTRACT>2020-07-01</DATE_CONCLUSION_CONTRACT>
          <TENDERS>
            <NB_TENDERS_RECEIVED>4</NB_TENDERS_RECEIVED>
            <NB_TENDERS_RECEIVED_SME>2</NB_TENDERS_RECEIVED_SME>
          </TENDERS>
          <CONTRACTORS>
            <CONTRACTOR>
              <ADDRESS_CONTRACTOR>
                <OFFICIALNAME>Acme Bau GmbH</OFFICIALNAME>
                <COUNTRY VALUE="DE"/>
              </ADDRESS_CONTRACTOR>
            </CONTRACTOR>
          </CONTRACTORS>
          <VAL_TOTAL CURRENCY="EUR">760000</VAL_TOTAL>
        </AWARDED_CONTRACT>
      </AWARD_CONTRACT>
      <COMPLEMENTARY_INFO>
        <DATE_DISPATCH_NOTICE>2020-07-28</DATE_DISPATCH_NOTICE>
      </COMPLEMENTARY_INFO>
    </F03_2014>
  </FORM_SECTION>
</TED_EXPORT>"#;

const EFORMS_CN: &str = r#"
<ContractNotice xmlns="urn:oasis:names:specification:ubl:schema:xsd:ContractNotice-2">
  <ID>00240231-2023</ID>
  <ContractFolderID>1e86a664-ae3c</ContractFolderID>
  <IssueDate>2023-01-15+01:00</IssueDate>
  <NoticeLanguageCode>ENG</NoticeLanguageCode>
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
  <ProcurementProject>
    <Name>IT services framework</Name>
    <Description>Framework for IT services.</Description>
    <MainCommodityClassification><ItemClassificationCode>72000000</ItemClassificationCode></MainCommodityClassification>
    <RequestedTenderTotal><EstimatedOverallContractAmount currencyID="EUR">2000000</EstimatedOverallContractAmount></RequestedTenderTotal>
  </ProcurementProject>
  <TenderingProcess><ProcedureCode>open</ProcedureCode></TenderingProcess>
  <TenderingTerms>
    <LotDistribution>
      <LotsGroup>
        <LotsGroupID>GLO-0001</LotsGroupID>
        <ProcurementProjectLotReference><ID>LOT-0001</ID></ProcurementProjectLotReference>
        <ProcurementProjectLotReference><ID>LOT-0002</ID></ProcurementProjectLotReference>
      </LotsGroup>
    </LotDistribution>
  </TenderingTerms>
  <ProcurementProjectLot>
    <ID>LOT-0001</ID>
    <TenderingProcess>
      <TenderSubmissionDeadlinePeriod>
        <EndDate>2023-02-20+01:00</EndDate>
        <EndTime>10:00:00+01:00</EndTime>
      </TenderSubmissionDeadlinePeriod>
    </TenderingProcess>
    <ProcurementProject>
      <Name>Lot one</Name>
      <Funding><FundingProgramCode>eu-funds</FundingProgramCode></Funding>
      <RequestedTenderTotal><EstimatedOverallContractAmount currencyID="EUR">1000000</EstimatedOverallContractAmount></RequestedTenderTotal>
    </ProcurementProject>
  </ProcurementProjectLot>
  <ProcurementProjectLot>
    <ID>LOT-0002</ID>
    <ProcurementProject>
      <Name>Lot two</Name>
    </ProcurementProject>
  </ProcurementProjectLot>
</ContractNotice>"#;

const EFORMS_CAN: &str = r#"
<ContractAwardNotice xmlns="urn:oasis:names:specification:ubl:schema:xsd:ContractAwardNotice-2">
  <ID>00300000-2023</ID>
  <ContractFolderID>1e86a664-ae3c</ContractFolderID>
  <IssueDate>2023-04-01+02:00</IssueDate>
  <NoticeLanguageCode>ENG</NoticeLanguageCode>
  <UBLExtensions><UBLExtension><ExtensionContent><EformsExtension>
    <NoticeResult>
      <LotResult>
        <ID>RES-0001</ID>
        <TenderResultCode>selec-w</TenderResultCode>
        <FieldsPrivacy>
          <FieldIdentifierCode>win-cho</FieldIdentifierCode>
          <ReasonDescription>Commercial interests</ReasonDescription>
          <PublicationDate>2025-03-31+02:00</PublicationDate>
        </FieldsPrivacy>
        <ReceivedSubmissionsStatistics>
          <StatisticsCode>tenders</StatisticsCode>
          <StatisticsNumeric>4</StatisticsNumeric>
        </ReceivedSubmissionsStatistics>
        <SettledContract><ID>CON-0001</ID></SettledContract>
        <TenderLot><ID>LOT-0001</ID></TenderLot>
      </LotResult>
      <SettledContract>
        <ID>CON-0001</ID>
        <IssueDate>2023-03-20+01:00</IssueDate>
      </SettledContract>
      <LotTender>
        <ID>TEN-0001</ID>
        <LegalMonetaryTotal><PayableAmount currencyID="EUR">760000</PayableAmount></LegalMonetaryTotal>
        <TenderLot><ID>LOT-0001</ID></TenderLot>
      </LotTender>
    </NoticeResult>
  </EformsExtension></ExtensionContent></UBLExtension></UBLExtensions>
  <TenderingProcess>
    <NoticeDocumentReference><ID>00240231-2023</ID></NoticeDocumentReference>
  </TenderingProcess>
</ContractAwardNotice>"#;

#[test]
fn ted_contract_notice_builds_a_full_tender_release() {
    let converter = Converter::new().unwrap();
    let conversion = converter.convert_str(TED_F02).unwrap();

    assert!(conversion.is_clean(), "warnings: {:?}", conversion.warnings);
    assert_eq!(
        conversion.classification.family,
        FormFamily::TedLegacy { form: "F02".to_string() }
    );

    let release = &conversion.release;
    assert_eq!(release.get("ocid"), Some(&json!("ocds-213czf-2020-S-100-240231")));
    assert_eq!(release.get("id"), Some(&json!("2020/S 100-240231")));
    assert_eq!(release.get("date"), Some(&json!("2020-05-20T00:00:00Z")));
    assert_eq!(release.get("language"), Some(&json!("en")));
    assert_eq!(release.get("tag"), Some(&json!(["tender"])));
    assert_eq!(release.get("initiationType"), Some(&json!("tender")));

    assert_eq!(release.get("tender.title"), Some(&json!("Road maintenance")));
    assert_eq!(
        release.get("tender.description"),
        Some(&json!("Maintenance of municipal roads."))
    );
    assert_eq!(release.get("tender.procurementMethod"), Some(&json!("open")));
    assert_eq!(
        release.get("tender.value"),
        Some(&json!({"amount": 1500000.0, "currency": "EUR"}))
    );
    assert_eq!(
        release.get("tender.tenderPeriod.endDate"),
        Some(&json!("2020-06-15T12:00:00Z"))
    );

    let lots = release.get("tender.lots").unwrap().as_array().unwrap();
    assert_eq!(lots.len(), 2);
    assert_eq!(lots[0]["id"], json!("1"));
    assert_eq!(lots[0]["title"], json!("North district"));
    assert_eq!(lots[0]["value"], json!({"amount": 800000.0, "currency": "EUR"}));

    let items = release.get("tender.items").unwrap().as_array().unwrap();
    assert_eq!(items[0]["classification"], json!({"scheme": "CPV", "id": "45233139"}));

    let documents = release.get("tender.documents").unwrap().as_array().unwrap();
    assert_eq!(documents[0]["url"], json!("https://tenders.example.org/docs"));

    // Buyer plus the synthetic EU funder party.
    let parties = release.get("parties").unwrap().as_array().unwrap();
    assert_eq!(parties.len(), 2);
    assert_eq!(parties[0]["name"], json!("Town of Example"));
    assert_eq!(parties[0]["roles"], json!(["buyer"]));
    assert_eq!(parties[1]["name"], json!("European Union"));
    assert_eq!(parties[1]["roles"], json!(["funder"]));
    assert_eq!(release.get("buyer").unwrap()["id"], parties[0]["id"]);

    let related = release.get("relatedProcesses").unwrap().as_array().unwrap();
    assert_eq!(related[0]["identifier"], json!("2020/S 050-118380"));
}

#[test]
fn ted_award_notice_builds_awards_contracts_and_statistics() {
    let converter = Converter::new().unwrap();
    let conversion = converter.convert_str(TED_F03).unwrap();

    assert!(conversion.is_clean(), "warnings: {:?}", conversion.warnings);
    assert_eq!(conversion.release.get("tag"), Some(&json!(["award", "contract"])));

    let release = &conversion.release;

    let awards = release.get("awards").unwrap().as_array().unwrap();
    assert_eq!(awards.len(), 1);
    assert_eq!(awards[0]["id"], json!("1"));
    assert_eq!(awards[0]["status"], json!("active"));
    assert_eq!(awards[0]["relatedLots"], json!(["1"]));
    assert_eq!(awards[0]["value"], json!({"amount": 760000.0, "currency": "EUR"}));

    // The winning supplier is both a party and an award reference, sharing
    // one id.
    let parties = release.get("parties").unwrap().as_array().unwrap();
    let supplier = parties
        .iter()
        .find(|p| p["name"] == json!("Acme Bau GmbH"))
        .expect("supplier party");
    assert_eq!(supplier["roles"], json!(["supplier"]));
    assert_eq!(awards[0]["suppliers"][0]["id"], supplier["id"]);

    let contracts = release.get("contracts").unwrap().as_array().unwrap();
    assert_eq!(contracts[0]["id"], json!("CN-2020-17"));
    assert_eq!(contracts[0]["awardID"], json!("1"));
    assert_eq!(contracts[0]["dateSigned"], json!("2020-07-01T00:00:00Z"));

    let stats = release.get("bids.statistics").unwrap().as_array().unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0]["measure"], json!("bids"));
    assert_eq!(stats[0]["value"], json!(4));
    assert_eq!(stats[1]["measure"], json!("smeBids"));
}

#[test]
fn eforms_contract_notice_builds_lots_groups_and_funder() {
    let converter = Converter::new().unwrap();
    let conversion = converter.convert_str(EFORMS_CN).unwrap();

    assert!(conversion.is_clean(), "warnings: {:?}", conversion.warnings);
    assert_eq!(
        conversion.classification.family,
        FormFamily::EForms { notice_type: "ContractNotice".to_string() }
    );

    let release = &conversion.release;
    assert_eq!(release.get("ocid"), Some(&json!("ocds-213czf-1e86a664-ae3c")));
    assert_eq!(release.get("date"), Some(&json!("2023-01-15T00:00:00+01:00")));
    assert_eq!(release.get("language"), Some(&json!("en")));

    let lots = release.get("tender.lots").unwrap().as_array().unwrap();
    assert_eq!(lots.len(), 2);
    assert_eq!(lots[0]["id"], json!("LOT-0001"));
    assert_eq!(lots[0]["title"], json!("Lot one"));
    assert_eq!(
        lots[0]["tenderPeriod"]["endDate"],
        json!("2023-02-20T10:00:00+01:00")
    );
    assert_eq!(lots[1]["id"], json!("LOT-0002"));

    let groups = release.get("tender.lotGroups").unwrap().as_array().unwrap();
    assert_eq!(groups[0]["id"], json!("GLO-0001"));
    assert_eq!(groups[0]["relatedLots"], json!(["LOT-0001", "LOT-0002"]));

    let parties = release.get("parties").unwrap().as_array().unwrap();
    assert_eq!(parties[0]["id"], json!("ORG-0001"));
    assert_eq!(parties[0]["roles"], json!(["buyer"]));
    // The funder has no native id; identity resolution numbers it past the
    // buyer's native one.
    assert_eq!(parties[1]["name"], json!("European Union"));

    assert_eq!(release.get("buyer").unwrap()["id"], json!("ORG-0001"));
}

#[test]
fn eforms_award_notice_builds_results_and_withheld_information() {
    let converter = Converter::new().unwrap();
    let conversion = converter.convert_str(EFORMS_CAN).unwrap();

    assert!(conversion.is_clean(), "warnings: {:?}", conversion.warnings);
    assert_eq!(conversion.release.get("tag"), Some(&json!(["award", "contract"])));

    let release = &conversion.release;

    let awards = release.get("awards").unwrap().as_array().unwrap();
    assert_eq!(awards[0]["id"], json!("RES-0001"));
    assert_eq!(awards[0]["status"], json!("active"));
    assert_eq!(awards[0]["relatedLots"], json!(["LOT-0001"]));

    let contracts = release.get("contracts").unwrap().as_array().unwrap();
    assert_eq!(contracts[0]["id"], json!("CON-0001"));
    assert_eq!(contracts[0]["awardID"], json!("RES-0001"));

    let stats = release.get("bids.statistics").unwrap().as_array().unwrap();
    assert_eq!(stats[0]["measure"], json!("bids"));
    assert_eq!(stats[0]["relatedLot"], json!("LOT-0001"));

    let details = release.get("bids.details").unwrap().as_array().unwrap();
    assert_eq!(details[0]["id"], json!("TEN-0001"));
    assert_eq!(details[0]["relatedLots"], json!(["LOT-0001"]));

    let withheld = release.get("withheldInformation").unwrap().as_array().unwrap();
    assert_eq!(withheld[0]["field"], json!("win-cho"));
    assert_eq!(withheld[0]["rationale"], json!("Commercial interests"));

    let related = release.get("relatedProcesses").unwrap().as_array().unwrap();
    assert_eq!(related[0]["identifier"], json!("00240231-2023"));
}

#[test]
fn emitted_release_round_trips_through_disk() {
    let converter = Converter::new().unwrap();
    let conversion = converter.convert_str(TED_F02).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notice.json");
    let json = ocdsify::emit::to_json_pretty(&conversion.release).unwrap();
    std::fs::write(&path, json).unwrap();

    let loaded: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(&loaded, conversion.release.as_value());
}

#[test]
fn releases_for_distinct_notices_are_independent() {
    let converter = Converter::new().unwrap();

    let first = converter.convert_str(TED_F02).unwrap();
    let second = converter.convert_str(EFORMS_CN).unwrap();

    // No state leaks between conversions sharing one converter.
    assert_eq!(first.release.get("id"), Some(&json!("2020/S 100-240231")));
    assert_eq!(second.release.get("id"), Some(&json!("00240231-2023")));
    assert_ne!(first.release.as_value(), second.release.as_value());
}
