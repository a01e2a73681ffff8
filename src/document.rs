//! Read-only helpers over a parsed notice.
//!
//! Extractors address the XML tree by local element names only; TED and
//! eForms prefix their namespaces differently across publications, and the
//! form family has already been resolved by the detector, so namespace-exact
//! matching buys nothing here.

use roxmltree::{Document, Node};

use crate::detect::{FormClassification, FormFamily};

/// One parsed notice plus its classification.
///
/// Borrows the document; both are owned by the conversion call and dropped
/// at its end.
pub struct Notice<'a, 'input> {
    doc: &'a Document<'input>,
    classification: FormClassification,
}

impl<'a, 'input> Notice<'a, 'input> {
    pub fn new(doc: &'a Document<'input>, classification: FormClassification) -> Self {
        Self {
            doc,
            classification,
        }
    }

    pub fn classification(&self) -> &FormClassification {
        &self.classification
    }

    pub fn family(&self) -> &FormFamily {
        &self.classification.family
    }

    /// Root element of the document.
    pub fn root(&self) -> Node<'a, 'input> {
        self.doc.root_element()
    }

    /// Walk a chain of local element names from the root, first match at
    /// each step.
    pub fn find(&self, path: &[&str]) -> Option<Node<'a, 'input>> {
        let mut node = self.root();
        for name in path {
            node = child(node, name)?;
        }
        Some(node)
    }

    /// Walk a chain of local element names; the last segment collects every
    /// match under the (first-match) parent chain.
    pub fn find_all(&self, path: &[&str]) -> Vec<Node<'a, 'input>> {
        let Some((last, parents)) = path.split_last() else {
            return Vec::new();
        };
        let mut node = self.root();
        for name in parents {
            match child(node, name) {
                Some(next) => node = next,
                None => return Vec::new(),
            }
        }
        children(node, last)
    }

    /// Trimmed text content at a path.
    pub fn text(&self, path: &[&str]) -> Option<String> {
        self.find(path).and_then(text_of)
    }

    /// First descendant element with the given local name, anywhere in the
    /// document.
    pub fn descendant(&self, name: &str) -> Option<Node<'a, 'input>> {
        self.root()
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == name)
    }
}

/// First child element with the given local name.
pub fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

/// All child elements with the given local name.
pub fn children<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Vec<Node<'a, 'input>> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().name() == name)
        .collect()
}

/// Trimmed text of a child element.
pub fn child_text(node: Node, name: &str) -> Option<String> {
    child(node, name).and_then(text_of)
}

/// Concatenated, whitespace-normalized text of an element.
///
/// TED wraps multi-line text in `<P>` children; all descendant text is
/// gathered and joined.
pub fn text_of(node: Node) -> Option<String> {
    let mut parts = Vec::new();
    for n in node.descendants().filter(|n| n.is_text()) {
        if let Some(t) = n.text() {
            let t = t.trim();
            if !t.is_empty() {
                parts.push(t);
            }
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Trimmed attribute value.
pub fn attr(node: Node, name: &str) -> Option<String> {
    node.attribute(name)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Normalize a date to an ISO 8601 datetime string.
///
/// Accepts a full datetime (`2023-01-15T09:00:00+01:00`), a date with an
/// explicit offset as eForms publishes (`2023-01-15+01:00`), or a bare date
/// as TED publishes (`2023-01-15`, mapped to midnight UTC).
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.to_rfc3339());
    }

    if raw.len() > 10 {
        let (date, offset) = raw.split_at(10);
        if offset.starts_with('+') || offset.starts_with('-') || offset == "Z" {
            let composed = format!("{}T00:00:00{}", date, offset);
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&composed) {
                return Some(dt.to_rfc3339());
            }
        }
        // Datetime without an offset; read as UTC.
        return chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|dt| format!("{}Z", dt.format("%Y-%m-%dT%H:%M:%S")));
    }

    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| format!("{}T00:00:00Z", d.format("%Y-%m-%d")))
}

/// Combine a date and an optional `HH:MM` time into an ISO 8601 datetime.
pub fn combine_date_time(date: &str, time: Option<&str>) -> Option<String> {
    let date = date.trim();
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t,
        None => return normalize_date(date),
    };

    let d = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let t = chrono::NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| chrono::NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .ok()?;
    Some(format!(
        "{}T{}Z",
        d.format("%Y-%m-%d"),
        t.format("%H:%M:%S")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FormClassification;

    const SAMPLE: &str = r#"
<TED_EXPORT>
  <FORM_SECTION>
    <F02_2014 LG="EN">
      <OBJECT_CONTRACT>
        <TITLE><P>Road maintenance</P><P>2020 programme</P></TITLE>
        <CPV_MAIN><CPV_CODE CODE="45233139"/></CPV_MAIN>
        <OBJECT_DESCR><LOT_NO>1</LOT_NO></OBJECT_DESCR>
        <OBJECT_DESCR><LOT_NO>2</LOT_NO></OBJECT_DESCR>
      </OBJECT_CONTRACT>
    </F02_2014>
  </FORM_SECTION>
</TED_EXPORT>"#;

    fn with_sample<F: FnOnce(Notice)>(f: F) {
        let doc = Document::parse(SAMPLE).unwrap();
        f(Notice::new(&doc, FormClassification::unknown()));
    }

    #[test]
    fn test_find_chain() {
        with_sample(|notice| {
            let node = notice
                .find(&["FORM_SECTION", "F02_2014", "OBJECT_CONTRACT", "TITLE"])
                .unwrap();
            assert_eq!(node.tag_name().name(), "TITLE");
            assert!(notice.find(&["FORM_SECTION", "MISSING"]).is_none());
        });
    }

    #[test]
    fn test_text_joins_paragraphs() {
        with_sample(|notice| {
            let title = notice
                .text(&["FORM_SECTION", "F02_2014", "OBJECT_CONTRACT", "TITLE"])
                .unwrap();
            assert_eq!(title, "Road maintenance 2020 programme");
        });
    }

    #[test]
    fn test_find_all_collects_last_segment() {
        with_sample(|notice| {
            let lots = notice.find_all(&[
                "FORM_SECTION",
                "F02_2014",
                "OBJECT_CONTRACT",
                "OBJECT_DESCR",
            ]);
            assert_eq!(lots.len(), 2);
            assert_eq!(child_text(lots[1], "LOT_NO").as_deref(), Some("2"));
        });
    }

    #[test]
    fn test_descendant_and_attr() {
        with_sample(|notice| {
            let cpv = notice.descendant("CPV_CODE").unwrap();
            assert_eq!(attr(cpv, "CODE").as_deref(), Some("45233139"));
            assert_eq!(attr(cpv, "MISSING"), None);
        });
    }

    #[test]
    fn test_normalize_date_bare() {
        assert_eq!(
            normalize_date("2020-03-15").as_deref(),
            Some("2020-03-15T00:00:00Z")
        );
    }

    #[test]
    fn test_normalize_date_with_offset() {
        assert_eq!(
            normalize_date("2023-01-15+01:00").as_deref(),
            Some("2023-01-15T00:00:00+01:00")
        );
    }

    #[test]
    fn test_normalize_date_full_datetime() {
        assert_eq!(
            normalize_date("2023-01-15T09:30:00+01:00").as_deref(),
            Some("2023-01-15T09:30:00+01:00")
        );
    }

    #[test]
    fn test_normalize_date_rejects_garbage() {
        assert_eq!(normalize_date("15/03/2020"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn test_combine_date_time() {
        assert_eq!(
            combine_date_time("2020-03-15", Some("12:00")).as_deref(),
            Some("2020-03-15T12:00:00Z")
        );
        assert_eq!(
            combine_date_time("2020-03-15", None).as_deref(),
            Some("2020-03-15T00:00:00Z")
        );
    }
}
