//! Minimal XML element tree.
//!
//! Responses are parsed into `XmlElement` values keyed by local name
//! (namespace prefixes are dropped). Lookups return `Option` so callers
//! always state what happens when an element is absent.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use super::SoapError;

/// An XML element with its text content and child elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XmlElement {
    /// Local name (without namespace prefix).
    pub name: String,
    /// Concatenated, trimmed text content. `None` when the element has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Builder helper used mostly by tests and fixtures.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder helper used mostly by tests and fixtures.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given local name, in document order.
    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first direct child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.text.as_deref())
    }

    /// Follow a path of direct children, e.g. `["header", "destination"]`.
    pub fn path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    /// Depth-first search for the first descendant (or self) with the given name.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<XmlElement, SoapError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => {
                    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                    stack.push(XmlElement::new(name));
                }
                Ok(Event::Empty(empty)) => {
                    let name = String::from_utf8_lossy(empty.local_name().as_ref()).into_owned();
                    attach(&mut stack, &mut root, XmlElement::new(name))?;
                }
                Ok(Event::Text(text)) => {
                    let value = text
                        .unescape()
                        .map_err(|e| SoapError::Xml(e.to_string()))?
                        .into_owned();
                    push_text(&mut stack, &value);
                }
                Ok(Event::CData(data)) => {
                    let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    push_text(&mut stack, &value);
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| SoapError::Xml("unbalanced closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Eof) => break,
                // Declarations, comments, processing instructions, doctypes.
                Ok(_) => {}
                Err(e) => {
                    return Err(SoapError::Xml(format!(
                        "at position {}: {}",
                        reader.error_position(),
                        e
                    )))
                }
            }
        }

        if !stack.is_empty() {
            return Err(SoapError::Xml("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| SoapError::Xml("document has no root element".to_string()))
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), SoapError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(SoapError::Xml("multiple root elements".to_string())),
    }
}

fn push_text(stack: &mut [XmlElement], value: &str) {
    if value.is_empty() {
        return;
    }
    if let Some(current) = stack.last_mut() {
        match &mut current.text {
            Some(existing) => existing.push_str(value),
            None => current.text = Some(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_with_namespaces() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns2:dummyResponse xmlns:ns2="http://a13.soap.ws.server.puc.sr/">
      <return>
        <appserver>OK</appserver>
        <authserver>OK</authserver>
        <dbserver>OK</dbserver>
      </return>
    </ns2:dummyResponse>
  </soap:Body>
</soap:Envelope>"#;

        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.name, "Envelope");
        let ret = root.find("return").unwrap();
        assert_eq!(ret.child_text("appserver"), Some("OK"));
        assert_eq!(ret.children.len(), 3);
        assert_eq!(
            root.path(&["Body", "dummyResponse", "return", "dbserver"])
                .and_then(|e| e.text.as_deref()),
            Some("OK")
        );
    }

    #[test]
    fn test_parse_unescapes_text() {
        let xml = "<a><b>&lt;inner&gt;x &amp; y&lt;/inner&gt;</b></a>";
        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.child_text("b"), Some("<inner>x & y</inner>"));
    }

    #[test]
    fn test_parse_empty_elements_and_repeats() {
        let xml = "<list><item>1</item><item/><item>3</item></list>";
        let root = XmlElement::parse(xml).unwrap();
        let items: Vec<_> = root.children_named("item").collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].text, None);
        assert_eq!(items[2].text.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_cdata() {
        let root = XmlElement::parse("<a><![CDATA[<raw>]]></a>").unwrap();
        assert_eq!(root.text.as_deref(), Some("<raw>"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("").is_err());
        assert!(XmlElement::parse("<a>").is_err());
    }

    #[test]
    fn test_missing_lookups_are_none() {
        let root = XmlElement::new("root").with_child(XmlElement::new("x").with_text("1"));
        assert!(root.child("y").is_none());
        assert!(root.path(&["x", "z"]).is_none());
        assert_eq!(root.child_text("x"), Some("1"));
    }
}
