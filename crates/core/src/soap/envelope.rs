//! SOAP 1.1 envelope construction and response unwrapping.

use quick_xml::escape::escape;

use super::xml::XmlElement;
use super::SoapError;

const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// A single operation call: `<op:name xmlns:op="namespace">` followed by
/// unqualified parameter elements in insertion order.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    namespace: String,
    operation: String,
    params: Vec<(String, String)>,
}

impl SoapRequest {
    pub fn new(namespace: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            operation: operation.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter. Repeating a name produces a repeated element,
    /// which is how list parameters are sent.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Render the full envelope.
    pub fn to_envelope(&self) -> String {
        let mut body = String::new();
        for (name, value) in &self.params {
            body.push_str(&format!("<{name}>{}</{name}>", escape(value.as_str())));
        }

        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<soapenv:Envelope xmlns:soapenv="{env}" xmlns:op="{ns}">"#,
                "<soapenv:Header/>",
                "<soapenv:Body><op:{op}>{body}</op:{op}></soapenv:Body>",
                "</soapenv:Envelope>"
            ),
            env = ENVELOPE_NS,
            ns = escape(self.namespace.as_str()),
            op = self.operation,
            body = body,
        )
    }
}

/// Extract the first element inside `Body`, turning a `Fault` into an error.
pub fn unwrap_body(envelope: &XmlElement) -> Result<&XmlElement, SoapError> {
    let body = envelope
        .child("Body")
        .ok_or_else(|| SoapError::Xml("response has no SOAP Body".to_string()))?;

    let payload = body
        .children
        .first()
        .ok_or_else(|| SoapError::Xml("SOAP Body is empty".to_string()))?;

    if payload.name == "Fault" {
        return Err(fault_error(payload));
    }

    Ok(payload)
}

/// Look for a fault anywhere in a parsed document. Used for non-2xx
/// responses whose bodies still carry a SOAP fault.
pub fn find_fault(envelope: &XmlElement) -> Option<SoapError> {
    envelope.find("Fault").map(fault_error)
}

fn fault_error(fault: &XmlElement) -> SoapError {
    SoapError::Fault {
        code: fault.child_text("faultcode").unwrap_or("unknown").to_string(),
        message: fault.child_text("faultstring").unwrap_or_default().to_string(),
    }
}
