//! SOAP 1.1 over HTTPS.
//!
//! Both the login service and the registry services speak SOAP. This module
//! owns the shared plumbing: envelopes, XML parsing, fault detection and the
//! HTTP round trip.

mod envelope;
mod xml;

pub use envelope::{find_fault, unwrap_body, SoapRequest};
pub use xml::XmlElement;

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::debug;

/// Default per-request timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from a SOAP round trip.
#[derive(Debug, Error)]
pub enum SoapError {
    /// The HTTP request itself failed (DNS, TLS, connection reset, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status without a SOAP fault in the body.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered with a SOAP fault.
    #[error("SOAP fault {code}: {message}")]
    Fault { code: String, message: String },

    /// The response could not be parsed or lacked a required element.
    #[error("Invalid XML response: {0}")]
    Xml(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Thin SOAP client over `reqwest`.
#[derive(Debug, Clone)]
pub struct SoapClient {
    client: Client,
    default_timeout: Duration,
}

impl SoapClient {
    pub fn new(default_timeout: Duration) -> Result<Self, SoapError> {
        let client = Client::builder()
            .user_agent(concat!("padron/", env!("CARGO_PKG_VERSION")))
            .timeout(default_timeout)
            .build()?;

        Ok(Self {
            client,
            default_timeout,
        })
    }

    /// POST `request` to `endpoint` and return the element inside the SOAP Body.
    pub async fn call(
        &self,
        endpoint: &str,
        request: &SoapRequest,
        timeout: Option<Duration>,
    ) -> Result<XmlElement, SoapError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let envelope = request.to_envelope();

        debug!(
            endpoint = endpoint,
            operation = request.operation(),
            "Sending SOAP request"
        );

        let response = self
            .client
            .post(endpoint)
            .timeout(timeout)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(envelope)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| classify(e, timeout))?;

        if !status.is_success() {
            // Faults usually come back as HTTP 500 with a proper envelope.
            if let Ok(parsed) = XmlElement::parse(&body) {
                if let Some(fault) = find_fault(&parsed) {
                    return Err(fault);
                }
            }
            return Err(SoapError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let document = XmlElement::parse(&body)?;
        let payload = unwrap_body(&document)?.clone();

        debug!(
            endpoint = endpoint,
            operation = request.operation(),
            "SOAP response received"
        );

        Ok(payload)
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> SoapError {
    if error.is_timeout() {
        SoapError::Timeout(timeout)
    } else {
        SoapError::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds() {
        let client = SoapClient::new(Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_error_display() {
        let err = SoapError::Fault {
            code: "soap:Server".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "SOAP fault soap:Server: boom");

        let err = SoapError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: unavailable");
    }
}
