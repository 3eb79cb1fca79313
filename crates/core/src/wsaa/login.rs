//! Login service client (`loginCms`).

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::soap::{SoapClient, SoapError, SoapRequest, XmlElement};

use super::signer::SignedRequest;
use super::AuthError;

const LOGIN_NAMESPACE: &str = "http://wsaa.view.sua.dvadac.desein.afip.gov";
const LOGIN_OPERATION: &str = "loginCms";

/// Raw fields of a `loginTicketResponse`. Every field is optional here;
/// `AuthorizationTicket::from_response` decides which ones are required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginResponse {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub unique_id: Option<String>,
    pub generation_time: Option<String>,
    pub expiration_time: Option<String>,
    pub token: Option<String>,
    pub sign: Option<String>,
}

impl LoginResponse {
    /// Parse the inner `loginTicketResponse` document.
    pub fn parse(document: &str) -> Result<Self, SoapError> {
        let root = XmlElement::parse(document)?;
        if root.name != "loginTicketResponse" {
            return Err(SoapError::Xml(format!(
                "expected loginTicketResponse, found {}",
                root.name
            )));
        }

        let header = root.child("header");
        let credentials = root.child("credentials");
        let header_field = |name: &str| header.and_then(|h| h.child_text(name)).map(str::to_string);
        let credential_field =
            |name: &str| credentials.and_then(|c| c.child_text(name)).map(str::to_string);

        Ok(Self {
            source: header_field("source"),
            destination: header_field("destination"),
            unique_id: header_field("uniqueId"),
            generation_time: header_field("generationTime"),
            expiration_time: header_field("expirationTime"),
            token: credential_field("token"),
            sign: credential_field("sign"),
        })
    }
}

/// Submits a signed request to the login endpoint.
///
/// Implementations perform exactly one remote call and never retry.
#[async_trait]
pub trait LoginTransport: Send + Sync {
    async fn login(
        &self,
        request: SignedRequest,
        timeout: Option<Duration>,
    ) -> Result<LoginResponse, AuthError>;
}

/// `LoginTransport` speaking SOAP to the real login service.
#[derive(Debug, Clone)]
pub struct SoapLoginTransport {
    client: SoapClient,
    endpoint: String,
}

impl SoapLoginTransport {
    pub fn new(client: SoapClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LoginTransport for SoapLoginTransport {
    async fn login(
        &self,
        request: SignedRequest,
        timeout: Option<Duration>,
    ) -> Result<LoginResponse, AuthError> {
        info!(endpoint = %self.endpoint, "Requesting authorization ticket");

        let call = SoapRequest::new(LOGIN_NAMESPACE, LOGIN_OPERATION)
            .param("in0", request.into_inner());
        let payload = self.client.call(&self.endpoint, &call, timeout).await?;

        let response = login_return(&payload)?;
        debug!("Login response received");
        Ok(response)
    }
}

/// The service returns the ticket as an escaped XML string inside
/// `loginCmsReturn`.
pub(crate) fn login_return(payload: &XmlElement) -> Result<LoginResponse, AuthError> {
    let inner = payload
        .find("loginCmsReturn")
        .and_then(|r| r.text.as_deref())
        .ok_or_else(|| SoapError::Xml("loginCmsReturn missing from response".to_string()))?;

    Ok(LoginResponse::parse(inner)?)
}
