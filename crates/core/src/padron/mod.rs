//! Taxpayer registry services (A5 "constancia de inscripción" and A13).
//!
//! `PadronTransport` is the seam the orchestrator talks to. The SOAP
//! implementation sends one request per call and never retries.

mod types;

pub use types::{Address, PersonaRecord, ServerStatus};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::catalog::{Environment, ServiceDescriptor};
use crate::soap::{SoapClient, SoapError, SoapRequest, XmlElement};

/// Ticket fields every registry call carries.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestCredentials {
    pub token: String,
    pub sign: String,
    /// Tax id of the party making the request (`cuitRepresentada`).
    pub principal: u64,
}

impl fmt::Debug for RequestCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCredentials")
            .field("token", &"<redacted>")
            .field("sign", &"<redacted>")
            .field("principal", &self.principal)
            .finish()
    }
}

/// Remote registry operations.
#[async_trait]
pub trait PadronTransport: Send + Sync {
    /// One call for the whole list. Records come back in request order.
    async fn get_persona_list(
        &self,
        credentials: &RequestCredentials,
        ids: &[u64],
        timeout: Option<Duration>,
    ) -> Result<Vec<PersonaRecord>, SoapError>;

    /// Look up a single identifier.
    async fn get_persona(
        &self,
        credentials: &RequestCredentials,
        id: u64,
        timeout: Option<Duration>,
    ) -> Result<PersonaRecord, SoapError>;

    /// Health check. Needs no ticket.
    async fn dummy(&self, timeout: Option<Duration>) -> Result<ServerStatus, SoapError>;
}

/// `PadronTransport` over SOAP for one service descriptor.
#[derive(Debug, Clone)]
pub struct SoapPadronTransport {
    client: SoapClient,
    endpoint: String,
    namespace: &'static str,
}

impl SoapPadronTransport {
    pub fn new(client: SoapClient, endpoint: impl Into<String>, namespace: &'static str) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            namespace,
        }
    }

    pub fn for_service(
        client: SoapClient,
        descriptor: &'static ServiceDescriptor,
        environment: Environment,
    ) -> Self {
        Self::new(client, descriptor.endpoint(environment), descriptor.namespace)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorized(&self, operation: &str, credentials: &RequestCredentials) -> SoapRequest {
        SoapRequest::new(self.namespace, operation)
            .param("token", &credentials.token)
            .param("sign", &credentials.sign)
            .param("cuitRepresentada", credentials.principal)
    }
}

#[async_trait]
impl PadronTransport for SoapPadronTransport {
    async fn get_persona_list(
        &self,
        credentials: &RequestCredentials,
        ids: &[u64],
        timeout: Option<Duration>,
    ) -> Result<Vec<PersonaRecord>, SoapError> {
        let request = ids
            .iter()
            .fold(self.authorized("getPersonaList_v2", credentials), |req, id| {
                req.param("idPersona", id)
            });

        let payload = self.client.call(&self.endpoint, &request, timeout).await?;
        let records = persona_list(&payload)?;
        debug!(
            requested = ids.len(),
            returned = records.len(),
            "Persona list received"
        );
        Ok(records)
    }

    async fn get_persona(
        &self,
        credentials: &RequestCredentials,
        id: u64,
        timeout: Option<Duration>,
    ) -> Result<PersonaRecord, SoapError> {
        let request = self
            .authorized("getPersona", credentials)
            .param("idPersona", id);

        let payload = self.client.call(&self.endpoint, &request, timeout).await?;
        persona(&payload)
    }

    async fn dummy(&self, timeout: Option<Duration>) -> Result<ServerStatus, SoapError> {
        let request = SoapRequest::new(self.namespace, "dummy");
        let payload = self.client.call(&self.endpoint, &request, timeout).await?;

        let status = payload
            .child("return")
            .ok_or_else(|| SoapError::Xml("dummy response has no return element".to_string()))?;
        Ok(ServerStatus::from_element(status))
    }
}

/// `getPersonaList_v2Response/personaListReturn/persona*`
pub(crate) fn persona_list(payload: &XmlElement) -> Result<Vec<PersonaRecord>, SoapError> {
    let list = payload
        .find("personaListReturn")
        .ok_or_else(|| SoapError::Xml("personaListReturn missing from response".to_string()))?;

    Ok(list
        .children_named("persona")
        .map(PersonaRecord::from_element)
        .collect())
}

/// `getPersonaResponse/personaReturn/persona`
pub(crate) fn persona(payload: &XmlElement) -> Result<PersonaRecord, SoapError> {
    let record = payload
        .find("personaReturn")
        .and_then(|r| r.child("persona"))
        .ok_or_else(|| SoapError::Xml("persona missing from response".to_string()))?;

    Ok(PersonaRecord::from_element(record))
}
