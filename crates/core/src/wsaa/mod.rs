//! Authentication against the login service.
//!
//! Getting a ticket is a four step pipeline:
//! - build a time-windowed ticket request (`request`)
//! - sign it with the client certificate (`signer`, `credentials`)
//! - submit the signed payload to the login endpoint (`login`)
//! - turn the response into an `AuthorizationTicket` (`ticket`)
//!
//! `WsaaAuthenticator` chains the steps and is the production
//! `TicketProvider`.

mod credentials;
mod login;
mod request;
mod signer;
mod ticket;

pub use credentials::SigningCredentials;
pub use login::{LoginResponse, LoginTransport, SoapLoginTransport};
pub use request::{TicketRequest, DEFAULT_SKEW_MINUTES};
pub use signer::{MessageSigner, SignedRequest};
pub use ticket::{extract_principal, AuthorizationTicket};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::ServiceKind;
use crate::clock::Clock;
use crate::config::Config;
use crate::soap::{SoapClient, SoapError};

/// Errors raised while obtaining a ticket.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Certificate or key file missing, unreadable or unparsable.
    #[error("Failed to load credentials from {path}: {reason}")]
    CredentialLoad { path: String, reason: String },

    /// Signing failed or produced no extractable payload.
    #[error("Failed to sign ticket request: {0}")]
    Signing(String),

    /// Login call failed or its response could not be read.
    #[error("Login request failed: {0}")]
    RemoteAuth(#[from] SoapError),

    /// A required ticket field is missing or unparsable.
    #[error("Malformed ticket: {0}")]
    MalformedTicket(String),

    /// Another caller's renewal, which this caller waited on, failed.
    #[error("Ticket renewal failed: {0}")]
    RenewalFailed(String),
}

/// Source of fresh authorization tickets.
#[async_trait]
pub trait TicketProvider: Send + Sync {
    /// Run one full authentication round trip.
    async fn issue_ticket(&self, timeout: Option<Duration>)
        -> Result<AuthorizationTicket, AuthError>;
}

/// Builds, signs and submits ticket requests for one service.
pub struct WsaaAuthenticator {
    service_name: String,
    signer: MessageSigner,
    transport: Arc<dyn LoginTransport>,
    clock: Arc<dyn Clock>,
    skew_minutes: u32,
}

impl WsaaAuthenticator {
    pub fn new(
        service_name: impl Into<String>,
        signer: MessageSigner,
        transport: Arc<dyn LoginTransport>,
        clock: Arc<dyn Clock>,
        skew_minutes: u32,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            signer,
            transport,
            clock,
            skew_minutes,
        }
    }

    /// Load credentials and wire the SOAP login transport from config.
    ///
    /// Fails with `CredentialLoad` when the certificate or key cannot be
    /// read; the client cannot exist without them.
    pub fn from_config(
        config: &Config,
        service: ServiceKind,
        soap: SoapClient,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let credentials = SigningCredentials::load(
            &config.credentials.certificate_path,
            &config.credentials.private_key_path,
            config.credentials.passphrase.as_deref(),
        )?;
        let transport = SoapLoginTransport::new(soap, config.environment().login_endpoint());

        Ok(Self::new(
            service.descriptor().service_name,
            MessageSigner::new(Arc::new(credentials)),
            Arc::new(transport),
            clock,
            config.ticket.skew_minutes,
        ))
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

#[async_trait]
impl TicketProvider for WsaaAuthenticator {
    async fn issue_ticket(
        &self,
        timeout: Option<Duration>,
    ) -> Result<AuthorizationTicket, AuthError> {
        info!(service = %self.service_name, "Starting authentication");

        let request =
            TicketRequest::build(&self.service_name, self.clock.as_ref(), self.skew_minutes);
        let signed = self.signer.sign(request.to_xml().as_bytes())?;
        debug!(unique_id = %request.unique_id, "Ticket request signed");

        let login = self.transport.login(signed, timeout);
        let response = match timeout {
            Some(limit) => tokio::time::timeout(limit, login)
                .await
                .map_err(|_| AuthError::RemoteAuth(SoapError::Timeout(limit)))??,
            None => login.await?,
        };

        let ticket = AuthorizationTicket::from_response(response)?;
        info!(
            service = %self.service_name,
            expiration = %ticket.expiration,
            principal = ticket.principal_id.as_deref().unwrap_or("<absent>"),
            "Authorization ticket obtained"
        );
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::testing::{fixtures, MockLoginTransport};
    use chrono::DateTime;

    fn authenticator(transport: Arc<MockLoginTransport>) -> WsaaAuthenticator {
        let material = fixtures::test_credentials("20123456789");
        let creds = SigningCredentials::from_pem(
            &material.certificate_pem,
            &material.private_key_pem,
            None,
        )
        .unwrap();
        let clock = Arc::new(FixedClock::new(
            DateTime::parse_from_rfc3339("2024-05-01T10:00:00-03:00").unwrap(),
        ));
        WsaaAuthenticator::new(
            "ws_sr_padron_a13",
            MessageSigner::new(Arc::new(creds)),
            transport,
            clock,
            DEFAULT_SKEW_MINUTES,
        )
    }

    #[tokio::test]
    async fn test_issue_ticket_full_path() {
        let transport = Arc::new(MockLoginTransport::new());
        transport
            .set_response(fixtures::login_response(
                "SERIALNUMBER=CUIT 20123456789",
                Some("2024-05-01T22:00:00-03:00"),
            ))
            .await;

        let ticket = authenticator(transport.clone())
            .issue_ticket(None)
            .await
            .unwrap();

        assert_eq!(ticket.principal_id.as_deref(), Some("20123456789"));
        assert_eq!(transport.login_count().await, 1);

        // The payload the transport received is a real CMS structure.
        let sent = transport.last_request().await.unwrap();
        assert!(!sent.to_der().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let transport = Arc::new(MockLoginTransport::new());
        transport
            .set_next_error(SoapError::Fault {
                code: "ns1:coe.alreadyAuthenticated".to_string(),
                message: "El CEE ya posee un TA valido".to_string(),
            })
            .await;

        let result = authenticator(transport).issue_ticket(None).await;
        assert!(matches!(
            result,
            Err(AuthError::RemoteAuth(SoapError::Fault { .. }))
        ));
    }

    #[tokio::test]
    async fn test_response_without_expiration_is_malformed() {
        let transport = Arc::new(MockLoginTransport::new());
        transport
            .set_response(fixtures::login_response("CUIT 20123456789", None))
            .await;

        let result = authenticator(transport).issue_ticket(None).await;
        assert!(matches!(result, Err(AuthError::MalformedTicket(_))));
    }

    #[tokio::test]
    async fn test_login_timeout() {
        let transport = Arc::new(MockLoginTransport::new());
        transport
            .set_response(fixtures::login_response(
                "CUIT 20123456789",
                Some("2024-05-01T22:00:00-03:00"),
            ))
            .await;
        transport.set_delay(Duration::from_millis(200)).await;

        let result = authenticator(transport)
            .issue_ticket(Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(
            result,
            Err(AuthError::RemoteAuth(SoapError::Timeout(_)))
        ));
    }
}
