//! Mock login transport for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::soap::SoapError;
use crate::wsaa::{AuthError, LoginResponse, LoginTransport, SignedRequest};

/// Mock implementation of the LoginTransport trait.
///
/// Records every signed payload it receives and answers with a configured
/// `LoginResponse`, an injected error, or after a delay.
#[derive(Debug, Default)]
pub struct MockLoginTransport {
    /// Response returned by every successful call.
    response: Arc<RwLock<Option<LoginResponse>>>,
    /// If set, the next call fails with this error.
    next_error: Arc<RwLock<Option<SoapError>>>,
    /// Delay applied before answering.
    delay: Arc<RwLock<Option<Duration>>>,
    /// Recorded payloads.
    requests: Arc<RwLock<Vec<SignedRequest>>>,
}

impl MockLoginTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_response(&self, response: LoginResponse) {
        *self.response.write().await = Some(response);
    }

    pub async fn set_next_error(&self, error: SoapError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Number of login calls received.
    pub async fn login_count(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn last_request(&self) -> Option<SignedRequest> {
        self.requests.read().await.last().cloned()
    }
}

#[async_trait]
impl LoginTransport for MockLoginTransport {
    async fn login(
        &self,
        request: SignedRequest,
        _timeout: Option<Duration>,
    ) -> Result<LoginResponse, AuthError> {
        self.requests.write().await.push(request);

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(AuthError::RemoteAuth(error));
        }

        self.response.read().await.clone().ok_or_else(|| {
            AuthError::RemoteAuth(SoapError::Xml("no mock login response configured".to_string()))
        })
    }
}
