//! Mock ticket provider for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::wsaa::{AuthError, AuthorizationTicket, TicketProvider};

/// Mock implementation of the TicketProvider trait.
///
/// Issues tickets valid for a configurable lifetime from the shared clock's
/// current instant, and counts how many times it was asked.
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockTicketProvider::new(clock.clone());
/// provider.set_principal(None).await; // tickets without CUIT
/// provider.set_delay(Duration::from_millis(50)).await;
///
/// // ... run lookups ...
/// assert_eq!(provider.issue_count().await, 1);
/// ```
pub struct MockTicketProvider {
    clock: Arc<dyn Clock>,
    principal: Arc<RwLock<Option<String>>>,
    lifetime: Arc<RwLock<chrono::Duration>>,
    next_error: Arc<RwLock<Option<AuthError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    issued: Arc<RwLock<usize>>,
}

impl MockTicketProvider {
    /// Tickets default to principal `20123456789` and a 12 hour lifetime.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            principal: Arc::new(RwLock::new(Some("20123456789".to_string()))),
            lifetime: Arc::new(RwLock::new(chrono::Duration::hours(12))),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            issued: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn set_principal(&self, principal: Option<&str>) {
        *self.principal.write().await = principal.map(str::to_string);
    }

    pub async fn set_lifetime(&self, lifetime: chrono::Duration) {
        *self.lifetime.write().await = lifetime;
    }

    pub async fn set_next_error(&self, error: AuthError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Number of authentication round trips performed.
    pub async fn issue_count(&self) -> usize {
        *self.issued.read().await
    }
}

#[async_trait]
impl TicketProvider for MockTicketProvider {
    async fn issue_ticket(
        &self,
        _timeout: Option<Duration>,
    ) -> Result<AuthorizationTicket, AuthError> {
        let serial = {
            let mut issued = self.issued.write().await;
            *issued += 1;
            *issued
        };

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let expiration = self.clock.now() + *self.lifetime.read().await;
        Ok(AuthorizationTicket::new(
            format!("mock-token-{}", serial),
            format!("mock-sign-{}", serial),
            expiration,
            self.principal.read().await.clone(),
        ))
    }
}
