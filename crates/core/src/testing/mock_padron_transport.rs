//! Mock registry transport for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::padron::{PadronTransport, PersonaRecord, RequestCredentials, ServerStatus};
use crate::soap::SoapError;

use super::fixtures;

/// A recorded registry call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// `getPersonaList_v2` or `getPersona`.
    pub operation: &'static str,
    pub ids: Vec<u64>,
    /// `cuitRepresentada` sent with the call.
    pub principal: u64,
    pub token: String,
}

/// Mock implementation of the PadronTransport trait.
///
/// Answers every identifier with `fixtures::persona_record` unless told
/// otherwise:
/// - per-identifier failures and delays
/// - a one-shot error for the next call
/// - a fixed batch response (to simulate count mismatches)
#[derive(Debug)]
pub struct MockPadronTransport {
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    failures: Arc<RwLock<HashMap<u64, String>>>,
    item_delays: Arc<RwLock<HashMap<u64, Duration>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    next_error: Arc<RwLock<Option<SoapError>>>,
    batch_override: Arc<RwLock<Option<Vec<PersonaRecord>>>>,
    status: Arc<RwLock<ServerStatus>>,
}

impl Default for MockPadronTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPadronTransport {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            item_delays: Arc::new(RwLock::new(HashMap::new())),
            delay: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
            batch_override: Arc::new(RwLock::new(None)),
            status: Arc::new(RwLock::new(ServerStatus {
                app_server: "OK".to_string(),
                auth_server: "OK".to_string(),
                db_server: "OK".to_string(),
            })),
        }
    }

    /// Make `getPersona` for `id` fail with a SOAP fault carrying `message`.
    pub async fn fail_id(&self, id: u64, message: impl Into<String>) {
        self.failures.write().await.insert(id, message.into());
    }

    /// Delay `getPersona` for `id` only.
    pub async fn set_item_delay(&self, id: u64, delay: Duration) {
        self.item_delays.write().await.insert(id, delay);
    }

    /// Delay every call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn set_next_error(&self, error: SoapError) {
        *self.next_error.write().await = Some(error);
    }

    /// Return exactly these records from `getPersonaList_v2`.
    pub async fn set_batch_override(&self, records: Vec<PersonaRecord>) {
        *self.batch_override.write().await = Some(records);
    }

    pub async fn set_status(&self, status: ServerStatus) {
        *self.status.write().await = status;
    }

    /// All recorded lookup calls, in arrival order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    async fn record(&self, operation: &'static str, credentials: &RequestCredentials, ids: &[u64]) {
        self.calls.write().await.push(RecordedCall {
            operation,
            ids: ids.to_vec(),
            principal: credentials.principal,
            token: credentials.token.clone(),
        });
    }

    async fn wait(&self, extra: Option<Duration>) {
        let delay = *self.delay.read().await;
        for d in [delay, extra].into_iter().flatten() {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl PadronTransport for MockPadronTransport {
    async fn get_persona_list(
        &self,
        credentials: &RequestCredentials,
        ids: &[u64],
        _timeout: Option<Duration>,
    ) -> Result<Vec<PersonaRecord>, SoapError> {
        self.record("getPersonaList_v2", credentials, ids).await;
        self.wait(None).await;

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(records) = self.batch_override.read().await.clone() {
            return Ok(records);
        }
        Ok(ids
            .iter()
            .map(|id| fixtures::persona_record(&id.to_string()))
            .collect())
    }

    async fn get_persona(
        &self,
        credentials: &RequestCredentials,
        id: u64,
        _timeout: Option<Duration>,
    ) -> Result<PersonaRecord, SoapError> {
        self.record("getPersona", credentials, &[id]).await;
        let extra = self.item_delays.read().await.get(&id).copied();
        self.wait(extra).await;

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(message) = self.failures.read().await.get(&id) {
            return Err(SoapError::Fault {
                code: "soap:Server".to_string(),
                message: message.clone(),
            });
        }
        Ok(fixtures::persona_record(&id.to_string()))
    }

    async fn dummy(&self, _timeout: Option<Duration>) -> Result<ServerStatus, SoapError> {
        self.wait(None).await;
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(self.status.read().await.clone())
    }
}
