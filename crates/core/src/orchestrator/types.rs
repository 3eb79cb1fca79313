//! Types for lookups.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::padron::PersonaRecord;
use crate::soap::SoapError;
use crate::wsaa::AuthError;

/// Errors that abort a whole lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Obtaining or renewing the ticket failed.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The ticket carries no principal id; registry calls need one.
    #[error("authorization ticket has no principal id")]
    PrincipalMissing,

    /// An identifier is not a non-negative integer.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("batch of {size} identifiers exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Batch or health call failed.
    #[error("remote call failed: {0}")]
    Remote(#[from] SoapError),

    /// The batch response cannot be zipped with the request.
    #[error("requested {requested} identifiers but the service returned {returned} records")]
    RecordCountMismatch { requested: usize, returned: usize },

    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
}

impl LookupError {
    /// Timeouts become `Timeout`, everything else `Remote`.
    pub(crate) fn from_remote(error: SoapError) -> Self {
        match error {
            SoapError::Timeout(after) => LookupError::Timeout(after),
            other => LookupError::Remote(other),
        }
    }
}

/// Failure confined to one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemError {
    #[error("remote error: {message}")]
    Remote { message: String },

    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// The lookup was cancelled before this identifier was answered.
    #[error("cancelled")]
    Cancelled,
}

impl ItemError {
    pub(crate) fn from_remote(error: SoapError) -> Self {
        match error {
            SoapError::Timeout(after) => ItemError::Timeout {
                after_ms: after.as_millis() as u64,
            },
            other => ItemError::Remote {
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            ItemError::Remote { .. } => "remote_error",
            ItemError::Timeout { .. } => "timeout",
            ItemError::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupOutcome {
    Found(PersonaRecord),
    Failed(ItemError),
}

impl LookupOutcome {
    pub fn record(&self) -> Option<&PersonaRecord> {
        match self {
            LookupOutcome::Found(record) => Some(record),
            LookupOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ItemError> {
        match self {
            LookupOutcome::Found(_) => None,
            LookupOutcome::Failed(error) => Some(error),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            LookupOutcome::Found(_) => "found",
            LookupOutcome::Failed(error) => error.label(),
        }
    }
}

/// One input identifier and what became of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupEntry {
    pub identifier: String,
    pub outcome: LookupOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Completion {
    Complete,
    /// Some identifiers were not attempted.
    Partial { reason: String },
}

/// Ordered per-identifier results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResult {
    pub entries: Vec<LookupEntry>,
    pub completion: Completion,
}

impl LookupResult {
    pub fn complete(entries: Vec<LookupEntry>) -> Self {
        Self {
            entries,
            completion: Completion::Complete,
        }
    }

    pub fn partial(entries: Vec<LookupEntry>, reason: impl Into<String>) -> Self {
        Self {
            entries,
            completion: Completion::Partial {
                reason: reason.into(),
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn found(&self) -> impl Iterator<Item = (&str, &PersonaRecord)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.record().map(|r| (e.identifier.as_str(), r)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &ItemError)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.error().map(|err| (e.identifier.as_str(), err)))
    }
}

/// Per-call overrides for `LookupOrchestrator::lookup_with`.
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Overrides the configured per-call timeout.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl LookupOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}
