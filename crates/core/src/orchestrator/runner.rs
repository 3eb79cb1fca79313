//! Lookup orchestrator implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn, Instrument, Span};

use crate::catalog::{LookupMode, ServiceDescriptor, ServiceKind};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::metrics::Metrics;
use crate::padron::{PadronTransport, RequestCredentials, ServerStatus, SoapPadronTransport};
use crate::soap::{SoapClient, SoapError};
use crate::wsaa::{AuthorizationTicket, TicketProvider, WsaaAuthenticator};

use super::cache::{TicketCache, TicketSource};
use super::config::LookupConfig;
use super::types::{
    ItemError, LookupEntry, LookupError, LookupOptions, LookupOutcome, LookupResult,
};

/// Answers identifier lookups against one registry service.
///
/// Owns the ticket cache; every lookup first obtains a valid ticket (renewing
/// when needed) and then runs in the service's lookup mode. Share it behind
/// an `Arc`.
pub struct LookupOrchestrator {
    service: &'static ServiceDescriptor,
    cache: TicketCache,
    transport: Arc<dyn PadronTransport>,
    config: LookupConfig,
    metrics: Metrics,
    span: Span,
}

impl LookupOrchestrator {
    pub fn new(
        service: &'static ServiceDescriptor,
        provider: Arc<dyn TicketProvider>,
        transport: Arc<dyn PadronTransport>,
        clock: Arc<dyn Clock>,
        config: LookupConfig,
        metrics: Metrics,
        span: Span,
    ) -> Self {
        Self {
            service,
            cache: TicketCache::new(provider, clock, metrics.clone()),
            transport,
            config,
            metrics,
            span,
        }
    }

    /// Wire the SOAP authenticator and registry transport from config.
    ///
    /// Credentials are loaded here; a missing or unreadable certificate or
    /// key fails construction.
    pub fn from_config(
        config: &Config,
        kind: ServiceKind,
        metrics: Metrics,
        span: Span,
    ) -> Result<Self, LookupError> {
        let descriptor = kind.descriptor();
        let environment = config.environment();
        let soap = SoapClient::new(config.lookup.timeout())?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let authenticator =
            WsaaAuthenticator::from_config(config, kind, soap.clone(), Arc::clone(&clock))?;
        let transport = SoapPadronTransport::for_service(soap, descriptor, environment);

        info!(
            service = descriptor.service_name,
            environment = environment.as_str(),
            endpoint = transport.endpoint(),
            "Lookup client configured"
        );

        Ok(Self::new(
            descriptor,
            Arc::new(authenticator),
            Arc::new(transport),
            clock,
            config.lookup.clone(),
            metrics,
            span,
        ))
    }

    pub fn service(&self) -> &'static ServiceDescriptor {
        self.service
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Look up `ids` with the configured timeout and no cancellation.
    pub async fn lookup<S: AsRef<str> + Sync>(
        &self,
        ids: &[S],
    ) -> Result<LookupResult, LookupError> {
        self.lookup_with(ids, LookupOptions::default()).await
    }

    pub async fn lookup_with<S: AsRef<str> + Sync>(
        &self,
        ids: &[S],
        options: LookupOptions,
    ) -> Result<LookupResult, LookupError> {
        let mode = self.service.lookup_mode;
        let result = self
            .run_lookup(ids, options)
            .instrument(self.span.clone())
            .await;

        let label = match &result {
            Ok(r) if r.is_complete() => "complete",
            Ok(_) => "partial",
            Err(_) => "failed",
        };
        self.metrics
            .lookups
            .with_label_values(&[mode.as_str(), label])
            .inc();
        if let Ok(r) = &result {
            for entry in &r.entries {
                self.metrics
                    .item_outcomes
                    .with_label_values(&[mode.as_str(), entry.outcome.label()])
                    .inc();
            }
        }
        result
    }

    /// A valid ticket, renewing if the held one is absent or expired.
    pub async fn ticket(&self) -> Result<Arc<AuthorizationTicket>, LookupError> {
        let (ticket, _) = self
            .cache
            .get_or_renew(Some(self.config.timeout()))
            .instrument(self.span.clone())
            .await?;
        Ok(ticket)
    }

    /// Authenticate now, replacing the held ticket even if it is still valid.
    pub async fn refresh_ticket(&self) -> Result<Arc<AuthorizationTicket>, LookupError> {
        let ticket = self
            .cache
            .renew(Some(self.config.timeout()))
            .instrument(self.span.clone())
            .await?;
        Ok(ticket)
    }

    /// Install a previously obtained ticket. It is used as long as it is valid.
    pub async fn seed_ticket(&self, ticket: AuthorizationTicket) {
        self.cache.seed(ticket).await;
    }

    /// The held ticket, valid or not. Never authenticates.
    pub async fn current_ticket(&self) -> Option<Arc<AuthorizationTicket>> {
        self.cache.current().await
    }

    /// Drop the held ticket; the next lookup authenticates.
    pub async fn invalidate_ticket(&self) {
        self.cache.invalidate().await;
    }

    /// Query the service health check. No ticket is involved.
    pub async fn server_status(&self) -> Result<ServerStatus, LookupError> {
        let timeout = self.config.timeout();
        let started = Instant::now();
        let result = bounded(timeout, self.transport.dummy(Some(timeout)))
            .instrument(self.span.clone())
            .await;
        self.metrics
            .observe_call("dummy", result.is_ok(), started.elapsed().as_secs_f64());

        let status = result.map_err(LookupError::from_remote)?;
        if !status.is_operational() {
            warn!(
                app = %status.app_server,
                auth = %status.auth_server,
                db = %status.db_server,
                "Service reports degraded status"
            );
        }
        Ok(status)
    }

    async fn run_lookup<S: AsRef<str> + Sync>(
        &self,
        ids: &[S],
        options: LookupOptions,
    ) -> Result<LookupResult, LookupError> {
        if ids.is_empty() {
            debug!("Empty lookup, nothing to do");
            return Ok(LookupResult::complete(Vec::new()));
        }
        if ids.len() > self.config.max_batch_size {
            return Err(LookupError::BatchTooLarge {
                size: ids.len(),
                max: self.config.max_batch_size,
            });
        }

        let identifiers: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
        let numeric = parse_identifiers(&identifiers)?;
        let timeout = options.timeout.unwrap_or_else(|| self.config.timeout());

        if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            debug!("Lookup cancelled before start");
            return Ok(all_cancelled(identifiers));
        }

        let renewal = self.cache.get_or_renew(Some(timeout));
        let (ticket, source) = match &options.cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(count = identifiers.len(), "Lookup cancelled while authenticating");
                        return Ok(all_cancelled(identifiers));
                    }
                    result = renewal => result?,
                }
            }
            None => renewal.await?,
        };
        let credentials = request_credentials(&ticket)?;

        info!(
            service = self.service.service_name,
            mode = self.service.lookup_mode.as_str(),
            count = identifiers.len(),
            ticket_renewed = source == TicketSource::Renewed,
            "Starting lookup"
        );

        match self.service.lookup_mode {
            LookupMode::Batch => {
                self.run_batch(identifiers, &numeric, &credentials, timeout, &options)
                    .await
            }
            LookupMode::PerItem => {
                self.run_per_item(identifiers, &numeric, &credentials, timeout, &options)
                    .await
            }
        }
    }

    /// One call for the whole list; any failure fails the lookup.
    async fn run_batch(
        &self,
        identifiers: Vec<String>,
        numeric: &[u64],
        credentials: &RequestCredentials,
        timeout: Duration,
        options: &LookupOptions,
    ) -> Result<LookupResult, LookupError> {
        let started = Instant::now();
        let call = bounded(
            timeout,
            self.transport
                .get_persona_list(credentials, numeric, Some(timeout)),
        );

        let result = match &options.cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(count = identifiers.len(), "Batch lookup cancelled");
                        return Ok(all_cancelled(identifiers));
                    }
                    result = call => result,
                }
            }
            None => call.await,
        };
        self.metrics.observe_call(
            "getPersonaList_v2",
            result.is_ok(),
            started.elapsed().as_secs_f64(),
        );

        let records = result.map_err(|e| {
            warn!(error = %e, count = identifiers.len(), "Batch lookup failed");
            LookupError::from_remote(e)
        })?;

        if records.len() != identifiers.len() {
            return Err(LookupError::RecordCountMismatch {
                requested: identifiers.len(),
                returned: records.len(),
            });
        }

        let entries = identifiers
            .into_iter()
            .zip(records)
            .map(|(identifier, record)| LookupEntry {
                identifier,
                outcome: LookupOutcome::Found(record),
            })
            .collect();

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch lookup complete"
        );
        Ok(LookupResult::complete(entries))
    }

    /// One call per identifier with bounded concurrency. Failures stay with
    /// their identifier; cancellation keeps what finished and marks the rest.
    async fn run_per_item(
        &self,
        identifiers: Vec<String>,
        numeric: &[u64],
        credentials: &RequestCredentials,
        timeout: Duration,
        options: &LookupOptions,
    ) -> Result<LookupResult, LookupError> {
        let cancel = options.cancel.clone().unwrap_or_default();
        let concurrency = self.config.max_concurrency.max(1);

        let mut outcomes = stream::iter(numeric.iter().copied())
            .map(|id| self.fetch_one(credentials, id, timeout))
            .buffered(concurrency);

        let mut finished: Vec<LookupOutcome> = Vec::with_capacity(identifiers.len());
        let mut cancelled = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = outcomes.next() => match next {
                    Some(outcome) => finished.push(outcome),
                    None => break,
                },
            }
        }
        // Dropping the stream aborts the calls still in flight.
        drop(outcomes);

        let done = finished.len();
        let total = identifiers.len();
        let entries: Vec<LookupEntry> = identifiers
            .into_iter()
            .zip(
                finished
                    .into_iter()
                    .chain(std::iter::repeat_with(|| LookupOutcome::Failed(ItemError::Cancelled))),
            )
            .map(|(identifier, outcome)| LookupEntry {
                identifier,
                outcome,
            })
            .collect();

        if cancelled {
            info!(completed = done, total, "Per-item lookup cancelled");
            return Ok(LookupResult::partial(
                entries,
                format!("cancelled after {} of {} identifiers", done, total),
            ));
        }

        let failures = entries
            .iter()
            .filter(|e| e.outcome.error().is_some())
            .count();
        info!(total, failures, "Per-item lookup complete");
        Ok(LookupResult::complete(entries))
    }

    async fn fetch_one(
        &self,
        credentials: &RequestCredentials,
        id: u64,
        timeout: Duration,
    ) -> LookupOutcome {
        let started = Instant::now();
        let result = bounded(
            timeout,
            self.transport.get_persona(credentials, id, Some(timeout)),
        )
        .await;
        self.metrics
            .observe_call("getPersona", result.is_ok(), started.elapsed().as_secs_f64());

        match result {
            Ok(record) => LookupOutcome::Found(record),
            Err(e) => {
                warn!(identifier = id, error = %e, "Lookup failed for identifier");
                LookupOutcome::Failed(ItemError::from_remote(e))
            }
        }
    }
}

/// Run a remote call under `timeout`.
async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, SoapError>>,
) -> Result<T, SoapError> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| SoapError::Timeout(timeout))?
}

fn parse_identifiers(identifiers: &[String]) -> Result<Vec<u64>, LookupError> {
    identifiers
        .iter()
        .map(|id| {
            id.trim()
                .parse::<u64>()
                .map_err(|_| LookupError::InvalidIdentifier(id.clone()))
        })
        .collect()
}

fn request_credentials(ticket: &AuthorizationTicket) -> Result<RequestCredentials, LookupError> {
    let principal = ticket.principal_number().ok_or(LookupError::PrincipalMissing)?;
    Ok(RequestCredentials {
        token: ticket.token.clone(),
        sign: ticket.sign.clone(),
        principal,
    })
}

fn all_cancelled(identifiers: Vec<String>) -> LookupResult {
    let total = identifiers.len();
    let entries = identifiers
        .into_iter()
        .map(|identifier| LookupEntry {
            identifier,
            outcome: LookupOutcome::Failed(ItemError::Cancelled),
        })
        .collect();
    LookupResult::partial(
        entries,
        format!("cancelled after 0 of {} identifiers", total),
    )
}
