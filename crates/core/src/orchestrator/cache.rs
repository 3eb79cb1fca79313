//! Renew-or-reuse holder for the authorization ticket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::metrics::{result_label, Metrics};
use crate::wsaa::{AuthError, AuthorizationTicket, TicketProvider};

/// Where a ticket handed out by the cache came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketSource {
    Cached,
    Renewed,
}

#[derive(Default)]
struct Slot {
    ticket: Option<Arc<AuthorizationTicket>>,
    /// Message of the most recent renewal, if it failed.
    last_failure: Option<String>,
}

/// Holds at most one ticket.
///
/// The check and the renewal run under one async mutex, so concurrent
/// callers that find the ticket expired trigger a single renewal and all
/// reuse its result, including its failure.
pub struct TicketCache {
    slot: Mutex<Slot>,
    /// Renewal attempts that ran to completion, successful or not.
    completed: AtomicU64,
    provider: Arc<dyn TicketProvider>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl TicketCache {
    pub fn new(
        provider: Arc<dyn TicketProvider>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            completed: AtomicU64::new(0),
            provider,
            clock,
            metrics,
        }
    }

    /// Return the held ticket if still valid, otherwise authenticate and
    /// swap in the new one. A failed renewal leaves the slot untouched.
    ///
    /// A caller that queued behind a renewal which then failed gets that
    /// failure as [`AuthError::RenewalFailed`] instead of authenticating
    /// again.
    pub async fn get_or_renew(
        &self,
        timeout: Option<Duration>,
    ) -> Result<(Arc<AuthorizationTicket>, TicketSource), AuthError> {
        let seen = self.completed.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        // Read the clock only after acquiring the lock: a waiter must see the
        // ticket its predecessor just installed as valid.
        let now = self.clock.now();
        if let Some(ticket) = slot.ticket.as_ref().filter(|t| t.is_valid(now)) {
            self.metrics.ticket_cache.with_label_values(&["hit"]).inc();
            debug!(expiration = %ticket.expiration, "Reusing cached ticket");
            return Ok((Arc::clone(ticket), TicketSource::Cached));
        }

        if self.completed.load(Ordering::Acquire) != seen {
            if let Some(reason) = &slot.last_failure {
                debug!(error = %reason, "Reusing failure of concurrent renewal");
                return Err(AuthError::RenewalFailed(reason.clone()));
            }
        }

        self.metrics.ticket_cache.with_label_values(&["miss"]).inc();
        if slot.ticket.is_some() {
            info!("Cached ticket expired, renewing");
        } else {
            info!("No ticket held, authenticating");
        }

        let ticket = self.issue(&mut slot, timeout).await?;
        Ok((ticket, TicketSource::Renewed))
    }

    /// Authenticate regardless of the held ticket's validity.
    pub async fn renew(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Arc<AuthorizationTicket>, AuthError> {
        let mut slot = self.slot.lock().await;
        self.issue(&mut slot, timeout).await
    }

    /// Install a ticket obtained elsewhere, e.g. one persisted by a previous run.
    pub async fn seed(&self, ticket: AuthorizationTicket) {
        if !ticket.is_valid(self.clock.now()) {
            warn!(expiration = %ticket.expiration, "Seeded ticket is already expired");
        }
        self.slot.lock().await.ticket = Some(Arc::new(ticket));
    }

    pub async fn invalidate(&self) {
        self.slot.lock().await.ticket = None;
    }

    /// The held ticket without validity checks.
    pub async fn current(&self) -> Option<Arc<AuthorizationTicket>> {
        self.slot.lock().await.ticket.clone()
    }

    /// Run one renewal with the slot locked and record its outcome.
    async fn issue(
        &self,
        slot: &mut Slot,
        timeout: Option<Duration>,
    ) -> Result<Arc<AuthorizationTicket>, AuthError> {
        let started = std::time::Instant::now();
        let result = self.provider.issue_ticket(timeout).await;

        self.metrics
            .ticket_renewals
            .with_label_values(&[result_label(result.is_ok())])
            .inc();
        self.metrics
            .observe_call("loginCms", result.is_ok(), started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(ticket) => {
                let ticket = Arc::new(ticket);
                slot.ticket = Some(Arc::clone(&ticket));
                slot.last_failure = None;
                Ok(ticket)
            }
            Err(e) => {
                warn!(error = %e, "Ticket renewal failed");
                slot.last_failure = Some(e.to_string());
                Err(e)
            }
        };
        self.completed.fetch_add(1, Ordering::Release);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::testing::{fixtures, MockTicketProvider};
    use chrono::{DateTime, Duration as ChronoDuration};

    fn setup() -> (TicketCache, Arc<MockTicketProvider>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            DateTime::parse_from_rfc3339("2024-05-01T10:00:00-03:00").unwrap(),
        ));
        let provider = Arc::new(MockTicketProvider::new(clock.clone()));
        let cache = TicketCache::new(provider.clone(), clock.clone(), Metrics::new().unwrap());
        (cache, provider, clock)
    }

    #[tokio::test]
    async fn test_first_use_authenticates() {
        let (cache, provider, _) = setup();

        let (_, source) = cache.get_or_renew(None).await.unwrap();
        assert_eq!(source, TicketSource::Renewed);
        assert_eq!(provider.issue_count().await, 1);
    }

    #[tokio::test]
    async fn test_valid_ticket_is_reused() {
        let (cache, provider, _) = setup();

        let (first, _) = cache.get_or_renew(None).await.unwrap();
        let (second, source) = cache.get_or_renew(None).await.unwrap();

        assert_eq!(source, TicketSource::Cached);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.issue_count().await, 1);
    }

    #[tokio::test]
    async fn test_expired_ticket_is_renewed_once() {
        let (cache, provider, clock) = setup();

        cache.get_or_renew(None).await.unwrap();
        clock.advance(ChronoDuration::hours(13));

        let (_, source) = cache.get_or_renew(None).await.unwrap();
        assert_eq!(source, TicketSource::Renewed);
        let (_, source) = cache.get_or_renew(None).await.unwrap();
        assert_eq!(source, TicketSource::Cached);
        assert_eq!(provider.issue_count().await, 2);
    }

    #[tokio::test]
    async fn test_failed_renewal_keeps_previous_ticket() {
        let (cache, provider, clock) = setup();
        cache.get_or_renew(None).await.unwrap();
        let before = cache.current().await.unwrap();

        clock.advance(ChronoDuration::hours(13));
        provider
            .set_next_error(AuthError::Signing("boom".to_string()))
            .await;

        assert!(cache.get_or_renew(None).await.is_err());
        assert!(Arc::ptr_eq(&before, &cache.current().await.unwrap()));
    }

    #[tokio::test]
    async fn test_seed_and_invalidate() {
        let (cache, provider, _) = setup();

        cache
            .seed(fixtures::ticket(
                "2024-05-01T20:00:00-03:00",
                Some("20123456789"),
            ))
            .await;
        let (ticket, source) = cache.get_or_renew(None).await.unwrap();
        assert_eq!(source, TicketSource::Cached);
        assert_eq!(ticket.principal_id.as_deref(), Some("20123456789"));
        assert_eq!(provider.issue_count().await, 0);

        cache.invalidate().await;
        assert!(cache.current().await.is_none());
        let (_, source) = cache.get_or_renew(None).await.unwrap();
        assert_eq!(source, TicketSource::Renewed);
    }

    #[tokio::test]
    async fn test_forced_renewal() {
        let (cache, provider, _) = setup();
        cache.get_or_renew(None).await.unwrap();
        cache.renew(None).await.unwrap();
        assert_eq!(provider.issue_count().await, 2);
    }

    #[tokio::test]
    async fn test_waiters_share_failed_renewal() {
        let (cache, provider, _) = setup();
        let cache = Arc::new(cache);
        provider.set_delay(Duration::from_millis(100)).await;
        provider
            .set_next_error(AuthError::Signing("boom".to_string()))
            .await;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_renew(None).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(provider.issue_count().await, 1);
    }

    #[tokio::test]
    async fn test_later_caller_retries_after_failure() {
        let (cache, provider, _) = setup();
        provider
            .set_next_error(AuthError::Signing("boom".to_string()))
            .await;

        assert!(matches!(
            cache.get_or_renew(None).await,
            Err(AuthError::Signing(_))
        ));
        let (_, source) = cache.get_or_renew(None).await.unwrap();
        assert_eq!(source, TicketSource::Renewed);
        assert_eq!(provider.issue_count().await, 2);
    }
}
