//! Lookup lifecycle integration tests.
//!
//! These tests drive the orchestrator against mock ticket and registry
//! transports: ticket reuse and renewal, batch and per-item retrieval,
//! cancellation and early validation.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use padron_core::{
    testing::{fixtures, MockPadronTransport, MockTicketProvider},
    AuthError, FixedClock, ItemError, LookupConfig, LookupError, LookupOptions,
    LookupOrchestrator, LookupOutcome, Metrics, ServiceKind,
};

/// Test helper holding the orchestrator and its mocks.
struct TestHarness {
    orchestrator: Arc<LookupOrchestrator>,
    provider: Arc<MockTicketProvider>,
    transport: Arc<MockPadronTransport>,
    clock: Arc<FixedClock>,
}

impl TestHarness {
    fn new(kind: ServiceKind) -> Self {
        Self::with_config(kind, LookupConfig::default())
    }

    fn with_config(kind: ServiceKind, config: LookupConfig) -> Self {
        let clock = Arc::new(FixedClock::new(
            DateTime::parse_from_rfc3339("2024-05-01T10:00:00-03:00").unwrap(),
        ));
        let provider = Arc::new(MockTicketProvider::new(clock.clone()));
        let transport = Arc::new(MockPadronTransport::new());
        let orchestrator = Arc::new(LookupOrchestrator::new(
            kind.descriptor(),
            provider.clone(),
            transport.clone(),
            clock.clone(),
            config,
            Metrics::new().unwrap(),
            Span::none(),
        ));

        Self {
            orchestrator,
            provider,
            transport,
            clock,
        }
    }
}

// =============================================================================
// Ticket lifecycle
// =============================================================================

#[tokio::test]
async fn test_expired_ticket_triggers_exactly_one_authentication() {
    let h = TestHarness::new(ServiceKind::ConstanciaInscripcion);
    h.orchestrator
        .seed_ticket(fixtures::ticket(
            "2024-05-01T09:00:00-03:00",
            Some("20123456789"),
        ))
        .await;

    h.orchestrator.lookup(&["20000000001"]).await.unwrap();

    assert_eq!(h.provider.issue_count().await, 1);
    let calls = h.transport.calls().await;
    assert_eq!(calls.len(), 1);
    // The resource call used the renewed ticket, not the seeded one.
    assert_eq!(calls[0].token, "mock-token-1");
}

#[tokio::test]
async fn test_valid_cached_ticket_needs_no_authentication() {
    let h = TestHarness::new(ServiceKind::ConstanciaInscripcion);
    h.orchestrator
        .seed_ticket(fixtures::ticket(
            "2024-05-01T22:00:00-03:00",
            Some("20123456789"),
        ))
        .await;

    h.orchestrator.lookup(&["20000000001"]).await.unwrap();
    h.orchestrator.lookup(&["20000000002"]).await.unwrap();

    assert_eq!(h.provider.issue_count().await, 0);
    assert_eq!(h.transport.calls().await.len(), 2);
}

#[tokio::test]
async fn test_ticket_renewed_after_clock_passes_expiration() {
    let h = TestHarness::new(ServiceKind::PadronA13);

    h.orchestrator.lookup(&["1"]).await.unwrap();
    h.orchestrator.lookup(&["2"]).await.unwrap();
    assert_eq!(h.provider.issue_count().await, 1);

    h.clock.advance(chrono::Duration::hours(12));
    h.orchestrator.lookup(&["3"]).await.unwrap();
    assert_eq!(h.provider.issue_count().await, 2);

    let tokens: Vec<_> = h.transport.calls().await.into_iter().map(|c| c.token).collect();
    assert_eq!(tokens, vec!["mock-token-1", "mock-token-1", "mock-token-2"]);
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_renewal() {
    let h = TestHarness::new(ServiceKind::PadronA13);
    h.provider.set_delay(Duration::from_millis(100)).await;

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let orchestrator = h.orchestrator.clone();
        handles.push(tokio::spawn(async move {
            let id = (20000000000 + i).to_string();
            orchestrator.lookup(&[id]).await
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.is_complete());
    }

    assert_eq!(h.provider.issue_count().await, 1);
    let calls = h.transport.calls().await;
    assert_eq!(calls.len(), 8);
    assert!(calls.iter().all(|c| c.token == "mock-token-1"));
}

#[tokio::test]
async fn test_authentication_failure_surfaces_as_auth_error() {
    let h = TestHarness::new(ServiceKind::ConstanciaInscripcion);
    h.provider
        .set_next_error(AuthError::MalformedTicket("expirationTime is missing".to_string()))
        .await;

    let result = h.orchestrator.lookup(&["1"]).await;
    assert!(matches!(
        result,
        Err(LookupError::Auth(AuthError::MalformedTicket(_)))
    ));
    assert!(h.transport.calls().await.is_empty());

    // The failure is not cached; the next lookup authenticates again.
    h.orchestrator.lookup(&["1"]).await.unwrap();
    assert_eq!(h.provider.issue_count().await, 2);
}

#[tokio::test]
async fn test_concurrent_lookups_share_failed_renewal() {
    let h = TestHarness::new(ServiceKind::ConstanciaInscripcion);
    h.provider.set_delay(Duration::from_millis(100)).await;
    h.provider
        .set_next_error(AuthError::Signing("coe.alreadyAuthenticated".to_string()))
        .await;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.lookup(&["20123456789"]).await })
        })
        .collect();
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(LookupError::Auth(_))));
    }

    // The waiters reused the failed outcome instead of logging in again.
    assert_eq!(h.provider.issue_count().await, 1);
    assert!(h.transport.calls().await.is_empty());
}

#[tokio::test]
async fn test_missing_principal_fails_before_resource_call() {
    for kind in ServiceKind::ALL {
        let h = TestHarness::new(kind);
        h.provider.set_principal(None).await;

        let result = h.orchestrator.lookup(&["20000000001", "20000000002"]).await;

        assert!(matches!(result, Err(LookupError::PrincipalMissing)));
        assert_eq!(h.provider.issue_count().await, 1);
        assert!(h.transport.calls().await.is_empty());
    }
}

// =============================================================================
// Batch retrieval
// =============================================================================

#[tokio::test]
async fn test_batch_results_follow_input_order() {
    let h = TestHarness::new(ServiceKind::ConstanciaInscripcion);
    let ids = ["20000000003", "20000000001", "20000000002"];

    let result = h.orchestrator.lookup(&ids).await.unwrap();

    assert!(result.is_complete());
    let pairs: Vec<_> = result
        .found()
        .map(|(id, record)| (id.to_string(), record.tax_id.clone().unwrap()))
        .collect();
    assert_eq!(
        pairs,
        ids.iter()
            .map(|id| (id.to_string(), id.to_string()))
            .collect::<Vec<_>>()
    );

    let calls = h.transport.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, "getPersonaList_v2");
    assert_eq!(calls[0].ids, vec![20000000003, 20000000001, 20000000002]);
    assert_eq!(calls[0].principal, 20123456789);
}

#[tokio::test]
async fn test_batch_cancelled_returns_partial() {
    let h = TestHarness::new(ServiceKind::ConstanciaInscripcion);
    h.transport.set_delay(Duration::from_millis(500)).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let options = LookupOptions::default().with_cancel(cancel);
    let result = h
        .orchestrator
        .lookup_with(&["1", "2"], options)
        .await
        .unwrap();

    assert!(!result.is_complete());
    assert_eq!(result.len(), 2);
    assert!(result
        .entries
        .iter()
        .all(|e| e.outcome == LookupOutcome::Failed(ItemError::Cancelled)));
}

// =============================================================================
// Per-item retrieval
// =============================================================================

#[tokio::test]
async fn test_per_item_failure_is_isolated() {
    let h = TestHarness::new(ServiceKind::PadronA13);
    h.transport
        .fail_id(20000000002, "No existe persona con ese Id")
        .await;

    let result = h
        .orchestrator
        .lookup(&["20000000001", "20000000002", "20000000003"])
        .await
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(result.len(), 3);
    let identifiers: Vec<_> = result.entries.iter().map(|e| e.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["20000000001", "20000000002", "20000000003"]);

    assert!(result.entries[0].outcome.record().is_some());
    match &result.entries[1].outcome {
        LookupOutcome::Failed(ItemError::Remote { message }) => {
            assert!(message.contains("No existe persona"));
        }
        other => panic!("expected remote failure, got {:?}", other),
    }
    assert!(result.entries[2].outcome.record().is_some());
    assert_eq!(h.transport.calls().await.len(), 3);
}

#[tokio::test]
async fn test_per_item_order_preserved_when_calls_finish_out_of_order() {
    let h = TestHarness::new(ServiceKind::PadronA13);
    h.transport.set_item_delay(1, Duration::from_millis(80)).await;
    h.transport.set_item_delay(2, Duration::from_millis(40)).await;

    let result = h.orchestrator.lookup(&["1", "2", "3"]).await.unwrap();

    let tax_ids: Vec<_> = result
        .found()
        .map(|(_, record)| record.tax_id.clone().unwrap())
        .collect();
    assert_eq!(tax_ids, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_per_item_cancellation_keeps_completed_outcomes() {
    let config = LookupConfig {
        max_concurrency: 1,
        ..Default::default()
    };
    let h = TestHarness::with_config(ServiceKind::PadronA13, config);
    h.orchestrator.ticket().await.unwrap();
    h.transport.set_item_delay(3, Duration::from_secs(5)).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let options = LookupOptions::default().with_cancel(cancel);
    let result = h
        .orchestrator
        .lookup_with(&["1", "2", "3", "4", "5"], options)
        .await
        .unwrap();

    assert!(!result.is_complete());
    assert_eq!(result.len(), 5);
    assert!(result.entries[0].outcome.record().is_some());
    assert!(result.entries[1].outcome.record().is_some());
    for entry in &result.entries[2..] {
        assert_eq!(entry.outcome, LookupOutcome::Failed(ItemError::Cancelled));
    }
    // Identifiers after the cancelled one were never sent.
    assert_eq!(h.transport.calls().await.len(), 3);
}

#[tokio::test]
async fn test_already_cancelled_lookup_does_not_authenticate() {
    let h = TestHarness::new(ServiceKind::PadronA13);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h
        .orchestrator
        .lookup_with(&["1", "2"], LookupOptions::default().with_cancel(cancel))
        .await
        .unwrap();

    assert!(!result.is_complete());
    assert_eq!(result.failed().count(), 2);
    assert_eq!(h.provider.issue_count().await, 0);
}

#[tokio::test]
async fn test_cancel_during_authentication_returns_promptly() {
    let h = TestHarness::new(ServiceKind::PadronA13);
    h.provider.set_delay(Duration::from_millis(1500)).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let result = h
        .orchestrator
        .lookup_with(&["1", "2", "3"], LookupOptions::default().with_cancel(cancel))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(1000));
    assert!(!result.is_complete());
    assert_eq!(result.failed().count(), 3);
    assert!(result
        .entries
        .iter()
        .all(|e| e.outcome == LookupOutcome::Failed(ItemError::Cancelled)));
    assert!(h.transport.calls().await.is_empty());
    assert!(h.orchestrator.current_ticket().await.is_none());
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_invalid_identifiers_fail_before_any_call() {
    for kind in ServiceKind::ALL {
        let h = TestHarness::new(kind);

        let result = h.orchestrator.lookup(&["20000000001", "20-0000000-2"]).await;

        assert!(matches!(result, Err(LookupError::InvalidIdentifier(_))));
        assert_eq!(h.provider.issue_count().await, 0);
        assert!(h.transport.calls().await.is_empty());
    }
}

#[tokio::test]
async fn test_oversized_batch_is_rejected() {
    let h = TestHarness::new(ServiceKind::ConstanciaInscripcion);
    let ids: Vec<String> = (0..251u64).map(|i| (20000000000 + i).to_string()).collect();

    let result = h.orchestrator.lookup(&ids).await;

    assert!(matches!(
        result,
        Err(LookupError::BatchTooLarge { size: 251, max: 250 })
    ));
    assert!(h.transport.calls().await.is_empty());
}
