//! Prometheus metrics for the client.
//!
//! This module provides metrics for:
//! - Ticket renewals
//! - Lookups and per-identifier outcomes
//! - Remote call latency
//!
//! Collectors live on a `Metrics` value; callers decide which registry they
//! go into.

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

#[derive(Debug, Clone)]
pub struct Metrics {
    // =========================================================================
    // Authentication
    // =========================================================================
    /// Ticket renewals by result ("success", "failed").
    pub ticket_renewals: IntCounterVec,
    /// Cached ticket reuses vs renewals ("hit", "miss").
    pub ticket_cache: IntCounterVec,

    // =========================================================================
    // Lookups
    // =========================================================================
    /// Lookups by mode ("batch", "per_item") and result
    /// ("complete", "partial", "failed").
    pub lookups: IntCounterVec,
    /// Per-identifier outcomes by mode and outcome
    /// ("found", "remote_error", "timeout", "cancelled").
    pub item_outcomes: IntCounterVec,

    // =========================================================================
    // Remote calls
    // =========================================================================
    /// Remote call duration by operation and result.
    pub remote_call_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            ticket_renewals: IntCounterVec::new(
                Opts::new(
                    "padron_ticket_renewals_total",
                    "Total authorization ticket renewals",
                ),
                &["result"],
            )?,
            ticket_cache: IntCounterVec::new(
                Opts::new(
                    "padron_ticket_cache_total",
                    "Ticket cache lookups by outcome",
                ),
                &["outcome"],
            )?,
            lookups: IntCounterVec::new(
                Opts::new("padron_lookups_total", "Total lookup requests"),
                &["mode", "result"],
            )?,
            item_outcomes: IntCounterVec::new(
                Opts::new(
                    "padron_lookup_items_total",
                    "Per-identifier lookup outcomes",
                ),
                &["mode", "outcome"],
            )?,
            remote_call_duration: HistogramVec::new(
                HistogramOpts::new(
                    "padron_remote_call_duration_seconds",
                    "Duration of remote service calls",
                )
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
                &["operation", "result"],
            )?,
        })
    }

    /// Register every collector into `registry`.
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.ticket_renewals.clone()))?;
        registry.register(Box::new(self.ticket_cache.clone()))?;
        registry.register(Box::new(self.lookups.clone()))?;
        registry.register(Box::new(self.item_outcomes.clone()))?;
        registry.register(Box::new(self.remote_call_duration.clone()))?;
        Ok(())
    }

    pub(crate) fn observe_call(&self, operation: &str, ok: bool, seconds: f64) {
        self.remote_call_duration
            .with_label_values(&[operation, result_label(ok)])
            .observe(seconds);
    }
}

pub(crate) fn result_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failed"
    }
}

/// Render a registry in the Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
