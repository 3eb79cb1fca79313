//! Lookup orchestration.
//!
//! The orchestrator ties the ticket lifecycle to registry lookups:
//! - **Ticket**: reused while valid, renewed under a lock when absent or expired
//! - **Batch services**: one call for the whole list, all-or-nothing
//! - **Per-item services**: one call per identifier with bounded concurrency,
//!   failures recorded per identifier

mod cache;
mod config;
mod runner;
mod types;

pub use cache::{TicketCache, TicketSource};
pub use config::LookupConfig;
pub use runner::LookupOrchestrator;
pub use types::{
    Completion, ItemError, LookupEntry, LookupError, LookupOptions, LookupOutcome, LookupResult,
};
