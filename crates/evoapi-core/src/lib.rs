//! evoapi-core - Evolution API client core.
//!
//! Identifier validation, request dispatch with a typed error taxonomy,
//! a TTL-bounded contact name cache and the chat enrichment pipeline that
//! uses it. Front ends (CLI, daemon) only call [`EvolutionClient`].
//!
//! Test doubles (`FakeTransport`, `ManualClock`) are only exported with the
//! `test-util` feature.
//!
//! CHANGELOG:
//! - 10/18/2026 - Test doubles moved behind `test-util`
//! - 10/18/2026 - Initial library structure

pub mod cache;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod enrich;
pub mod error;
pub mod models;
pub mod transport;
pub mod validate;

// Re-export commonly used types
pub use cache::{CacheStats, Clock, ContactCache, RebuildOutcome, SystemClock};
#[cfg(any(test, feature = "test-util"))]
pub use cache::ManualClock;
pub use client::EvolutionClient;
pub use config::{ConfigError, EvolutionConfig};
pub use dispatch::{Dispatcher, Method};
pub use enrich::Enriched;
pub use error::{EvolutionError, Result};
pub use models::{ChatSummary, ContactRecord};
pub use transport::{HttpTransport, Transport};
#[cfg(any(test, feature = "test-util"))]
pub use transport::FakeTransport;
pub use validate::{MediaType, NormalizedIdentifier, PresenceStatus};
