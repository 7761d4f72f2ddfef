//! Audit trail, usage accounting and API key lookups
//!
//! Backed by PostgreSQL in production; [`MemoryAuditStore`] stands in when no
//! database is configured.

mod postgres;
mod store;
mod types;

pub use postgres::PostgresStore;
pub use store::{ApiKeyDirectory, AuditSink, MemoryAuditStore};
pub use types::{ApiKeyRecord, AuditRecord, MessageType, StoreError, StoreResult, UsageRecord};
