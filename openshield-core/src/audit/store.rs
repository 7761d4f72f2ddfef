//! Relational collaborator: audit trail, usage and API key lookups

use super::types::{ApiKeyRecord, AuditRecord, StoreResult, UsageRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Append-only sink for audit and usage records
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one audit record and return its id
    async fn insert_audit_log(&self, record: &AuditRecord) -> StoreResult<Uuid>;

    async fn insert_usage(&self, record: &UsageRecord) -> StoreResult<()>;
}

/// Read-only view of the `api_keys` table
#[async_trait]
pub trait ApiKeyDirectory: Send + Sync {
    /// Resolve an active key; inactive and unknown keys are `None`
    async fn lookup(&self, api_key: &str) -> StoreResult<Option<ApiKeyRecord>>;
}

#[derive(Default)]
struct Tables {
    audit_logs: Vec<AuditRecord>,
    usage: Vec<UsageRecord>,
    api_keys: HashMap<String, ApiKeyRecord>,
}

/// In-process store used when no database is configured
#[derive(Default)]
pub struct MemoryAuditStore {
    tables: Mutex<Tables>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active key
    pub fn with_api_key(self, api_key: impl Into<String>, record: ApiKeyRecord) -> Self {
        self.lock().api_keys.insert(api_key.into(), record);
        self
    }

    pub fn audit_logs(&self) -> Vec<AuditRecord> {
        self.lock().audit_logs.clone()
    }

    pub fn usage(&self) -> Vec<UsageRecord> {
        self.lock().usage.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AuditSink for MemoryAuditStore {
    async fn insert_audit_log(&self, record: &AuditRecord) -> StoreResult<Uuid> {
        self.lock().audit_logs.push(record.clone());
        Ok(record.id)
    }

    async fn insert_usage(&self, record: &UsageRecord) -> StoreResult<()> {
        self.lock().usage.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl ApiKeyDirectory for MemoryAuditStore {
    async fn lookup(&self, api_key: &str) -> StoreResult<Option<ApiKeyRecord>> {
        Ok(self.lock().api_keys.get(api_key).copied())
    }
}

impl std::fmt::Debug for MemoryAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.lock();
        f.debug_struct("MemoryAuditStore")
            .field("audit_logs", &tables.audit_logs.len())
            .field("usage", &tables.usage.len())
            .field("api_keys", &tables.api_keys.len())
            .finish()
    }
}
