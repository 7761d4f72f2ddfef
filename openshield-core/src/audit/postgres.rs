//! PostgreSQL implementation of the audit collaborator
//!
//! Tables are owned by the operator; this module only inserts into `audit_logs`
//! and `usage` and reads `api_keys`.

use super::store::{ApiKeyDirectory, AuditSink};
use super::types::{ApiKeyRecord, AuditRecord, StoreResult, UsageRecord};
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(config.uri.expose_secret())
            .await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PostgresStore {
    async fn insert_audit_log(&self, record: &AuditRecord) -> StoreResult<Uuid> {
        let row = sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, api_key_id, product_id, message, message_type, log_type, ip_address, request_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(record.api_key_id)
        .bind(record.product_id)
        .bind(&record.message)
        .bind(record.message_type.as_str())
        .bind(&record.log_type)
        .bind(&record.ip_address)
        .bind(&record.request_id)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;

        let id: Uuid = row.try_get("id")?;
        debug!(audit_log_id = %id, log_type = %record.log_type, "Audit log stored");
        Ok(id)
    }

    async fn insert_usage(&self, record: &UsageRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO usage
                (id, model, predicted_tokens_count, prompt_tokens_count, completion_tokens, total_tokens,
                 finish_reason, request_type, product_id, audit_log_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            "#,
        )
        .bind(record.id)
        .bind(&record.model)
        .bind(record.predicted_tokens as i32)
        .bind(record.prompt_tokens as i32)
        .bind(record.completion_tokens as i32)
        .bind(record.total_tokens as i32)
        .bind(&record.finish_reason)
        .bind(&record.request_type)
        .bind(record.product_id)
        .bind(record.audit_log_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ApiKeyDirectory for PostgresStore {
    async fn lookup(&self, api_key: &str) -> StoreResult<Option<ApiKeyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id FROM api_keys
            WHERE api_key = $1 AND status = 'active' AND deleted_at IS NULL
            "#,
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(ApiKeyRecord {
                api_key_id: row.try_get("id")?,
                product_id: row.try_get("product_id")?,
            })
        })
        .transpose()
    }
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}
