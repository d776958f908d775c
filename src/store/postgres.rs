//! PostgreSQL message store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Idempotency
//!
//! `create_message` is a single `INSERT … ON CONFLICT DO NOTHING`; the
//! affected-row count decides `Created` vs `AlreadyExists`, so the gate is
//! atomic per `message_id` even across service replicas.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;

use crate::env::{env_or, env_string};
use crate::types::{AnalysisSummary, MessageRecord, TranscriptRecord};
use super::{CreateOutcome, MessageStore};

/// DDL for the three tables this store writes.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        message_id     TEXT PRIMARY KEY,
        engagement_id  TEXT NOT NULL,
        thread_id      TEXT,
        from_address   TEXT,
        to_address     TEXT,
        subject        TEXT,
        body_plain     TEXT NOT NULL DEFAULT '',
        body_html      TEXT NOT NULL DEFAULT '',
        sent_date      TEXT,
        headers        JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transcripts (
        id                  TEXT PRIMARY KEY,
        message_id          TEXT NOT NULL REFERENCES messages(message_id),
        content             TEXT NOT NULL,
        normalized_hash     TEXT NOT NULL,
        sequence_index      INTEGER NOT NULL,
        quote_depth         INTEGER NOT NULL,
        visual_style        TEXT NOT NULL DEFAULT '{}',
        attributed_to       TEXT,
        attribution_method  TEXT,
        tags                JSONB NOT NULL DEFAULT '[]'::jsonb,
        UNIQUE (message_id, sequence_index)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_transcripts_hash ON transcripts (normalized_hash)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS message_analysis (
        message_id   TEXT PRIMARY KEY REFERENCES messages(message_id),
        summary      JSONB NOT NULL,
        policy_id    TEXT NOT NULL,
        policy_hash  TEXT NOT NULL,
        updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: env_string("DATABASE_URL")
                .unwrap_or_else(|| "postgresql://localhost/forensics".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresStoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// PostgreSQL message store.
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if missing.
    pub async fn run_migrations(&self) -> Result<(), PostgresStoreError> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!(statements = SCHEMA_STATEMENTS.len(), "Schema ensured");
        Ok(())
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    type Error = PostgresStoreError;

    async fn create_message(&self, record: &MessageRecord) -> Result<CreateOutcome, Self::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (
                message_id, engagement_id, thread_id, from_address, to_address,
                subject, body_plain, body_html, sent_date, headers
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (message_id) DO NOTHING
            "#,
        )
        .bind(&record.message_id)
        .bind(&record.engagement_id)
        .bind(&record.thread_id)
        .bind(&record.from_address)
        .bind(&record.to_address)
        .bind(&record.subject)
        .bind(&record.body_plain)
        .bind(&record.body_html)
        .bind(&record.sent_date)
        .bind(Json(&record.headers))
        .execute(&self.pool)
        .await?;

        Ok(if result.rows_affected() == 0 {
            CreateOutcome::AlreadyExists
        } else {
            CreateOutcome::Created
        })
    }

    async fn batch_create_transcripts(&self, transcripts: &[TranscriptRecord]) -> Result<(), Self::Error> {
        let mut tx = self.pool.begin().await?;

        for record in transcripts {
            sqlx::query(
                r#"
                INSERT INTO transcripts (
                    id, message_id, content, normalized_hash, sequence_index,
                    quote_depth, visual_style, attributed_to, attribution_method, tags
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE SET
                    attributed_to = EXCLUDED.attributed_to,
                    attribution_method = EXCLUDED.attribution_method,
                    tags = EXCLUDED.tags
                "#,
            )
            .bind(&record.id)
            .bind(&record.message_id)
            .bind(&record.content)
            .bind(&record.normalized_hash)
            .bind(record.sequence_index as i32)
            .bind(record.quote_depth as i32)
            .bind(&record.visual_style)
            .bind(&record.attributed_to)
            .bind(record.attribution_method.map(|m| m.as_str()))
            .bind(Json(&record.tags))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(count = transcripts.len(), "Transcripts written");
        Ok(())
    }

    async fn store_analysis_summary(
        &self,
        message_id: &str,
        summary: &AnalysisSummary,
    ) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO message_analysis (message_id, summary, policy_id, policy_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (message_id) DO UPDATE SET
                summary = EXCLUDED.summary,
                policy_id = EXCLUDED.policy_id,
                policy_hash = EXCLUDED.policy_hash,
                updated_at = now()
            "#,
        )
        .bind(message_id)
        .bind(Json(summary))
        .bind(&summary.policy_id)
        .bind(&summary.policy_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
