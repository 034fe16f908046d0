//! Result stores: store by id, fetch by id

use crate::models::SuggestionBatch;
use async_trait::async_trait;
use chrono::Utc;
use perftriage_common::{ClassifiedSet, Error, MatchedApi, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A stored analysis artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StoredAnalysis {
    Classification(ClassifiedSet),
    Matches(Vec<MatchedApi>),
    Suggestions(SuggestionBatch),
}

impl StoredAnalysis {
    pub fn kind(&self) -> &'static str {
        match self {
            StoredAnalysis::Classification(_) => "classification",
            StoredAnalysis::Matches(_) => "matches",
            StoredAnalysis::Suggestions(_) => "suggestions",
        }
    }
}

/// Key-value persistence for analysis results
///
/// Storing under an existing id replaces the previous value.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn store(&self, id: &str, analysis: &StoredAnalysis) -> Result<()>;

    /// # Errors
    /// `Error::NotFound` if nothing is stored under `id`.
    async fn fetch(&self, id: &str) -> Result<StoredAnalysis>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    entries: RwLock<HashMap<String, StoredAnalysis>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn store(&self, id: &str, analysis: &StoredAnalysis) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(id.to_string(), analysis.clone());
        tracing::debug!(id, kind = analysis.kind(), "Stored analysis in memory");
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<StoredAnalysis> {
        self.entries
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No stored analysis with id '{}'", id)))
    }
}

/// SQLite-backed store (`analysis_results` table, JSON payload column)
#[derive(Debug, Clone)]
pub struct SqliteResultStore {
    pool: SqlitePool,
}

impl SqliteResultStore {
    /// Wrap a pool created by `perftriage_common::db::init_database`
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn store(&self, id: &str, analysis: &StoredAnalysis) -> Result<()> {
        // Serialize before touching the database
        let payload = serde_json::to_string(analysis)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO analysis_results (id, kind, payload, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(analysis.kind())
        .bind(&payload)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            id,
            kind = analysis.kind(),
            bytes = payload.len(),
            "Stored analysis in database"
        );
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<StoredAnalysis> {
        let row = sqlx::query("SELECT payload FROM analysis_results WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No stored analysis with id '{}'", id)))?;

        let payload: String = row.get("payload");
        Ok(serde_json::from_str(&payload)?)
    }
}
