//! PostgreSQL + pgvector backend
//!
//! One table per collection. Vectors travel as text literals cast with
//! `::vector`, and `<=>` gives cosine distance directly.

use super::{vector_literal, VectorStore};
use crate::config::VectorStoreConfig;
use crate::errors::{AppError, Result};
use crate::models::{ChunkMetadata, EmbeddingRecord, QueryHit};
use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement,
    TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

const BACKEND: &str = "pgvector";

/// Vector store backed by a pgvector table
#[derive(Clone)]
pub struct PgVectorStore {
    conn: DatabaseConnection,
    table: String,
}

/// Restrict a collection name to a safe SQL identifier
fn table_name(collection: &str) -> String {
    let mut name: String = collection
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "c_");
    }
    name
}

impl PgVectorStore {
    /// Connect, enable the extension and create the collection table
    pub async fn connect(config: &VectorStoreConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| AppError::Configuration {
            message: "vector_store.url must be set for the pgvector backend".to_string(),
        })?;

        info!("Connecting to PostgreSQL vector store...");

        let mut opts = ConnectOptions::new(url);
        opts.max_connections(config.max_connections)
            .min_connections(1)
            .connect_timeout(config.timeout())
            .sqlx_logging(false);

        let conn = Database::connect(opts).await.map_err(|e| {
            AppError::vector_store(BACKEND, format!("Failed to connect: {}", e))
        })?;

        let store = Self {
            conn,
            table: table_name(&config.collection),
        };
        store.migrate().await?;

        info!(table = %store.table, "pgvector store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        self.conn
            .execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
            .await?;

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                embedding vector NOT NULL,
                document TEXT NOT NULL,
                metadata JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table
        );
        self.conn.execute_unprepared(&sql).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn add(&self, records: &[EmbeddingRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "INSERT INTO {} (id, embedding, document, metadata) VALUES ($1, $2::vector, $3, $4)",
            self.table
        );

        let txn = self.conn.begin().await?;
        for record in records {
            let metadata = serde_json::to_value(&record.metadata)?;
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                vec![
                    record.id.into(),
                    vector_literal(&record.vector).into(),
                    record.document_text.clone().into(),
                    metadata.into(),
                ],
            );
            txn.execute(stmt).await?;
        }
        txn.commit().await?;

        debug!(added = records.len(), table = %self.table, "Records inserted");
        Ok(())
    }

    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<QueryHit>> {
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT id, document, metadata, (embedding <=> $1::vector) AS distance
            FROM {}
            ORDER BY distance
            LIMIT $2
            "#,
            self.table
        );
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![vector_literal(embedding).into(), i64::try_from(n_results).unwrap_or(i64::MAX).into()],
        );

        let rows = self.conn.query_all(stmt).await?;

        rows.into_iter()
            .map(|row| {
                let id: Uuid = row.try_get("", "id")?;
                let document: String = row.try_get("", "document")?;
                let metadata: serde_json::Value = row.try_get("", "metadata")?;
                let distance: f64 = row.try_get("", "distance")?;
                let metadata: ChunkMetadata = serde_json::from_value(metadata)?;

                Ok(QueryHit {
                    id,
                    document,
                    metadata,
                    distance: distance as f32,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<usize> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            format!("SELECT COUNT(*) AS total FROM {}", self.table),
        );
        let total = match self.conn.query_one(stmt).await? {
            Some(row) => row.try_get::<i64>("", "total")?,
            None => 0,
        };
        Ok(total.max(0) as usize)
    }

    fn backend(&self) -> &'static str {
        BACKEND
    }
}
