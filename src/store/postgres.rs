// src/store/postgres.rs

use std::{
    collections::{BTreeSet, HashMap},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};

use super::{
    Document, DocumentStore, Presence, StoreError, document_id,
    eval::run_pipeline,
    pipeline::{Stage, referenced_collections},
    query::{Filter, Update},
    stamp_new,
};
use crate::models::id::ObjectId;

/// PostgreSQL engine. Every document is one row of the `documents` table:
/// `(collection, id, body JSONB, presence_key)`.
///
/// Equality filters are pushed down as JSONB containment and re-checked in process.
/// Aggregations load the collections they touch and run through the shared evaluator.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with a bounded retry loop, then applies migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let mut retry_count = 0;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count > 5 {
                        return Err(StoreError::Backend(format!(
                            "failed to connect to database after 5 retries: {}",
                            e
                        )));
                    }
                    tracing::warn!(
                        "Database not ready, retrying in 2s... (Attempt {})",
                        retry_count
                    );
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };
        tracing::info!("Database connected...");

        tracing::info!("Running migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tracing::info!("Migrations applied successfully.");

        Ok(Self::new(pool))
    }

    async fn load(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let rows: Vec<Json<Document>> = match filter.containment() {
            Some(containment) => {
                sqlx::query_scalar(
                    "SELECT body FROM documents WHERE collection = $1 AND body @> $2 ORDER BY seq",
                )
                .bind(collection)
                .bind(Json(containment))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT body FROM documents WHERE collection = $1 ORDER BY seq")
                    .bind(collection)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        // Rows excluded by containment never come back; the recheck only drops extra rows.
        Ok(rows
            .into_iter()
            .map(|Json(doc)| doc)
            .filter(|doc| filter.matches(doc))
            .collect())
    }
}

/// Canonical key for a presence pair. `serde_json::Map` keeps keys sorted.
fn presence_key(pair: &Document) -> Result<String, StoreError> {
    serde_json::to_string(pair).map_err(|e| StoreError::Malformed(e.to_string()))
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        let doc = stamp_new(doc);
        let id = document_id(&doc)?;

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id.to_hex())
            .bind(Json(&doc))
            .execute(&self.pool)
            .await?;

        Ok(doc)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        self.load(collection, filter).await
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        let row: Option<Json<Document>> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id.to_hex())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn find_by_id_and_update(
        &self,
        collection: &str,
        id: &ObjectId,
        update: &Update,
    ) -> Result<Option<Document>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<Json<Document>> = sqlx::query_scalar(
            "SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id.to_hex())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(Json(mut doc)) = row else {
            return Ok(None);
        };
        update.apply(&mut doc);

        sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id.to_hex())
            .bind(Json(&doc))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(doc))
    }

    async fn find_by_id_and_delete(
        &self,
        collection: &str,
        id: &ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        let row: Option<Json<Document>> = sqlx::query_scalar(
            "DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING body",
        )
        .bind(collection)
        .bind(id.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Stage],
    ) -> Result<Vec<Document>, StoreError> {
        // A leading match narrows the base collection in the database.
        let (base_filter, rest) = match pipeline.split_first() {
            Some((Stage::Match(filter), rest)) => (filter.clone(), rest),
            _ => (Filter::All, pipeline),
        };
        let input = self.load(collection, &base_filter).await?;

        let mut joined = BTreeSet::new();
        referenced_collections(rest, &mut joined);
        let mut source: HashMap<String, Vec<Document>> = HashMap::new();
        for name in joined {
            let docs = self.load(&name, &Filter::All).await?;
            source.insert(name, docs);
        }

        tracing::debug!(
            collection,
            pipeline = %super::pipeline::to_json(pipeline),
            "running aggregation"
        );
        Ok(run_pipeline(rest, input, &source))
    }

    async fn toggle_presence(
        &self,
        collection: &str,
        pair: Document,
    ) -> Result<Presence, StoreError> {
        let key = presence_key(&pair)?;
        let mut tx = self.pool.begin().await?;

        let removed: Option<String> = sqlx::query_scalar(
            "DELETE FROM documents WHERE collection = $1 AND presence_key = $2 RETURNING id",
        )
        .bind(collection)
        .bind(&key)
        .fetch_optional(&mut *tx)
        .await?;

        if removed.is_some() {
            tx.commit().await?;
            return Ok(Presence::Absent);
        }

        let doc = stamp_new(pair);
        let id = document_id(&doc)?;
        // A concurrent toggle that inserted first leaves the pair present; either way it exists once.
        sqlx::query(
            "INSERT INTO documents (collection, id, body, presence_key) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (collection, presence_key) DO NOTHING",
        )
        .bind(collection)
        .bind(id.to_hex())
        .bind(Json(Value::Object(doc)))
        .bind(&key)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Presence::Present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presence_key_ignores_field_order() {
        let a: Document = json!({ "video": "v", "likedBy": "u" }).as_object().cloned().unwrap();
        let mut b = Document::new();
        b.insert("likedBy".into(), json!("u"));
        b.insert("video".into(), json!("v"));
        assert_eq!(presence_key(&a).unwrap(), presence_key(&b).unwrap());
    }
}
