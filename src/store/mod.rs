// src/store/mod.rs

//! Document store abstraction.
//!
//! Handlers talk to a `DocumentStore` only. Two engines implement it: an in-memory engine used in
//! development and tests, and a PostgreSQL engine that keeps every document as a JSONB row.

pub mod eval;
pub mod memory;
pub mod pipeline;
pub mod postgres;
pub mod query;

use std::fmt;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::models::id::ObjectId;
use pipeline::Stage;
use query::{Filter, Update};

pub type Document = serde_json::Map<String, Value>;

pub mod collections {
    pub const VIDEOS: &str = "videos";
    pub const COMMENTS: &str = "comments";
    pub const LIKES: &str = "likes";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const TWEETS: &str = "tweets";
    pub const USERS: &str = "users";
}

#[derive(Debug)]
pub enum StoreError {
    /// The engine failed (connection, query, transaction).
    Backend(String),
    /// A uniqueness constraint rejected the write.
    Duplicate(String),
    /// A stored document could not be decoded into the expected shape.
    Malformed(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(msg) => write!(f, "store backend error: {}", msg),
            StoreError::Duplicate(msg) => write!(f, "duplicate document: {}", msg),
            StoreError::Malformed(msg) => write!(f, "malformed document: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Duplicate(db.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Outcome of a presence toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

impl Presence {
    pub fn is_present(self) -> bool {
        self == Presence::Present
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts `doc`, assigning `_id` when missing and stamping `createdAt`/`updatedAt`.
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    /// All matching documents in insertion order.
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.find(collection, filter).await?.into_iter().next())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        self.find_one(collection, &Filter::id(id)).await
    }

    /// Applies `update` and returns the updated document.
    async fn find_by_id_and_update(
        &self,
        collection: &str,
        id: &ObjectId,
        update: &Update,
    ) -> Result<Option<Document>, StoreError>;

    async fn find_by_id_and_delete(
        &self,
        collection: &str,
        id: &ObjectId,
    ) -> Result<Option<Document>, StoreError>;

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Stage],
    ) -> Result<Vec<Document>, StoreError>;

    /// Deletes the document equal to `pair` if one exists, otherwise inserts it.
    ///
    /// The check and the write are a single store-level operation, so concurrent toggles never
    /// leave two copies of the same pair.
    async fn toggle_presence(&self, collection: &str, pair: Document)
    -> Result<Presence, StoreError>;
}

/// Current time as fixed-width RFC 3339 (millisecond precision, `Z` suffix).
///
/// Fixed width keeps string order identical to chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Fills `_id`, `createdAt` and `updatedAt` on a document about to be inserted.
pub fn stamp_new(mut doc: Document) -> Document {
    if !doc.contains_key("_id") {
        doc.insert("_id".to_string(), ObjectId::new().into());
    }
    let now = now_timestamp();
    doc.entry("createdAt").or_insert_with(|| Value::String(now.clone()));
    doc.entry("updatedAt").or_insert_with(|| Value::String(now));
    doc
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Malformed(format!("expected an object, got {}", other))),
        Err(e) => Err(StoreError::Malformed(e.to_string())),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::Malformed(e.to_string()))
}

/// Reads `_id` back out of a stored document.
pub fn document_id(doc: &Document) -> Result<ObjectId, StoreError> {
    doc.get("_id")
        .and_then(Value::as_str)
        .and_then(|raw| ObjectId::parse(raw).ok())
        .ok_or_else(|| StoreError::Malformed("document has no valid _id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_fixed_width() {
        let ts = now_timestamp();
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with('Z'));
    }

    #[test]
    fn stamping_keeps_existing_id() {
        let id = ObjectId::new();
        let mut doc = Document::new();
        doc.insert("_id".into(), id.into());
        let stamped = stamp_new(doc);
        assert_eq!(document_id(&stamped).unwrap(), id);
        assert!(stamped.contains_key("createdAt"));
        assert_eq!(stamped["createdAt"], stamped["updatedAt"]);
    }

    #[test]
    fn stamping_assigns_an_id() {
        let stamped = stamp_new(Document::new());
        assert!(document_id(&stamped).is_ok());
    }
}
