// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    Document, DocumentStore, Presence, StoreError, document_id,
    eval::run_pipeline,
    pipeline::Stage,
    query::{Filter, Update},
    stamp_new,
};
use crate::models::id::ObjectId;

/// Process-local engine. Collections are vectors in insertion order.
///
/// Writes take the single write lock, which is what makes `toggle_presence` atomic here.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(docs: &[Document], id: &ObjectId) -> Option<usize> {
        docs.iter()
            .position(|d| document_id(d).map(|found| found == *id).unwrap_or(false))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        let doc = stamp_new(doc);
        let id = document_id(&doc)?;

        let mut guard = self.collections.write().await;
        let docs = guard.entry(collection.to_string()).or_default();
        if Self::position(docs, &id).is_some() {
            return Err(StoreError::Duplicate(format!("{} {} already exists", collection, id)));
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_by_id_and_update(
        &self,
        collection: &str,
        id: &ObjectId,
        update: &Update,
    ) -> Result<Option<Document>, StoreError> {
        let mut guard = self.collections.write().await;
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = Self::position(docs, id) else {
            return Ok(None);
        };
        let doc = &mut docs[index];
        update.apply(doc);
        Ok(Some(doc.clone()))
    }

    async fn find_by_id_and_delete(
        &self,
        collection: &str,
        id: &ObjectId,
    ) -> Result<Option<Document>, StoreError> {
        let mut guard = self.collections.write().await;
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(None);
        };
        Ok(Self::position(docs, id).map(|index| docs.remove(index)))
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Stage],
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        let input = guard.get(collection).cloned().unwrap_or_default();
        Ok(run_pipeline(pipeline, input, &*guard))
    }

    async fn toggle_presence(
        &self,
        collection: &str,
        pair: Document,
    ) -> Result<Presence, StoreError> {
        let filter = Filter::from_pair(&pair);

        let mut guard = self.collections.write().await;
        let docs = guard.entry(collection.to_string()).or_default();
        match docs.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                docs.remove(index);
                Ok(Presence::Absent)
            }
            None => {
                docs.push(stamp_new(pair));
                Ok(Presence::Present)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{collections::LIKES, pipeline::SortOrder};
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_find_update_delete() {
        let store = MemoryStore::new();
        let inserted = store.insert("tweets", doc(json!({ "content": "hello" }))).await.unwrap();
        let id = document_id(&inserted).unwrap();

        let found = store.find_by_id("tweets", &id).await.unwrap().unwrap();
        assert_eq!(found["content"], "hello");

        let updated = store
            .find_by_id_and_update("tweets", &id, &Update::new().set("content", "hi"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["content"], "hi");

        let deleted = store.find_by_id_and_delete("tweets", &id).await.unwrap();
        assert!(deleted.is_some());
        assert!(store.find_by_id("tweets", &id).await.unwrap().is_none());
        assert!(store.find_by_id_and_delete("tweets", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        let inserted = store.insert("tweets", Document::new()).await.unwrap();
        let again = store.insert("tweets", inserted).await;
        assert!(matches!(again, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn toggle_presence_alternates_and_never_duplicates() {
        let store = MemoryStore::new();
        let pair = doc(json!({ "video": "v", "likedBy": "u" }));

        assert_eq!(store.toggle_presence(LIKES, pair.clone()).await.unwrap(), Presence::Present);
        assert_eq!(store.find(LIKES, &Filter::from_pair(&pair)).await.unwrap().len(), 1);
        assert_eq!(store.toggle_presence(LIKES, pair.clone()).await.unwrap(), Presence::Absent);
        assert!(store.find(LIKES, &Filter::All).await.unwrap().is_empty());
        assert_eq!(store.toggle_presence(LIKES, pair).await.unwrap(), Presence::Present);
    }

    #[tokio::test]
    async fn concurrent_toggles_leave_at_most_one_pair() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let pair = doc(json!({ "channel": "c", "subscriber": "s" }));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let pair = pair.clone();
                tokio::spawn(async move { store.toggle_presence("subscriptions", pair).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // An even number of toggles lands back on absent.
        assert!(store.find("subscriptions", &Filter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn aggregate_sees_other_collections() {
        let store = MemoryStore::new();
        store.insert("users", doc(json!({ "_id": "65a1f0c2e4b0a1b2c3d4e5f6", "username": "ann" }))).await.unwrap();
        store.insert("videos", doc(json!({ "owner": "65a1f0c2e4b0a1b2c3d4e5f6", "n": 1 }))).await.unwrap();
        store.insert("videos", doc(json!({ "owner": "65a1f0c2e4b0a1b2c3d4e5f6", "n": 2 }))).await.unwrap();

        let pipeline = vec![
            Stage::Lookup(super::super::pipeline::Lookup::new("users", "owner", "_id", "owner")),
            Stage::Unwind("owner".into()),
            Stage::Sort(vec![("n".into(), SortOrder::Desc)]),
        ];
        let out = store.aggregate("videos", &pipeline).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["n"], 2);
        assert_eq!(out[0]["owner"]["username"], "ann");
    }
}
