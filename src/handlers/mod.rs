// src/handlers/mod.rs

use serde::de::DeserializeOwned;

use crate::{
    error::AppError,
    models::id::ObjectId,
    store::{DocumentStore, from_document},
};

pub mod comment;
pub mod healthcheck;
pub mod like;
pub mod subscription;
pub mod tweet;
pub mod user;
pub mod video;

/// Loads a document by id and decodes it, or fails with `<what> not found`.
pub(crate) async fn load_by_id<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &ObjectId,
    what: &str,
) -> Result<T, AppError> {
    let doc = store
        .find_by_id(collection, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} not found", what)))?;
    Ok(from_document(doc)?)
}

/// Fails with `<what> not found` unless a document with `id` exists.
pub(crate) async fn ensure_exists(
    store: &dyn DocumentStore,
    collection: &str,
    id: &ObjectId,
    what: &str,
) -> Result<(), AppError> {
    match store.find_by_id(collection, id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("{} not found", what))),
    }
}
