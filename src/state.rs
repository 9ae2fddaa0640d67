// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, media::MediaStorage, store::DocumentStore};

pub type SharedStore = Arc<dyn DocumentStore>;
pub type SharedMedia = Arc<dyn MediaStorage>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub media: SharedMedia,
    pub config: Config,
}

impl FromRef<AppState> for SharedStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for SharedMedia {
    fn from_ref(state: &AppState) -> Self {
        state.media.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
