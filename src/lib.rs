// src/lib.rs

pub mod config;
pub mod error;
pub mod handlers;
pub mod media;
pub mod models;
pub mod pagination;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
pub mod views;

pub use routes::create_router;
