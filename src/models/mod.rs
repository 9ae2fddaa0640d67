// src/models/mod.rs

pub mod comment;
pub mod id;
pub mod like;
pub mod subscription;
pub mod tweet;
pub mod user;
pub mod video;
