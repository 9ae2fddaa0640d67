// src/models/tweet.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::id::ObjectId;

/// Represents a document of the 'tweets' collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub content: String,
    pub owner: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// DTO for creating or editing a tweet.
#[derive(Debug, Deserialize, Validate)]
pub struct TweetRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Content must be between 1 and 1000 characters"
    ))]
    #[serde(default)]
    pub content: String,
}
