// src/models/video.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{media::MediaAsset, models::id::ObjectId};

/// Stored reference to an uploaded media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub url: String,
    pub public_id: String,
}

impl From<&MediaAsset> for MediaRef {
    fn from(asset: &MediaAsset) -> Self {
        Self {
            url: asset.url.clone(),
            public_id: asset.public_id.clone(),
        }
    }
}

/// Represents a document of the 'videos' collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub video_file: MediaRef,
    pub thumbnail: MediaRef,
    pub title: String,
    pub description: String,

    /// Seconds; zero when the storage backend cannot measure it.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub is_published: bool,
    pub owner: ObjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Text fields submitted alongside the media parts when publishing or updating.
#[derive(Debug, Default, Validate)]
pub struct VideoDetails {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 5000,
        message = "Description length must be between 1 and 5000 chars"
    ))]
    pub description: String,
}

/// Query parameters for listing videos.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,

    /// Free-text search over title and description.
    pub query: Option<String>,

    /// Sort field; only applied together with `sortType`.
    pub sort_by: Option<String>,

    /// 'asc' or 'desc'.
    pub sort_type: Option<String>,

    /// Restrict to videos owned by this user.
    pub user_id: Option<String>,
}
