// src/handlers/video.rs

use axum::{
    Extension,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use super::load_by_id;
use crate::{
    error::AppError,
    media::{MediaAsset, MediaUpload},
    models::{
        id::ObjectId,
        video::{MediaRef, Video, VideoDetails, VideoListQuery},
    },
    pagination::{PageParams, paginate},
    response::ApiResponse,
    state::{SharedMedia, SharedStore},
    store::{
        collections::{USERS, VIDEOS},
        pipeline::SortOrder,
        query::Update,
        to_document,
    },
    utils::{html::clean_text, jwt::Claims, ownership::ensure_owner},
    views::{self, VideoListFilter},
};

/// Fields of the publish/update multipart form.
#[derive(Debug, Default)]
struct VideoForm {
    title: Option<String>,
    description: Option<String>,
    video_file: Option<MediaUpload>,
    thumbnail: Option<MediaUpload>,
}

impl VideoForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = VideoForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => form.title = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "videoFile" | "thumbnail" => {
                    let upload = MediaUpload {
                        file_name: field.file_name().map(str::to_string),
                        content_type: field.content_type().map(str::to_string),
                        bytes: field.bytes().await?,
                    };
                    if name == "videoFile" {
                        form.video_file = Some(upload);
                    } else {
                        form.thumbnail = Some(upload);
                    }
                }
                other => tracing::debug!(field = other, "ignoring unknown multipart field"),
            }
        }

        Ok(form)
    }

    /// Sanitized title and description; both required.
    fn details(&self) -> Result<VideoDetails, AppError> {
        let details = VideoDetails {
            title: self.title.as_deref().and_then(clean_text).unwrap_or_default(),
            description: self
                .description
                .as_deref()
                .and_then(clean_text)
                .unwrap_or_default(),
        };
        details
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(details)
    }
}

fn required(upload: Option<MediaUpload>, field: &str) -> Result<MediaUpload, AppError> {
    upload
        .filter(|u| !u.bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{} is required", field)))
}

/// Best-effort removal of a replaced or orphaned media file.
async fn discard_media(media: &SharedMedia, public_id: &str) {
    if let Err(e) = media.remove(public_id).await {
        tracing::warn!(public_id, "failed to remove media: {}", e);
    }
}

/// Bumps the view count and records the video in the viewer's history.
fn record_view(store: SharedStore, video: ObjectId, viewer: ObjectId) {
    tokio::spawn(async move {
        if let Err(e) = store
            .find_by_id_and_update(VIDEOS, &video, &Update::new().inc("views", 1))
            .await
        {
            tracing::warn!(%video, "failed to increment views: {}", e);
        }
        if let Err(e) = store
            .find_by_id_and_update(USERS, &viewer, &Update::new().add_to_set("watchHistory", video))
            .await
        {
            tracing::warn!(%video, %viewer, "failed to update watch history: {}", e);
        }
    });
}

/// Published videos, optionally searched, filtered by owner and sorted.
///
/// Query: page, limit, query, sortBy, sortType ('asc' | 'desc'), userId.
pub async fn get_all_videos(
    State(store): State<SharedStore>,
    Query(query): Query<VideoListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let owner = query
        .user_id
        .as_deref()
        .filter(|raw| !raw.is_empty())
        .map(|raw| ObjectId::from_param(raw, "userId"))
        .transpose()?;

    let filter = VideoListFilter {
        query: query.query.clone(),
        owner,
        sort_by: query.sort_by.clone(),
        sort_order: query.sort_type.as_deref().map(SortOrder::from_param),
    };
    let params = PageParams::new(query.page.as_deref(), query.limit.as_deref());

    let page = paginate(store.as_ref(), VIDEOS, views::video_listing(&filter), params).await?;

    Ok(ApiResponse::ok(page, "Videos fetched successfully"))
}

/// Uploads both media parts and stores a published video owned by the caller.
pub async fn publish_video(
    State(store): State<SharedStore>,
    State(media): State<SharedMedia>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let owner = claims.principal()?;
    let form = VideoForm::read(multipart).await?;
    let details = form.details()?;
    let video_upload = required(form.video_file, "videoFile")?;
    let thumbnail_upload = required(form.thumbnail, "thumbnail")?;

    let video_asset: MediaAsset = media.upload(video_upload).await?;
    let thumbnail_asset = match media.upload(thumbnail_upload).await {
        Ok(asset) => asset,
        Err(e) => {
            discard_media(&media, &video_asset.public_id).await;
            return Err(e.into());
        }
    };

    let video = Video {
        id: ObjectId::new(),
        video_file: MediaRef::from(&video_asset),
        thumbnail: MediaRef::from(&thumbnail_asset),
        title: details.title,
        description: details.description,
        duration: video_asset.duration.unwrap_or(0.0),
        views: 0,
        is_published: true,
        owner,
        created_at: None,
        updated_at: None,
    };

    let doc = store.insert(VIDEOS, to_document(&video)?).await.map_err(|e| {
        tracing::error!("Failed to publish video: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!(video_id = %video.id, %owner, "video published");

    Ok(ApiResponse::created(doc, "Video published successfully"))
}

/// Video with owner, like and subscription aggregates as seen by the caller.
pub async fn get_video_by_id(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = ObjectId::from_param(&video_id, "video ID")?;
    let principal = claims.principal()?;

    let video = store
        .aggregate(VIDEOS, &views::video_detail(&video_id, &principal))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    record_view(store.clone(), video_id, principal);

    Ok(ApiResponse::ok(video, "Video details fetched successfully"))
}

/// Replaces title, description and thumbnail. Owner only.
pub async fn update_video(
    State(store): State<SharedStore>,
    State(media): State<SharedMedia>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let video_id = ObjectId::from_param(&video_id, "video ID")?;
    let principal = claims.principal()?;
    let form = VideoForm::read(multipart).await?;
    let details = form.details()?;

    let video: Video = load_by_id(store.as_ref(), VIDEOS, &video_id, "Video").await?;
    ensure_owner(&video.owner, &principal, "update this video")?;

    let thumbnail_upload = required(form.thumbnail, "thumbnail")?;
    let thumbnail = media.upload(thumbnail_upload).await?;

    let update = Update::new()
        .set("title", details.title)
        .set("description", details.description)
        .set("thumbnail", serde_json::to_value(MediaRef::from(&thumbnail))?);

    let updated = match store.find_by_id_and_update(VIDEOS, &video_id, &update).await {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            discard_media(&media, &thumbnail.public_id).await;
            return Err(AppError::NotFound("Video not found".to_string()));
        }
        Err(e) => {
            discard_media(&media, &thumbnail.public_id).await;
            return Err(e.into());
        }
    };

    discard_media(&media, &video.thumbnail.public_id).await;

    Ok(ApiResponse::ok(updated, "Video updated successfully"))
}

/// Deletes a video and its media files. Owner only.
pub async fn delete_video(
    State(store): State<SharedStore>,
    State(media): State<SharedMedia>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = ObjectId::from_param(&video_id, "video ID")?;
    let principal = claims.principal()?;

    let video: Video = load_by_id(store.as_ref(), VIDEOS, &video_id, "Video").await?;
    ensure_owner(&video.owner, &principal, "delete this video")?;

    // A concurrent delete already removed the media.
    store
        .find_by_id_and_delete(VIDEOS, &video_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    discard_media(&media, &video.video_file.public_id).await;
    discard_media(&media, &video.thumbnail.public_id).await;

    Ok(ApiResponse::ok(json!({}), "Video deleted successfully"))
}

/// Flips `isPublished`. Owner only.
pub async fn toggle_publish_status(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = ObjectId::from_param(&video_id, "video ID")?;
    let principal = claims.principal()?;

    let video: Video = load_by_id(store.as_ref(), VIDEOS, &video_id, "Video").await?;
    ensure_owner(&video.owner, &principal, "change this video's publish status")?;

    let is_published = !video.is_published;
    store
        .find_by_id_and_update(VIDEOS, &video_id, &Update::new().set("isPublished", is_published))
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))?;

    Ok(ApiResponse::ok(
        json!({ "isPublished": is_published }),
        "Video publish toggled successfully",
    ))
}
