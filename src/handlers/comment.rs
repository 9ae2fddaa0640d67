use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use super::{ensure_exists, load_by_id};
use crate::{
    error::AppError,
    models::{
        comment::{Comment, CommentRequest},
        id::ObjectId,
    },
    pagination::{PageQuery, paginate},
    response::ApiResponse,
    state::SharedStore,
    store::{
        collections::{COMMENTS, VIDEOS},
        query::Update,
        to_document,
    },
    utils::{html::clean_text, jwt::Claims, ownership::ensure_owner},
    views,
};

fn comment_content(payload: &CommentRequest) -> Result<String, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    clean_text(&payload.content)
        .ok_or_else(|| AppError::BadRequest("Comment content is required".to_string()))
}

/// Paginated comments of a video, newest first, each with its author's summary.
pub async fn get_video_comments(
    State(store): State<SharedStore>,
    Path(video_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = ObjectId::from_param(&video_id, "video ID")?;
    ensure_exists(store.as_ref(), VIDEOS, &video_id, "Video").await?;

    let page = paginate(
        store.as_ref(),
        COMMENTS,
        views::video_comments(&video_id),
        query.params(),
    )
    .await?;

    Ok(ApiResponse::ok(page, "Comments fetched successfully"))
}

pub async fn add_comment(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = ObjectId::from_param(&video_id, "video ID")?;
    let Json(payload) = payload?;
    let content = comment_content(&payload)?;
    let owner = claims.principal()?;

    ensure_exists(store.as_ref(), VIDEOS, &video_id, "Video").await?;

    let comment = Comment {
        id: ObjectId::new(),
        content,
        video: video_id,
        owner,
        created_at: None,
        updated_at: None,
    };

    let doc = store.insert(COMMENTS, to_document(&comment)?).await.map_err(|e| {
        tracing::error!("Failed to add comment: {:?}", e);
        AppError::from(e)
    })?;

    Ok(ApiResponse::created(doc, "Comment added successfully"))
}

/// Edit a comment. Owner only.
pub async fn update_comment(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let comment_id = ObjectId::from_param(&comment_id, "comment ID")?;
    let Json(payload) = payload?;
    let content = comment_content(&payload)?;
    let principal = claims.principal()?;

    let comment: Comment = load_by_id(store.as_ref(), COMMENTS, &comment_id, "Comment").await?;
    ensure_owner(&comment.owner, &principal, "update this comment")?;

    let updated = store
        .find_by_id_and_update(COMMENTS, &comment_id, &Update::new().set("content", content))
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    Ok(ApiResponse::ok(updated, "Comment updated successfully"))
}

/// Delete a comment. Owner only.
pub async fn delete_comment(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let comment_id = ObjectId::from_param(&comment_id, "comment ID")?;
    let principal = claims.principal()?;

    let comment: Comment = load_by_id(store.as_ref(), COMMENTS, &comment_id, "Comment").await?;
    ensure_owner(&comment.owner, &principal, "delete this comment")?;

    store.find_by_id_and_delete(COMMENTS, &comment_id).await?;

    Ok(ApiResponse::ok(json!({}), "Comment deleted successfully"))
}
