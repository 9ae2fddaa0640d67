use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use super::ensure_exists;
use crate::{
    error::AppError,
    models::{
        id::ObjectId,
        like::{Like, LikeTarget},
    },
    response::ApiResponse,
    state::SharedStore,
    store::collections::LIKES,
    utils::jwt::Claims,
    views,
};

/// Flips the caller's like on `target`. The target must exist.
async fn toggle_like(
    store: SharedStore,
    claims: &Claims,
    target: LikeTarget,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let principal = claims.principal()?;
    ensure_exists(store.as_ref(), target.collection(), &target.id(), target.kind()).await?;

    let presence = store
        .toggle_presence(LIKES, Like::new(target, principal).pair_document())
        .await?;
    let is_liked = presence.is_present();

    tracing::debug!(kind = target.kind(), target = %target.id(), %principal, is_liked, "like toggled");

    let message = if is_liked { "Like added" } else { "Like removed" };
    Ok(ApiResponse::ok(json!({ "isLiked": is_liked }), message))
}

pub async fn toggle_video_like(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let video_id = ObjectId::from_param(&video_id, "video ID")?;
    toggle_like(store, &claims, LikeTarget::Video(video_id)).await
}

pub async fn toggle_comment_like(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let comment_id = ObjectId::from_param(&comment_id, "comment ID")?;
    toggle_like(store, &claims, LikeTarget::Comment(comment_id)).await
}

pub async fn toggle_tweet_like(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tweet_id = ObjectId::from_param(&tweet_id, "tweet ID")?;
    toggle_like(store, &claims, LikeTarget::Tweet(tweet_id)).await
}

/// Videos the caller has liked, most recent like first.
pub async fn get_liked_videos(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let principal = claims.principal()?;

    let liked = store
        .aggregate(LIKES, &views::liked_videos(&principal))
        .await?;

    Ok(ApiResponse::ok(liked, "Liked videos fetched successfully"))
}
