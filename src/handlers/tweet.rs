use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use super::load_by_id;
use crate::{
    error::AppError,
    models::{
        id::ObjectId,
        tweet::{Tweet, TweetRequest},
    },
    response::ApiResponse,
    state::SharedStore,
    store::{
        collections::TWEETS,
        query::{Filter, Update},
        to_document,
    },
    utils::{html::clean_text, jwt::Claims, ownership::ensure_owner},
};

fn tweet_content(payload: &TweetRequest) -> Result<String, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    clean_text(&payload.content).ok_or_else(|| AppError::BadRequest("Content is required".to_string()))
}

/// Create a tweet owned by the caller.
pub async fn create_tweet(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<TweetRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let content = tweet_content(&payload)?;
    let owner = claims.principal()?;

    let tweet = Tweet {
        id: ObjectId::new(),
        content,
        owner,
        created_at: None,
        updated_at: None,
    };

    let doc = store.insert(TWEETS, to_document(&tweet)?).await.map_err(|e| {
        tracing::error!("Failed to create tweet: {:?}", e);
        AppError::from(e)
    })?;

    Ok(ApiResponse::created(doc, "Tweet created successfully"))
}

/// List every tweet of a user, oldest first.
pub async fn get_user_tweets(
    State(store): State<SharedStore>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = ObjectId::from_param(&user_id, "user ID")?;

    let tweets = store.find(TWEETS, &Filter::eq("owner", user_id)).await?;

    Ok(ApiResponse::ok(tweets, "Tweets fetched successfully"))
}

/// Edit a tweet. Owner only.
pub async fn update_tweet(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(tweet_id): Path<String>,
    payload: Result<Json<TweetRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let tweet_id = ObjectId::from_param(&tweet_id, "tweet ID")?;
    let Json(payload) = payload?;
    let content = tweet_content(&payload)?;
    let principal = claims.principal()?;

    let tweet: Tweet = load_by_id(store.as_ref(), TWEETS, &tweet_id, "Tweet").await?;
    ensure_owner(&tweet.owner, &principal, "update this tweet")?;

    let updated = store
        .find_by_id_and_update(TWEETS, &tweet_id, &Update::new().set("content", content))
        .await?
        .ok_or_else(|| AppError::NotFound("Tweet not found".to_string()))?;

    Ok(ApiResponse::ok(updated, "Tweet updated successfully"))
}

/// Delete a tweet. Owner only.
pub async fn delete_tweet(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tweet_id = ObjectId::from_param(&tweet_id, "tweet ID")?;
    let principal = claims.principal()?;

    let tweet: Tweet = load_by_id(store.as_ref(), TWEETS, &tweet_id, "Tweet").await?;
    ensure_owner(&tweet.owner, &principal, "delete this tweet")?;

    store.find_by_id_and_delete(TWEETS, &tweet_id).await?;

    Ok(ApiResponse::ok(json!({}), "Tweet deleted successfully"))
}
