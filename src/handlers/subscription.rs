use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use super::ensure_exists;
use crate::{
    error::AppError,
    models::{id::ObjectId, subscription::Subscription},
    response::ApiResponse,
    state::SharedStore,
    store::collections::{SUBSCRIPTIONS, USERS},
    utils::jwt::Claims,
    views,
};

/// Subscribe to or unsubscribe from a channel.
pub async fn toggle_subscription(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let channel = ObjectId::from_param(&channel_id, "channel ID")?;
    let subscriber = claims.principal()?;

    ensure_exists(store.as_ref(), USERS, &channel, "Channel").await?;

    let presence = store
        .toggle_presence(
            SUBSCRIPTIONS,
            Subscription { subscriber, channel }.pair_document(),
        )
        .await?;
    let subscribed = presence.is_present();

    tracing::debug!(%channel, %subscriber, subscribed, "subscription toggled");

    let message = if subscribed {
        "Subscribed successfully"
    } else {
        "Unsubscribed successfully"
    };
    Ok(ApiResponse::ok(json!({ "subscribed": subscribed }), message))
}

/// Subscribers of a channel with their user summaries.
pub async fn get_user_channel_subscribers(
    State(store): State<SharedStore>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let channel = ObjectId::from_param(&channel_id, "channel ID")?;

    let subscribers = store
        .aggregate(SUBSCRIPTIONS, &views::channel_subscribers(&channel))
        .await?;

    Ok(ApiResponse::ok(subscribers, "Subscribers fetched successfully"))
}

/// Channels a user is subscribed to.
pub async fn get_subscribed_channels(
    State(store): State<SharedStore>,
    Path(subscriber_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let subscriber = ObjectId::from_param(&subscriber_id, "subscriber ID")?;

    let channels = store
        .aggregate(SUBSCRIPTIONS, &views::subscribed_channels(&subscriber))
        .await?;

    Ok(ApiResponse::ok(channels, "Subscribed channels fetched successfully"))
}
