// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    middleware,
    routing::{get, patch, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    error::AppError,
    handlers::{comment, healthcheck, like, subscription, tweet, user, video},
    state::AppState,
    utils::jwt::auth_middleware,
};

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

/// Assembles the main application router.
///
/// * `/api/v1` carries the JSON API; everything but healthcheck, register and login sits
///   behind the bearer-token middleware.
/// * `/media` serves uploaded files from the upload directory.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.cors_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    let public_routes = Router::new()
        .route("/healthcheck", get(healthcheck::healthcheck))
        .route("/users/register", post(user::register_user))
        .route("/users/login", post(user::login_user));

    let user_routes = Router::new()
        .route("/current-user", get(user::current_user))
        .route("/history", get(user::watch_history));

    // Multipart uploads need more than the default body limit.
    let video_routes = Router::new()
        .route("/", get(video::get_all_videos).post(video::publish_video))
        .route(
            "/{videoId}",
            get(video::get_video_by_id)
                .patch(video::update_video)
                .delete(video::delete_video),
        )
        .route(
            "/toggle/publish/{videoId}",
            patch(video::toggle_publish_status),
        )
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    let comment_routes = Router::new()
        .route(
            "/{videoId}",
            get(comment::get_video_comments).post(comment::add_comment),
        )
        .route(
            "/c/{commentId}",
            patch(comment::update_comment).delete(comment::delete_comment),
        );

    let like_routes = Router::new()
        .route("/toggle/v/{videoId}", post(like::toggle_video_like))
        .route("/toggle/c/{commentId}", post(like::toggle_comment_like))
        .route("/toggle/t/{tweetId}", post(like::toggle_tweet_like))
        .route("/videos", get(like::get_liked_videos));

    let subscription_routes = Router::new()
        .route(
            "/c/{channelId}",
            post(subscription::toggle_subscription)
                .get(subscription::get_user_channel_subscribers),
        )
        .route("/u/{subscriberId}", get(subscription::get_subscribed_channels));

    let tweet_routes = Router::new()
        .route("/", post(tweet::create_tweet))
        .route("/user/{userId}", get(tweet::get_user_tweets))
        .route(
            "/{tweetId}",
            patch(tweet::update_tweet).delete(tweet::delete_tweet),
        );

    let protected_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/videos", video_routes)
        .nest("/comments", comment_routes)
        .nest("/likes", like_routes)
        .nest("/subscriptions", subscription_routes)
        .nest("/tweets", tweet_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .nest("/api/v1", api)
        .nest_service("/media", ServeDir::new(&state.config.upload_dir))
        .fallback(route_not_found)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
