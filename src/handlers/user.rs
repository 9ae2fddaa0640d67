// src/handlers/user.rs

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde_json::{Value, json};
use validator::Validate;

use super::load_by_id;
use crate::{
    config::Config,
    error::AppError,
    models::{
        id::ObjectId,
        user::{Credentials, DEFAULT_AVATAR, LoginRequest, NewUser, RegisterRequest, User},
    },
    response::ApiResponse,
    state::SharedStore,
    store::{collections::USERS, from_document, query::Filter, to_document},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
    views,
};

/// Handler for user registration.
///
/// 1. Validates input.
/// 2. Rejects a taken username or email with 409.
/// 3. Hashes the password and stores the user with the default avatar.
pub async fn register_user(
    State(store): State<SharedStore>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let username = payload.username.trim().to_lowercase();
    let email = payload.email.trim().to_lowercase();
    let full_name = payload.full_name.trim().to_string();
    if username.is_empty() || full_name.is_empty() {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    }

    let taken = Filter::Or(vec![
        Filter::eq("username", username.as_str()),
        Filter::eq("email", email.as_str()),
    ]);
    if store.find_one(USERS, &taken).await?.is_some() {
        return Err(AppError::Conflict(
            "User with email or username already exists".to_string(),
        ));
    }

    let new_user = NewUser {
        id: ObjectId::new(),
        username,
        email,
        full_name,
        avatar: DEFAULT_AVATAR.to_string(),
        cover_image: String::new(),
        password: hash_password(&payload.password)?,
        watch_history: Vec::new(),
    };

    // Racing registrations are caught by the unique index as a duplicate (409).
    let doc = store.insert(USERS, to_document(&new_user)?).await?;
    let user: User = from_document(doc)?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");

    Ok(ApiResponse::created(user, "User registered successfully"))
}

/// Handler for user login.
///
/// Accepts either username or email. Unknown users and wrong passwords are both 401.
pub async fn login_user(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let filter = match (payload.username.as_deref(), payload.email.as_deref()) {
        (Some(username), _) if !username.trim().is_empty() => {
            Filter::eq("username", username.trim().to_lowercase())
        }
        (_, Some(email)) if !email.trim().is_empty() => {
            Filter::eq("email", email.trim().to_lowercase())
        }
        _ => {
            return Err(AppError::BadRequest(
                "Username or email is required".to_string(),
            ));
        }
    };

    let doc = store
        .find_one(USERS, &filter)
        .await?
        .ok_or_else(|| AppError::AuthError("User does not exist".to_string()))?;

    let credentials: Credentials = from_document(doc.clone())?;
    if !verify_password(&payload.password, &credentials.password)? {
        return Err(AppError::AuthError("Invalid user credentials".to_string()));
    }

    let access_token = sign_jwt(
        &credentials.id,
        &credentials.username,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;
    let user: User = from_document(doc)?;

    Ok(ApiResponse::ok(
        json!({ "user": user, "accessToken": access_token }),
        "User logged in successfully",
    ))
}

pub async fn current_user(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let principal = claims.principal()?;
    let user: User = load_by_id(store.as_ref(), USERS, &principal, "User").await?;

    Ok(ApiResponse::ok(user, "Current user fetched successfully"))
}

/// Videos the caller has opened, each with its owner's summary.
pub async fn watch_history(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let principal = claims.principal()?;

    let rows = store
        .aggregate(USERS, &views::watch_history(&principal))
        .await?;
    let history = rows
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?
        .remove("watchHistory")
        .unwrap_or_else(|| Value::Array(Vec::new()));

    Ok(ApiResponse::ok(history, "Watch history fetched successfully"))
}
