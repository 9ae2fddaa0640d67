// src/models/user.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::id::ObjectId;

/// Avatar assigned at registration until the user uploads one.
pub const DEFAULT_AVATAR: &str = "https://via.placeholder.com/150";

/// Public view of a document in the 'users' collection.
/// The password hash is never part of this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    /// Unique, stored lowercase.
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    #[serde(default)]
    pub cover_image: String,

    /// Videos opened by this user, without duplicates.
    #[serde(default)]
    pub watch_history: Vec<ObjectId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Shape written on registration, including the Argon2 hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub password: String,
    pub watch_history: Vec<ObjectId>,
}

/// The fields login needs from a stored user.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    pub password: String,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,

    #[validate(email(message = "Email must be a valid address."))]
    pub email: String,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Full name length must be between 1 and 100 characters."
    ))]
    pub full_name: String,

    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login. Either username or email identifies the account.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 254))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
