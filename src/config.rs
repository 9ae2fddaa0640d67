// src/config.rs

use std::{env, fmt, path::PathBuf};

use axum::http::HeaderValue;
use dotenvy::dotenv;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Base for public media URLs; always ends with '/'.
    pub public_base_url: Url,
    pub cors_origin: HeaderValue,
    pub max_upload_bytes: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid(key, reason) => write!(f, "{} is invalid: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(key, e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Parses a base URL, forcing a trailing slash so relative joins append.
pub fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{}/", raw))
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expiration = parsed("JWT_EXPIRATION", 86_400u64)?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = parsed("PORT", 8000u16)?;

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));
        let public_base_url = base_url(&public_base_url)
            .map_err(|e| ConfigError::Invalid("PUBLIC_BASE_URL", e.to_string()))?;

        let cors_origin = env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .parse::<HeaderValue>()
            .map_err(|e| ConfigError::Invalid("CORS_ORIGIN", e.to_string()))?;

        let max_upload_mb = parsed("MAX_UPLOAD_MB", 100usize)?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            port,
            upload_dir,
            public_base_url,
            cors_origin,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = base_url("http://localhost:8000/app").unwrap();
        assert_eq!(url.join("media/x.png").unwrap().as_str(), "http://localhost:8000/app/media/x.png");
        assert!(base_url("not a url").is_err());
    }
}
