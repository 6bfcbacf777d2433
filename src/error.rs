//! Error types for the credential store and the Tasks API client.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(
        "{} not found. Download the OAuth client secret from Google Cloud Console and save it there",
        .0.display()
    )]
    MissingClientSecret(PathBuf),

    #[error("{} is not a valid OAuth client secret: {reason}", .path.display())]
    InvalidClientSecret { path: PathBuf, reason: String },

    #[error("authorization was denied in the browser: {0}")]
    Denied(String),

    #[error("consent redirect carried an unexpected state parameter")]
    StateMismatch,

    #[error("timed out after {0}s waiting for the browser consent redirect")]
    ConsentTimeout(u64),

    #[error("authorization code exchange failed: {0}")]
    Exchange(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("invalid OAuth endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tasks API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == reqwest::StatusCode::UNAUTHORIZED)
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;
pub type ApiResult<T> = std::result::Result<T, ApiError>;
