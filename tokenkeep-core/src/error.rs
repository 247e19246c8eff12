//! Error types for token lifecycle operations.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::transport::Headers;

/// A failed remote call, carried verbatim from the provider.
///
/// Status, response headers and the decoded JSON body are kept intact so
/// callers can inspect exactly what the provider answered.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (HTTP {status})")]
pub struct RequestError {
    /// HTTP status of the response.
    pub status: u16,

    /// Human readable message, taken from the body when the provider sent one.
    pub message: String,

    /// Response headers (lowercase names).
    pub headers: Headers,

    /// Response body, `Value::Null` when empty.
    pub body: Value,
}

impl RequestError {
    /// Build an error from a non-success response.
    pub fn from_response(status: u16, headers: Headers, body: Value) -> Self {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "request failed".to_string());

        Self {
            status,
            message,
            headers,
            body,
        }
    }
}

/// Error type for every authentication operation.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The configured strategy does not match any supported shape.
    #[error("invalid strategy options: {message}")]
    InvalidStrategyOptions { message: String },

    /// The cached token was rejected by the provider or already revoked.
    #[error("token is invalid")]
    TokenInvalid,

    /// Refresh was requested for a client type whose tokens never expire.
    #[error("OAuth apps do not support expiring tokens")]
    RefreshUnsupported,

    /// Refresh was requested but no refresh token is on file.
    #[error("refresh token missing")]
    RefreshTokenMissing,

    /// The provider answered with an error.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The request never produced an HTTP response.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Device authorization was denied, expired or failed.
    #[error("device flow failed: {message}")]
    DeviceFlow { message: String },

    /// A successful response was missing required fields.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl AuthError {
    pub(crate) fn invalid_strategy(message: impl Into<String>) -> Self {
        Self::InvalidStrategyOptions {
            message: message.into(),
        }
    }

    /// HTTP status of the underlying remote failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request(error) => Some(error.status),
            _ => None,
        }
    }

    /// Whether the provider answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
