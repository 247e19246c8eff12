//! User access tokens and their lifecycle operations.
//!
//! This module provides:
//! - [`Authentication`] - The materialized user credential
//! - [`Credential`] - Client-type specific token data
//! - [`AuthOperation`] - The operations the lifecycle supports
//! - [`UserAuthenticator`] - Trait for token lifecycle and request authorization

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::Result;
use crate::model::{ClientType, Secret};
use crate::transport::ApiRequest;

/// Render a timestamp the way the provider does: ISO-8601 with milliseconds.
pub fn to_iso8601(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Expiration data of an expiring GitHub app user token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiration {
    pub refresh_token: Secret,
    pub expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Client-type specific part of an [`Authentication`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// OAuth app token with its granted scopes.
    OAuthApp { scopes: Vec<String> },

    /// Non-expiring GitHub app user token.
    GitHubApp,

    /// Expiring GitHub app user token.
    GitHubAppWithExpiration(Expiration),
}

/// A materialized user access token.
///
/// Serializes to
/// `{type, tokenType, clientType, clientId, token, scopes?, refreshToken?, expiresAt?, refreshTokenExpiresAt?, invalid?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    pub client_id: String,
    pub token: Secret,
    pub credential: Credential,

    /// Set once the provider rejected or revoked the token. Never cleared.
    pub invalid: bool,
}

impl Authentication {
    pub fn new(client_id: impl Into<String>, token: impl Into<Secret>, credential: Credential) -> Self {
        Self {
            client_id: client_id.into(),
            token: token.into(),
            credential,
            invalid: false,
        }
    }

    pub fn client_type(&self) -> ClientType {
        match self.credential {
            Credential::OAuthApp { .. } => ClientType::OAuthApp,
            Credential::GitHubApp | Credential::GitHubAppWithExpiration(_) => ClientType::GitHubApp,
        }
    }

    pub fn scopes(&self) -> Option<&[String]> {
        match &self.credential {
            Credential::OAuthApp { scopes } => Some(scopes),
            _ => None,
        }
    }

    pub fn expiration(&self) -> Option<&Expiration> {
        match &self.credential {
            Credential::GitHubAppWithExpiration(expiration) => Some(expiration),
            _ => None,
        }
    }

    /// Whether the access token expired before `now`.
    ///
    /// Non-expiring tokens never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration()
            .map(|expiration| expiration.expires_at < now)
            .unwrap_or(false)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationView<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    token_type: &'static str,
    client_type: ClientType,
    client_id: &'a str,
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scopes: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token_expires_at: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    invalid: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Serialize for Authentication {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let expiration = self.expiration();
        AuthenticationView {
            kind: "token",
            token_type: "oauth",
            client_type: self.client_type(),
            client_id: &self.client_id,
            token: self.token.expose(),
            scopes: self.scopes(),
            refresh_token: expiration.map(|e| e.refresh_token.expose()),
            expires_at: expiration.map(|e| to_iso8601(&e.expires_at)),
            refresh_token_expires_at: expiration.map(|e| to_iso8601(&e.refresh_token_expires_at)),
            invalid: self.invalid,
        }
        .serialize(serializer)
    }
}

/// An operation on the token lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthOperation {
    /// Return the cached token, materializing or refreshing it as needed.
    #[default]
    Get,
    /// Validate the token against the provider.
    Check,
    /// Rotate the token.
    Reset,
    /// Exchange the refresh token for a new token.
    Refresh,
    /// Revoke the token.
    Delete,
    /// Revoke the whole authorization grant.
    DeleteAuthorization,
}

impl AuthOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Check => "check",
            Self::Reset => "reset",
            Self::Refresh => "refresh",
            Self::Delete => "delete",
            Self::DeleteAuthorization => "deleteAuthorization",
        }
    }
}

impl fmt::Display for AuthOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a new token was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenCreatedEvent {
    Refresh,
    Reset,
}

impl fmt::Display for TokenCreatedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refresh => write!(f, "refresh"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// Notified after an explicit refresh or reset issued a new token.
///
/// Awaited before the operation returns to its caller.
#[async_trait]
pub trait TokenCreatedHandler: Send + Sync {
    async fn on_token_created(&self, authentication: &Authentication, event: TokenCreatedEvent);
}

#[async_trait]
impl<F> TokenCreatedHandler for F
where
    F: Fn(&Authentication, TokenCreatedEvent) + Send + Sync,
{
    async fn on_token_created(&self, authentication: &Authentication, event: TokenCreatedEvent) {
        self(authentication, event)
    }
}

/// Trait for managing a user token and authorizing requests with it.
///
/// # Example
///
/// ```rust,ignore
/// use tokenkeep_core::{AuthOperation, UserAuthenticator};
///
/// async fn current_token(auth: &impl UserAuthenticator) -> tokenkeep_core::Result<String> {
///     let authentication = auth.authenticate(AuthOperation::Get).await?;
///     Ok(authentication.token.expose().to_string())
/// }
/// ```
#[async_trait]
pub trait UserAuthenticator: Send + Sync {
    /// Run one lifecycle operation and return the resulting authentication.
    ///
    /// Materializes the token on first use and refreshes an expired token
    /// before dispatching the operation.
    async fn authenticate(&self, operation: AuthOperation) -> Result<Authentication>;

    /// Attach the right `authorization` header to an outgoing request.
    async fn authorize_request(&self, request: ApiRequest) -> Result<ApiRequest>;
}
