//! Domain model types for tokenkeep.
//!
//! This module defines the configuration-side types:
//! - [`ClientType`] - Which kind of registration issued the credentials
//! - [`Secret`] - A redacted, zeroized string for tokens and client secrets
//! - [`ClientCredentials`] - The immutable client identity of an instance
//! - [`StrategyOptions`] - How the user token is obtained

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AuthError, Result};
use crate::oauth::device_code::VerificationHandler;
use crate::token::Expiration;

/// The provider-side registration kind of a client.
///
/// OAuth app tokens carry scopes and never expire. GitHub app tokens carry
/// no scopes and may be issued with an expiration and a refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ClientType {
    #[default]
    #[serde(rename = "oauth-app")]
    OAuthApp,
    #[serde(rename = "github-app")]
    GitHubApp,
}

impl ClientType {
    /// Get the wire name of the client type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OAuthApp => "oauth-app",
            Self::GitHubApp => "github-app",
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the memory is wiped when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret holds an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The client identity of a configured instance.
///
/// Fixed at construction; no operation ever changes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientCredentials {
    pub client_type: ClientType,
    pub client_id: String,
    pub client_secret: Secret,
}

impl ClientCredentials {
    pub fn new(
        client_type: ClientType,
        client_id: impl Into<String>,
        client_secret: impl Into<Secret>,
    ) -> Self {
        Self {
            client_type,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Exchange an authorization code from the OAuth web flow.
#[derive(Debug, Clone, PartialEq)]
pub struct WebFlowOptions {
    pub code: String,
    pub state: Option<String>,
    pub redirect_url: Option<String>,
}

impl WebFlowOptions {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            state: None,
            redirect_url: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }
}

/// Obtain the token through the OAuth device flow.
#[derive(Clone)]
pub struct DeviceFlowOptions {
    /// Receives the user code and verification URI to show to the user.
    pub on_verification: Arc<dyn VerificationHandler>,

    /// Scopes to request. Only OAuth apps accept scopes.
    pub scopes: Vec<String>,
}

impl DeviceFlowOptions {
    pub fn new(on_verification: Arc<dyn VerificationHandler>) -> Self {
        Self {
            on_verification,
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

impl fmt::Debug for DeviceFlowOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceFlowOptions")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// A token the caller already holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingCredential {
    pub token: Secret,

    /// Granted scopes. OAuth apps only; defaults to none.
    pub scopes: Option<Vec<String>>,

    /// Expiration and refresh token. GitHub apps only.
    pub expiration: Option<Expiration>,
}

impl ExistingCredential {
    pub fn new(token: impl Into<Secret>) -> Self {
        Self {
            token: token.into(),
            scopes: None,
            expiration: None,
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = Some(scopes);
        self
    }

    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

/// How the user access token is obtained. Exactly one per instance.
#[derive(Debug, Clone)]
pub enum StrategyOptions {
    WebFlow(WebFlowOptions),
    DeviceFlow(DeviceFlowOptions),
    Existing(ExistingCredential),
}

impl StrategyOptions {
    /// Check that the options are legal for the given client type.
    pub fn validate(&self, client_type: ClientType) -> Result<()> {
        match self {
            Self::WebFlow(options) if options.code.is_empty() => {
                Err(AuthError::invalid_strategy("authorization code is empty"))
            }
            Self::WebFlow(_) => Ok(()),
            Self::DeviceFlow(options)
                if client_type == ClientType::GitHubApp && !options.scopes.is_empty() =>
            {
                Err(AuthError::invalid_strategy(
                    "scopes are not supported for github-app clients",
                ))
            }
            Self::DeviceFlow(_) => Ok(()),
            Self::Existing(credential) => {
                if credential.token.is_empty() {
                    return Err(AuthError::invalid_strategy("token is empty"));
                }
                match client_type {
                    ClientType::GitHubApp if credential.scopes.is_some() => Err(
                        AuthError::invalid_strategy("scopes are not supported for github-app clients"),
                    ),
                    ClientType::OAuthApp if credential.expiration.is_some() => Err(
                        AuthError::invalid_strategy("oauth-app tokens cannot expire"),
                    ),
                    _ => Ok(()),
                }
            }
        }
    }
}

impl From<WebFlowOptions> for StrategyOptions {
    fn from(options: WebFlowOptions) -> Self {
        Self::WebFlow(options)
    }
}

impl From<DeviceFlowOptions> for StrategyOptions {
    fn from(options: DeviceFlowOptions) -> Self {
        Self::DeviceFlow(options)
    }
}

impl From<ExistingCredential> for StrategyOptions {
    fn from(credential: ExistingCredential) -> Self {
        Self::Existing(credential)
    }
}
