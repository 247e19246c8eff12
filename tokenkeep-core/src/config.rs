//! Serializable configuration.
//!
//! [`AuthConfig`] is the file-friendly form of an [`OAuthUserAuth`]
//! setup. Exactly one strategy must be selected in [`StrategyConfig`]:
//! a web-flow `code`, `device_flow = true`, or an existing `token`.
//!
//! ```toml
//! client_id = "lv1.1234567890abcdef"
//! client_secret = "secret"
//! client_type = "github-app"
//!
//! [strategy]
//! token = "ghu_existing"
//! refresh_token = "ghr_existing"
//! expires_at = "2026-01-01T08:00:00Z"
//! refresh_token_expires_at = "2026-07-01T00:00:00Z"
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AuthError, Result};
use crate::model::{
    ClientType, DeviceFlowOptions, ExistingCredential, Secret, StrategyOptions, WebFlowOptions,
};
use crate::oauth::device_code::VerificationHandler;
use crate::token::Expiration;
use crate::token_manager::{OAuthUserAuth, OAuthUserAuthBuilder};
use crate::transport::{DEFAULT_BASE_URL, HttpTransport};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: Secret,

    #[serde(default)]
    pub client_type: ClientType,

    /// API base URL, e.g. `https://ghe.example.com/api/v3`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    pub strategy: StrategyConfig,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Strategy fields as they appear in a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    // web flow
    pub code: Option<String>,
    pub state: Option<String>,
    pub redirect_url: Option<String>,

    // device flow
    #[serde(default)]
    pub device_flow: bool,

    // existing token
    pub token: Option<Secret>,
    pub refresh_token: Option<Secret>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,

    /// Scopes of an existing OAuth app token, or scopes to request in the device flow.
    pub scopes: Option<Vec<String>>,
}

impl StrategyConfig {
    /// Convert into [`StrategyOptions`].
    ///
    /// `on_verification` is required when `device_flow` is set.
    pub fn into_options(
        self,
        on_verification: Option<Arc<dyn VerificationHandler>>,
    ) -> Result<StrategyOptions> {
        let selected = [self.code.is_some(), self.device_flow, self.token.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if selected != 1 {
            return Err(AuthError::invalid_strategy(
                "exactly one of `code`, `device_flow` or `token` must be set",
            ));
        }

        if let Some(code) = self.code {
            let mut options = WebFlowOptions::new(code);
            options.state = self.state;
            options.redirect_url = self.redirect_url;
            return Ok(options.into());
        }

        if self.device_flow {
            let handler = on_verification.ok_or_else(|| {
                AuthError::invalid_strategy("device flow requires a verification handler")
            })?;
            return Ok(DeviceFlowOptions::new(handler)
                .with_scopes(self.scopes.unwrap_or_default())
                .into());
        }

        let token = self
            .token
            .ok_or_else(|| AuthError::invalid_strategy("token is missing"))?;
        let expiration = match (self.refresh_token, self.expires_at, self.refresh_token_expires_at) {
            (Some(refresh_token), Some(expires_at), Some(refresh_token_expires_at)) => {
                Some(Expiration {
                    refresh_token,
                    expires_at,
                    refresh_token_expires_at,
                })
            }
            (None, None, None) => None,
            _ => {
                return Err(AuthError::invalid_strategy(
                    "`refresh_token`, `expires_at` and `refresh_token_expires_at` must be set together",
                ));
            }
        };

        Ok(StrategyOptions::Existing(ExistingCredential {
            token,
            scopes: self.scopes,
            expiration,
        }))
    }
}

impl AuthConfig {
    /// Builder preloaded with this configuration and an [`HttpTransport`]
    /// against `base_url`.
    pub fn into_builder(
        self,
        on_verification: Option<Arc<dyn VerificationHandler>>,
    ) -> Result<OAuthUserAuthBuilder> {
        let strategy = self.strategy.into_options(on_verification)?;

        Ok(OAuthUserAuth::builder(self.client_id, self.client_secret)
            .client_type(self.client_type)
            .strategy(strategy)
            .transport(Arc::new(HttpTransport::with_base_url(self.base_url))))
    }
}
