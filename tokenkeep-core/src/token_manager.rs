//! User token lifecycle.
//!
//! This module provides [`OAuthUserAuth`], the [`UserAuthenticator`]
//! implementation that owns one client's cached user token.
//!
//! # Lifecycle
//!
//! The cached token is in one of three states:
//! - uninitialized: nothing cached; the first operation materializes it
//!   from the configured [`StrategyOptions`]
//! - valid: refresh and reset replace the cached record wholesale
//! - invalid: after a check/reset 404 or any delete. Terminal; only
//!   delete operations are still accepted and return the invalid record.
//!
//! An expired token is refreshed before any operation is dispatched,
//! including plain [`AuthOperation::Get`].
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use tokenkeep_core::{AuthOperation, OAuthUserAuth, UserAuthenticator, WebFlowOptions};
//!
//! let auth = OAuthUserAuth::builder("1234567890abcdef1234", "secret")
//!     .strategy(WebFlowOptions::new("code123"))
//!     .build()?;
//!
//! let authentication = auth.authenticate(AuthOperation::Get).await?;
//! println!("token for {}", authentication.client_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{AuthError, Result};
use crate::hook;
use crate::materialize::materialize;
use crate::model::{ClientCredentials, ClientType, Secret, StrategyOptions};
use crate::oauth::{self, TokenDetails};
use crate::token::{
    AuthOperation, Authentication, Credential, Expiration, TokenCreatedEvent, TokenCreatedHandler,
    UserAuthenticator,
};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

struct State {
    client: ClientCredentials,
    strategy: StrategyOptions,
    transport: Arc<dyn Transport>,
    on_token_created: Option<Arc<dyn TokenCreatedHandler>>,

    /// Held across remote calls so concurrent operations never issue
    /// duplicate materialize or refresh requests.
    authentication: Mutex<Option<Authentication>>,
}

/// User-to-server OAuth authentication for one client.
///
/// Cheap to clone; clones share the cached token.
#[derive(Clone)]
pub struct OAuthUserAuth {
    state: Arc<State>,
}

impl std::fmt::Debug for OAuthUserAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthUserAuth")
            .field("client_id", &self.state.client.client_id)
            .field("client_type", &self.state.client.client_type)
            .field("strategy", &self.state.strategy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`OAuthUserAuth`].
pub struct OAuthUserAuthBuilder {
    client_id: String,
    client_secret: Secret,
    client_type: ClientType,
    strategy: Option<StrategyOptions>,
    transport: Option<Arc<dyn Transport>>,
    on_token_created: Option<Arc<dyn TokenCreatedHandler>>,
}

impl OAuthUserAuthBuilder {
    /// Registration kind of the client. Defaults to [`ClientType::OAuthApp`].
    pub fn client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    /// How the user token is obtained. Required.
    pub fn strategy(mut self, strategy: impl Into<StrategyOptions>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Transport for every remote call. Defaults to [`HttpTransport::new`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Called after an explicit refresh or reset issued a new token.
    pub fn on_token_created(mut self, handler: Arc<dyn TokenCreatedHandler>) -> Self {
        self.on_token_created = Some(handler);
        self
    }

    /// Validate the configuration and build the instance.
    ///
    /// No remote call is made; the token is materialized on first use.
    pub fn build(self) -> Result<OAuthUserAuth> {
        let strategy = self
            .strategy
            .ok_or_else(|| AuthError::invalid_strategy("no strategy configured"))?;
        strategy.validate(self.client_type)?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));

        Ok(OAuthUserAuth {
            state: Arc::new(State {
                client: ClientCredentials {
                    client_type: self.client_type,
                    client_id: self.client_id,
                    client_secret: self.client_secret,
                },
                strategy,
                transport,
                on_token_created: self.on_token_created,
                authentication: Mutex::new(None),
            }),
        })
    }
}

impl OAuthUserAuth {
    pub fn builder(client_id: impl Into<String>, client_secret: impl Into<Secret>) -> OAuthUserAuthBuilder {
        OAuthUserAuthBuilder {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            client_type: ClientType::default(),
            strategy: None,
            transport: None,
            on_token_created: None,
        }
    }

    pub fn client(&self) -> &ClientCredentials {
        &self.state.client
    }

    /// The cached authentication, without materializing or refreshing it.
    pub async fn cached(&self) -> Option<Authentication> {
        self.state.authentication.lock().await.clone()
    }

    /// Authorize a request and send it through the configured transport.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let request = self.authorize_request(request).await?;
        self.state.transport.send(request).await
    }

    async fn run(
        &self,
        cache: &mut Option<Authentication>,
        operation: AuthOperation,
    ) -> Result<(Authentication, Option<TokenCreatedEvent>)> {
        let state = &self.state;
        let client_id = state.client.client_id.as_str();

        let current = match cache {
            Some(current) => current,
            None => {
                let authentication =
                    materialize(state.transport.as_ref(), &state.client, &state.strategy).await?;
                tracing::info!(client_id, client_type = %state.client.client_type, "Materialized user token");
                cache.insert(authentication)
            }
        };

        if current.invalid {
            return match operation {
                AuthOperation::Delete | AuthOperation::DeleteAuthorization => {
                    tracing::debug!(client_id, "Token already revoked");
                    Ok((current.clone(), None))
                }
                _ => Err(AuthError::TokenInvalid),
            };
        }

        let had_expiration = current.expiration().is_some();
        if let Some(refresh_token) = refresh_due(current, operation) {
            tracing::info!(client_id, "Refreshing user token");
            *current =
                oauth::refresh_token(state.transport.as_ref(), &state.client, &refresh_token).await?;
        }

        match operation {
            AuthOperation::Get => {
                tracing::debug!(client_id, "Using cached user token");
                Ok((current.clone(), None))
            }
            AuthOperation::Refresh => {
                if state.client.client_type == ClientType::OAuthApp {
                    return Err(AuthError::RefreshUnsupported);
                }
                if !had_expiration {
                    return Err(AuthError::RefreshTokenMissing);
                }
                Ok((current.clone(), Some(TokenCreatedEvent::Refresh)))
            }
            AuthOperation::Check | AuthOperation::Reset => {
                let result = if operation == AuthOperation::Check {
                    oauth::check_token(state.transport.as_ref(), &state.client, &current.token).await
                } else {
                    oauth::reset_token(state.transport.as_ref(), &state.client, &current.token).await
                };

                match result {
                    Ok(details) => {
                        *current = apply_details(current, details);
                        let event = (operation == AuthOperation::Reset).then_some(TokenCreatedEvent::Reset);
                        if event.is_some() {
                            tracing::info!(client_id, "Reset user token");
                        }
                        Ok((current.clone(), event))
                    }
                    Err(e) if e.is_not_found() => {
                        tracing::warn!(client_id, %operation, "Provider rejected user token, marking invalid");
                        current.invalid = true;
                        Err(AuthError::TokenInvalid)
                    }
                    Err(e) => Err(e),
                }
            }
            AuthOperation::Delete | AuthOperation::DeleteAuthorization => {
                let result = if operation == AuthOperation::Delete {
                    oauth::delete_token(state.transport.as_ref(), &state.client, &current.token).await
                } else {
                    oauth::delete_authorization(state.transport.as_ref(), &state.client, &current.token)
                        .await
                };

                match result {
                    Ok(()) => tracing::info!(client_id, %operation, "Revoked user token"),
                    Err(e) if e.is_not_found() => {
                        tracing::warn!(client_id, %operation, "User token already revoked");
                    }
                    Err(e) => return Err(e),
                }

                current.invalid = true;
                Ok((current.clone(), None))
            }
        }
    }
}

/// The refresh token to exchange, if the token expired or a refresh was asked for.
fn refresh_due(authentication: &Authentication, operation: AuthOperation) -> Option<Secret> {
    let expiration = authentication.expiration()?;
    if operation == AuthOperation::Refresh || authentication.is_expired_at(Utc::now()) {
        Some(expiration.refresh_token.clone())
    } else {
        None
    }
}

/// Replace the token data of `current` with what check/reset reported.
///
/// The management endpoints do not return refresh tokens, so an expiring
/// token keeps its refresh data and takes the reported expiry when present.
fn apply_details(current: &Authentication, details: TokenDetails) -> Authentication {
    let credential = match &current.credential {
        Credential::OAuthApp { .. } => Credential::OAuthApp {
            scopes: details.scopes,
        },
        Credential::GitHubApp => Credential::GitHubApp,
        Credential::GitHubAppWithExpiration(expiration) => {
            Credential::GitHubAppWithExpiration(Expiration {
                expires_at: details.expires_at.unwrap_or(expiration.expires_at),
                ..expiration.clone()
            })
        }
    };

    Authentication::new(current.client_id.clone(), details.token, credential)
}

#[async_trait]
impl UserAuthenticator for OAuthUserAuth {
    async fn authenticate(&self, operation: AuthOperation) -> Result<Authentication> {
        let (authentication, event) = {
            let mut cache = self.state.authentication.lock().await;
            self.run(&mut cache, operation).await?
        };

        // Outside the lock so the handler may call back into this instance.
        if let (Some(event), Some(handler)) = (event, &self.state.on_token_created) {
            handler.on_token_created(&authentication, event).await;
        }

        Ok(authentication)
    }

    async fn authorize_request(&self, request: ApiRequest) -> Result<ApiRequest> {
        hook::authorize_request(self, &self.state.client, request).await
    }
}
