//! Device Authorization Grant flow (RFC 8628).
//!
//! # Flow Overview
//!
//! 1. Request device and user codes from the authorization server
//! 2. Hand the user code and verification URL to a [`VerificationHandler`]
//! 3. User visits the URL on another device and enters the code
//! 4. Poll the token endpoint until the user authorizes or denies
//! 5. Normalize the issued token into an [`Authentication`]
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use tokenkeep_core::oauth::device_code::{DeviceCodeFlow, DeviceVerification};
//! use tokenkeep_core::{ClientCredentials, ClientType, HttpTransport};
//!
//! let transport = HttpTransport::new();
//! let client = ClientCredentials::new(ClientType::OAuthApp, "my-client-id", "my-secret");
//! let flow = DeviceCodeFlow::new(&transport, &client);
//!
//! let on_verification = |verification: &DeviceVerification| {
//!     println!("Visit {} and enter code: {}",
//!              verification.verification_uri,
//!              verification.user_code);
//! };
//! let authentication = flow.authenticate(&on_verification, &["repo".to_string()]).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::error::{AuthError, Result};
use crate::model::{ClientCredentials, ClientType};
use crate::token::Authentication;
use crate::transport::{ApiRequest, Transport};

use super::{body_error, device_code_endpoint, parse_token_response, to_authentication, token_endpoint};

const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Added to the polling interval on every `slow_down` answer.
const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// Device authorization response.
///
/// Contains the codes and URIs needed for the user to authorize the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceVerification {
    /// The device verification code (keep this secret).
    pub device_code: String,

    /// The user verification code to display to the user.
    pub user_code: String,

    /// The URI where the user should go to authorize.
    pub verification_uri: String,

    /// Time in seconds until the device code expires.
    pub expires_in: u64,

    /// Minimum interval in seconds between polling requests.
    pub interval: f64,
}

/// Receives the verification details to present to the user.
#[async_trait]
pub trait VerificationHandler: Send + Sync {
    async fn on_verification(&self, verification: &DeviceVerification);
}

#[async_trait]
impl<F> VerificationHandler for F
where
    F: Fn(&DeviceVerification) + Send + Sync,
{
    async fn on_verification(&self, verification: &DeviceVerification) {
        self(verification)
    }
}

/// Device code flow for headless clients.
pub struct DeviceCodeFlow<'a> {
    transport: &'a dyn Transport,
    client: &'a ClientCredentials,
}

impl<'a> DeviceCodeFlow<'a> {
    pub fn new(transport: &'a dyn Transport, client: &'a ClientCredentials) -> Self {
        Self { transport, client }
    }

    /// Run the whole flow: request codes, notify the handler, poll.
    pub async fn authenticate(
        &self,
        handler: &dyn VerificationHandler,
        scopes: &[String],
    ) -> Result<Authentication> {
        let verification = self.request_device_code(scopes).await?;
        handler.on_verification(&verification).await;
        self.poll_for_token(&verification).await
    }

    /// Request device and user codes from the authorization server.
    ///
    /// Scopes are only sent for OAuth apps.
    pub async fn request_device_code(&self, scopes: &[String]) -> Result<DeviceVerification> {
        let mut body = Map::new();
        body.insert("client_id".into(), json!(self.client.client_id));
        if self.client.client_type == ClientType::OAuthApp {
            body.insert("scope".into(), json!(scopes.join(" ")));
        }

        let request = ApiRequest::new(Method::POST, device_code_endpoint(self.transport.base_url()))
            .header("accept", "application/json")
            .json(Value::Object(body));

        let response = self.transport.send(request).await?;
        if let Some(error) = body_error(&response) {
            return Err(error.into());
        }

        serde_json::from_value(response.body).map_err(|e| AuthError::InvalidResponse {
            message: format!("failed to parse device code response: {}", e),
        })
    }

    /// Poll the token endpoint until the user authorizes or the code expires.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The user denies the request
    /// - The device code expires
    /// - The authorization server returns any other error
    pub async fn poll_for_token(&self, verification: &DeviceVerification) -> Result<Authentication> {
        let mut interval = poll_interval(verification.interval)?;
        let deadline = Instant::now()
            .checked_add(Duration::from_secs(verification.expires_in))
            .ok_or_else(|| AuthError::InvalidResponse {
                message: "device code `expires_in` is out of range".to_string(),
            })?;

        let request = ApiRequest::new(Method::POST, token_endpoint(self.transport.base_url()))
            .header("accept", "application/json")
            .json(json!({
                "client_id": self.client.client_id,
                "device_code": verification.device_code,
                "grant_type": DEVICE_CODE_GRANT_TYPE,
            }));

        loop {
            let response = self.transport.send(request.clone()).await?;

            let error_code = response
                .body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string);

            match error_code.as_deref() {
                None => {
                    let data = parse_token_response(&response)?;
                    tracing::info!(client_id = %self.client.client_id, "device flow authorized");
                    return to_authentication(self.client, &response, data);
                }
                Some("authorization_pending") => {
                    tracing::debug!("Authorization pending, continuing to poll...");
                }
                Some("slow_down") => {
                    tracing::warn!("Polling too fast, slowing down...");
                    interval = interval.saturating_add(SLOW_DOWN_INCREMENT);
                }
                Some("expired_token") => {
                    return Err(AuthError::DeviceFlow {
                        message: "device code expired".to_string(),
                    });
                }
                Some("access_denied") => {
                    return Err(AuthError::DeviceFlow {
                        message: "user denied authorization".to_string(),
                    });
                }
                Some(_) => {
                    return Err(parse_token_response(&response)
                        .err()
                        .unwrap_or_else(|| AuthError::DeviceFlow {
                            message: "unexpected token response".to_string(),
                        }));
                }
            }

            if Instant::now().checked_add(interval).is_none_or(|next| next > deadline) {
                return Err(AuthError::DeviceFlow {
                    message: "device code expired".to_string(),
                });
            }
            sleep(interval).await;
        }
    }
}

/// Polling interval from the server's `interval`; non-positive values poll immediately.
fn poll_interval(seconds: f64) -> Result<Duration> {
    if seconds.is_nan() || seconds <= 0.0 {
        return Ok(Duration::ZERO);
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| AuthError::InvalidResponse {
        message: format!("device code `interval` is out of range: {}", e),
    })
}
