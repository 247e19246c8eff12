//! Remote OAuth methods.
//!
//! This module talks to the provider's OAuth endpoints:
//! - [`exchange_web_flow_code`] / [`refresh_token`] - the token endpoint
//! - [`check_token`], [`reset_token`], [`delete_token`], [`delete_authorization`] -
//!   the token-management endpoints under `/applications/{client_id}`
//! - [`device_code`] - the device authorization flow
//!
//! The token endpoint is not part of the REST API and behaves differently:
//! it lives on the web host rather than the API host, it always answers
//! 200 with errors reported in the body, and it only returns JSON when
//! asked for `application/json` explicitly.

pub mod device_code;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

use crate::error::{AuthError, RequestError, Result};
use crate::hook::basic_authorization;
use crate::model::{ClientCredentials, ClientType, Secret, WebFlowOptions};
use crate::token::{Authentication, Credential, Expiration};
use crate::transport::{ApiRequest, ApiResponse, Transport};

static GITHUB_DOT_COM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(api\.)?github\.com$").expect("static regex is valid")
});

/// URL of the token endpoint for a given API base URL.
pub fn token_endpoint(base_url: &str) -> String {
    login_url(base_url, "/login/oauth/access_token")
}

/// URL of the device authorization endpoint for a given API base URL.
pub fn device_code_endpoint(base_url: &str) -> String {
    login_url(base_url, "/login/device/code")
}

/// Login endpoints live on the web host: `github.com` for the public API,
/// the Enterprise Server host without its `/api/v3` prefix otherwise.
fn login_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if GITHUB_DOT_COM.is_match(base) {
        return format!("https://github.com{}", path);
    }
    if base.contains("/api/v3") {
        return base.replacen("/api/v3", path, 1);
    }
    format!("{}{}", base, path)
}

/// Split a comma separated scope string, dropping empty entries.
pub fn parse_scopes(scope: &str) -> Vec<String> {
    scope
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token endpoint payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TokenEndpointResponse {
    pub access_token: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_token_expires_in: Option<i64>,
}

/// Payload of the token-management endpoints.
#[derive(Debug, Clone, Deserialize)]
struct TokenDetailsResponse {
    token: String,
    #[serde(default)]
    scopes: Option<Vec<String>>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// A token as reported by the check and reset endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenDetails {
    pub token: Secret,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Detect an error reported in a 200 body of the token endpoint.
pub(crate) fn body_error(response: &ApiResponse) -> Option<RequestError> {
    let error = response.body.get("error")?.as_str()?;
    let description = response
        .body
        .get("error_description")
        .and_then(Value::as_str)
        .unwrap_or(error);

    Some(RequestError {
        status: response.status,
        message: format!("{} ({})", description, error),
        headers: response.headers.clone(),
        body: response.body.clone(),
    })
}

pub(crate) fn parse_token_response(response: &ApiResponse) -> Result<TokenEndpointResponse> {
    if let Some(error) = body_error(response) {
        return Err(error.into());
    }

    serde_json::from_value(response.body.clone()).map_err(|e| AuthError::InvalidResponse {
        message: format!("failed to parse token response: {}", e),
    })
}

/// Normalize a token endpoint payload into an [`Authentication`].
///
/// Expirations are computed from the server clock (`date` header), falling
/// back to the local clock when the header is missing.
pub(crate) fn to_authentication(
    client: &ClientCredentials,
    response: &ApiResponse,
    data: TokenEndpointResponse,
) -> Result<Authentication> {
    let credential = match client.client_type {
        ClientType::OAuthApp => Credential::OAuthApp {
            scopes: data.scope.as_deref().map(parse_scopes).unwrap_or_default(),
        },
        ClientType::GitHubApp => match data.refresh_token {
            Some(refresh_token) => {
                let issued_at = response.date().unwrap_or_else(|| {
                    tracing::warn!("token response has no usable date header, using local clock");
                    Utc::now()
                });
                Credential::GitHubAppWithExpiration(Expiration {
                    refresh_token: Secret::new(refresh_token),
                    expires_at: expires_after(issued_at, data.expires_in, "expires_in")?,
                    refresh_token_expires_at: expires_after(
                        issued_at,
                        data.refresh_token_expires_in,
                        "refresh_token_expires_in",
                    )?,
                })
            }
            None => Credential::GitHubApp,
        },
    };

    Ok(Authentication::new(client.client_id.clone(), data.access_token, credential))
}

/// `issued_at` plus a lifetime in seconds reported by the server.
fn expires_after(issued_at: DateTime<Utc>, seconds: Option<i64>, field: &str) -> Result<DateTime<Utc>> {
    Duration::try_seconds(seconds.unwrap_or_default())
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::InvalidResponse {
            message: format!("`{}` is out of range", field),
        })
}

fn token_request(transport: &dyn Transport, body: Map<String, Value>) -> ApiRequest {
    ApiRequest::new(Method::POST, token_endpoint(transport.base_url()))
        .header("accept", "application/json")
        .json(Value::Object(body))
}

/// Exchange a web flow authorization code for a user access token.
pub async fn exchange_web_flow_code(
    transport: &dyn Transport,
    client: &ClientCredentials,
    options: &WebFlowOptions,
) -> Result<Authentication> {
    let mut body = Map::new();
    body.insert("client_id".into(), json!(client.client_id));
    body.insert("client_secret".into(), json!(client.client_secret.expose()));
    body.insert("code".into(), json!(options.code));
    if let Some(redirect_url) = &options.redirect_url {
        body.insert("redirect_uri".into(), json!(redirect_url));
    }
    if let Some(state) = &options.state {
        body.insert("state".into(), json!(state));
    }

    let response = transport.send(token_request(transport, body)).await?;
    let data = parse_token_response(&response)?;
    to_authentication(client, &response, data)
}

/// Exchange a refresh token for a new expiring token.
pub async fn refresh_token(
    transport: &dyn Transport,
    client: &ClientCredentials,
    refresh_token: &Secret,
) -> Result<Authentication> {
    let mut body = Map::new();
    body.insert("client_id".into(), json!(client.client_id));
    body.insert("client_secret".into(), json!(client.client_secret.expose()));
    body.insert("grant_type".into(), json!("refresh_token"));
    body.insert("refresh_token".into(), json!(refresh_token.expose()));

    let response = transport.send(token_request(transport, body)).await?;
    let data = parse_token_response(&response)?;

    // Only GitHub apps issue refresh tokens.
    let client = ClientCredentials {
        client_type: ClientType::GitHubApp,
        ..client.clone()
    };
    to_authentication(&client, &response, data)
}

fn management_request(
    method: Method,
    client: &ClientCredentials,
    resource: &str,
    token: &Secret,
) -> ApiRequest {
    ApiRequest::new(
        method,
        format!("/applications/{}/{}", client.client_id, resource),
    )
    .header(
        "authorization",
        basic_authorization(&client.client_id, &client.client_secret),
    )
    .json(json!({ "access_token": token.expose() }))
}

fn parse_token_details(response: &ApiResponse) -> Result<TokenDetails> {
    let data: TokenDetailsResponse =
        serde_json::from_value(response.body.clone()).map_err(|e| AuthError::InvalidResponse {
            message: format!("failed to parse token details: {}", e),
        })?;

    Ok(TokenDetails {
        token: Secret::new(data.token),
        scopes: data.scopes.unwrap_or_default(),
        expires_at: data.expires_at,
    })
}

/// Validate a token (`POST /applications/{client_id}/token`).
pub async fn check_token(
    transport: &dyn Transport,
    client: &ClientCredentials,
    token: &Secret,
) -> Result<TokenDetails> {
    let response = transport
        .send(management_request(Method::POST, client, "token", token))
        .await?;
    parse_token_details(&response)
}

/// Rotate a token (`PATCH /applications/{client_id}/token`).
pub async fn reset_token(
    transport: &dyn Transport,
    client: &ClientCredentials,
    token: &Secret,
) -> Result<TokenDetails> {
    let response = transport
        .send(management_request(Method::PATCH, client, "token", token))
        .await?;
    parse_token_details(&response)
}

/// Revoke a single token (`DELETE /applications/{client_id}/token`).
pub async fn delete_token(
    transport: &dyn Transport,
    client: &ClientCredentials,
    token: &Secret,
) -> Result<()> {
    transport
        .send(management_request(Method::DELETE, client, "token", token))
        .await?;
    Ok(())
}

/// Revoke the whole grant (`DELETE /applications/{client_id}/grant`).
pub async fn delete_authorization(
    transport: &dyn Transport,
    client: &ClientCredentials,
    token: &Secret,
) -> Result<()> {
    transport
        .send(management_request(Method::DELETE, client, "grant", token))
        .await?;
    Ok(())
}
