//! HTTP transport abstraction.
//!
//! Every remote call goes through a [`Transport`]. [`HttpTransport`] is the
//! `reqwest` backed implementation; tests substitute their own.
//!
//! Request URLs are either absolute or a path relative to the transport's
//! base URL (e.g. `/user` against `https://api.github.com`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use crate::error::{AuthError, RequestError, Result};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Media type the REST API expects.
const DEFAULT_ACCEPT: &str = "application/vnd.github.v3+json";

/// Header map with lowercase names.
pub type Headers = BTreeMap<String, String>;

/// Description of an outgoing request.
#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set a header. Names are stored lowercase.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Set a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The `authorization` header, if one is attached.
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get("authorization").map(String::as_str)
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: BTreeMap<&str, &str> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name == "authorization" {
                    (name.as_str(), "[REDACTED]")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();

        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .finish_non_exhaustive()
    }
}

/// A successful (status < 400) response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Headers,

    /// Decoded JSON body, `Value::Null` when empty.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// The server clock from the `date` header.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.headers
            .get("date")
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
            .map(|date| date.with_timezone(&Utc))
    }
}

/// Sends requests to the provider.
///
/// Implementations must map any status >= 400 to [`AuthError::Request`]
/// and failures without an HTTP response to [`AuthError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL relative request URLs resolve against.
    fn base_url(&self) -> &str;

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// `reqwest` backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl HttpTransport {
    /// Create a transport against the default API base URL.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a transport against a custom base URL (e.g. an Enterprise
    /// Server at `https://ghe.example.com/api/v3`).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: format!("tokenkeep/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn resolve(&self, url: &str) -> Result<Url> {
        let absolute = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        };

        Url::parse(&absolute).map_err(|e| AuthError::Transport {
            message: format!("invalid request URL {}: {}", absolute, e),
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.resolve(&request.url)?;

        let mut headers = Headers::new();
        headers.insert(ACCEPT.as_str().to_string(), DEFAULT_ACCEPT.to_string());
        headers.insert(USER_AGENT.as_str().to_string(), self.user_agent.clone());
        headers.extend(request.headers);

        tracing::debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method, url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| AuthError::Transport {
            message: format!("request failed: {}", e),
        })?;

        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let text = response.text().await.map_err(|e| AuthError::Transport {
            message: format!("failed to read response body: {}", e),
        })?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status >= 400 {
            return Err(RequestError::from_response(status, headers, body).into());
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
