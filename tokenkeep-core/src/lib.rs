//! # tokenkeep core
//!
//! Lifecycle management for user-to-server OAuth access tokens.
//!
//! This crate provides:
//! - Domain types for client identity, strategies and the materialized token
//! - [`OAuthUserAuth`], which obtains, caches, refreshes, checks, resets
//!   and revokes one client's user token
//! - Request authorization that attaches the right credential per route
//! - A [`Transport`] seam with a `reqwest` implementation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tokenkeep_core::{ApiRequest, OAuthUserAuth, WebFlowOptions};
//!
//! async fn whoami() -> tokenkeep_core::Result<serde_json::Value> {
//!     let auth = OAuthUserAuth::builder("1234567890abcdef1234", "secret")
//!         .strategy(WebFlowOptions::new("code123"))
//!         .build()?;
//!
//!     // Exchanges the code on first use and reuses the token afterwards.
//!     let response = auth.request(ApiRequest::get("/user")).await?;
//!     Ok(response.body)
//! }
//! ```

pub mod config;
pub mod error;
pub mod hook;
pub mod materialize;
pub mod model;
pub mod oauth;
pub mod token;
pub mod token_manager;
pub mod transport;

pub use config::{AuthConfig, StrategyConfig};

pub use error::{AuthError, RequestError, Result};

pub use hook::{requires_basic_auth, RouteAuth};

pub use model::{
    ClientCredentials,
    ClientType,
    DeviceFlowOptions,
    ExistingCredential,
    Secret,
    StrategyOptions,
    WebFlowOptions,
};

pub use oauth::device_code::{DeviceVerification, VerificationHandler};

pub use token::{
    AuthOperation,
    Authentication,
    Credential,
    Expiration,
    TokenCreatedEvent,
    TokenCreatedHandler,
    UserAuthenticator,
};

pub use token_manager::{OAuthUserAuth, OAuthUserAuthBuilder};

pub use transport::{ApiRequest, ApiResponse, Headers, HttpTransport, Transport};
