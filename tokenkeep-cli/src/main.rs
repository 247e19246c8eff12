//! tokenkeep CLI
//!
//! Runs one lifecycle operation on a configured user token, or sends one
//! authorized API request.
//!
//! # Usage
//!
//! ```bash
//! # Print the current token (exchanging or refreshing it as needed)
//! tokenkeep token
//!
//! # Validate the token against the provider
//! tokenkeep --format json check
//!
//! # Call the API with the token attached
//! tokenkeep request GET /user
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::Method;
use std::path::PathBuf;
use std::sync::Arc;
use tokenkeep_core::{
    ApiRequest, AuthOperation, Authentication, DeviceVerification, OAuthUserAuth,
    TokenCreatedEvent, UserAuthenticator,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod config;

#[derive(Parser)]
#[command(name = "tokenkeep")]
#[command(about = "Manage the lifecycle of an OAuth user access token")]
#[command(version)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current token, refreshing it if it expired
    Token,

    /// Validate the token with the provider
    Check,

    /// Replace the token with a new one
    Reset,

    /// Exchange the refresh token for a new token (GitHub apps only)
    Refresh,

    /// Revoke the token
    Delete,

    /// Revoke the token and the whole grant
    DeleteAuthorization,

    /// Send an authorized API request
    Request {
        /// HTTP method (e.g., GET, POST)
        method: String,

        /// Route relative to the API base URL, or an absolute URL
        route: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load_config(cli.config.as_deref())?;

    let on_verification = |verification: &DeviceVerification| {
        eprintln!(
            "Open {} and enter the code {}",
            verification.verification_uri, verification.user_code
        );
    };
    let on_token_created = |authentication: &Authentication, event: TokenCreatedEvent| {
        info!(
            client_id = %authentication.client_id,
            %event,
            "Provider issued a new user token"
        );
    };

    let auth = config
        .into_builder(Some(Arc::new(on_verification)))?
        .on_token_created(Arc::new(on_token_created))
        .build()
        .context("Invalid configuration")?;

    let operation = match cli.command {
        Commands::Token => AuthOperation::Get,
        Commands::Check => AuthOperation::Check,
        Commands::Reset => AuthOperation::Reset,
        Commands::Refresh => AuthOperation::Refresh,
        Commands::Delete => AuthOperation::Delete,
        Commands::DeleteAuthorization => AuthOperation::DeleteAuthorization,
        Commands::Request { method, route, data } => {
            return send_request(&auth, &method, route, data.as_deref(), cli.format).await;
        }
    };

    let authentication = auth
        .authenticate(operation)
        .await
        .with_context(|| format!("{} failed", operation))?;
    print_authentication(&authentication, operation, cli.format)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_authentication(
    authentication: &Authentication,
    operation: AuthOperation,
    format: Format,
) -> Result<()> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(authentication)?);
        return Ok(());
    }

    match operation {
        AuthOperation::Delete | AuthOperation::DeleteAuthorization => {
            println!("Token revoked for {}", authentication.client_id);
        }
        _ => {
            println!("{}", authentication.token.expose());
            if let Some(scopes) = authentication.scopes() {
                eprintln!("  Scopes: {}", scopes.join(","));
            }
            if let Some(expiration) = authentication.expiration() {
                eprintln!("  Expires: {}", expiration.expires_at.to_rfc3339());
                eprintln!(
                    "  Refresh token expires: {}",
                    expiration.refresh_token_expires_at.to_rfc3339()
                );
            }
        }
    }
    Ok(())
}

async fn send_request(
    auth: &OAuthUserAuth,
    method: &str,
    route: String,
    data: Option<&str>,
    format: Format,
) -> Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method {:?}", method))?;

    let mut request = ApiRequest::new(method, route);
    if let Some(data) = data {
        let body = serde_json::from_str(data).context("Request body is not valid JSON")?;
        request = request.json(body);
    }

    let response = auth.request(request).await.context("Request failed")?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&response.body)?),
        Format::Text => {
            eprintln!("HTTP {}", response.status);
            match &response.body {
                serde_json::Value::Null => {}
                serde_json::Value::String(text) => println!("{}", text),
                body => println!("{}", serde_json::to_string_pretty(body)?),
            }
        }
    }
    Ok(())
}
