//! Turns strategy options into a first [`Authentication`].

use crate::error::Result;
use crate::model::{ClientCredentials, ClientType, ExistingCredential, StrategyOptions};
use crate::oauth::{self, device_code::DeviceCodeFlow};
use crate::token::{Authentication, Credential};
use crate::transport::Transport;

/// Obtain the initial authentication for a client.
///
/// Web flow makes one code exchange call, device flow delegates to
/// [`DeviceCodeFlow`], an existing credential is taken as is.
pub async fn materialize(
    transport: &dyn Transport,
    client: &ClientCredentials,
    strategy: &StrategyOptions,
) -> Result<Authentication> {
    strategy.validate(client.client_type)?;

    match strategy {
        StrategyOptions::WebFlow(options) => {
            oauth::exchange_web_flow_code(transport, client, options).await
        }
        StrategyOptions::DeviceFlow(options) => {
            DeviceCodeFlow::new(transport, client)
                .authenticate(options.on_verification.as_ref(), &options.scopes)
                .await
        }
        StrategyOptions::Existing(credential) => Ok(existing_authentication(client, credential)),
    }
}

/// Tag a caller-supplied token with the configured client.
pub fn existing_authentication(
    client: &ClientCredentials,
    credential: &ExistingCredential,
) -> Authentication {
    let kind = match (client.client_type, &credential.expiration) {
        (ClientType::OAuthApp, _) => Credential::OAuthApp {
            scopes: credential.scopes.clone().unwrap_or_default(),
        },
        (ClientType::GitHubApp, Some(expiration)) => {
            Credential::GitHubAppWithExpiration(expiration.clone())
        }
        (ClientType::GitHubApp, None) => Credential::GitHubApp,
    };

    Authentication::new(client.client_id.clone(), credential.token.clone(), kind)
}
