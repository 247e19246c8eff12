//! Request authorization.
//!
//! Decides, per outgoing request, which credential to attach:
//! - nothing for the token and device-code endpoints,
//! - Basic auth with the client id and secret for the token-management
//!   endpoints (`/applications/{client_id}/token`, `.../grant`),
//! - the user token (`authorization: token <token>`) for everything else.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::Result;
use crate::model::{ClientCredentials, Secret};
use crate::token::{AuthOperation, UserAuthenticator};
use crate::transport::ApiRequest;

static LOGIN_ROUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/login/(oauth/access_token|device/code)$").expect("static regex is valid")
});

static BASIC_AUTH_ROUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/applications/[^/]+/(token|grant)s?").expect("static regex is valid")
});

/// Credential a route calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAuth {
    /// OAuth web/device flow endpoints. Never carry the user token.
    Unauthenticated,
    /// Token-management endpoints, authenticated as the client.
    Basic,
    /// Regular API calls, authenticated as the user.
    UserToken,
}

/// Classify a request URL.
pub fn route_auth(url: &str) -> RouteAuth {
    if LOGIN_ROUTES.is_match(url) {
        RouteAuth::Unauthenticated
    } else if requires_basic_auth(url) {
        RouteAuth::Basic
    } else {
        RouteAuth::UserToken
    }
}

/// Whether the URL targets a token-management endpoint.
pub fn requires_basic_auth(url: &str) -> bool {
    BASIC_AUTH_ROUTES.is_match(url)
}

/// `basic <base64(client_id:client_secret)>`
pub fn basic_authorization(client_id: &str, client_secret: &Secret) -> String {
    let credentials = STANDARD.encode(format!("{}:{}", client_id, client_secret.expose()));
    format!("basic {}", credentials)
}

/// `token <token>`
pub fn token_authorization(token: &Secret) -> String {
    format!("token {}", token.expose())
}

/// Decorate a request for the given client.
///
/// Only user-token routes consult `auth`, which may materialize or refresh
/// the cached token as a side effect.
pub async fn authorize_request<A>(
    auth: &A,
    client: &ClientCredentials,
    mut request: ApiRequest,
) -> Result<ApiRequest>
where
    A: UserAuthenticator + ?Sized,
{
    match route_auth(&request.url) {
        RouteAuth::Unauthenticated => {}
        RouteAuth::Basic => {
            request.set_header(
                "authorization",
                basic_authorization(&client.client_id, &client.client_secret),
            );
        }
        RouteAuth::UserToken => {
            let authentication = auth.authenticate(AuthOperation::Get).await?;
            request.set_header("authorization", token_authorization(&authentication.token));
        }
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_routes_are_unauthenticated() {
        assert_eq!(
            route_auth("https://github.com/login/oauth/access_token"),
            RouteAuth::Unauthenticated
        );
        assert_eq!(
            route_auth("https://github.com/login/device/code"),
            RouteAuth::Unauthenticated
        );
        assert_eq!(
            route_auth("https://github.com/login/oauth/access_token/extra"),
            RouteAuth::UserToken
        );
    }

    #[test]
    fn test_requires_basic_auth() {
        assert!(requires_basic_auth("/applications/C1/token"));
        assert!(requires_basic_auth("/applications/C1/grant"));
        assert!(requires_basic_auth("/applications/C1/grants/123"));
        assert!(requires_basic_auth(
            "https://api.github.com/applications/lv1.abc/token/scoped"
        ));
        assert!(!requires_basic_auth("/applications/C1"));
        assert!(!requires_basic_auth("/user"));
        assert_eq!(route_auth("/repos/octocat/hello"), RouteAuth::UserToken);
    }

    #[test]
    fn test_header_formats() {
        assert_eq!(
            basic_authorization("1234567890abcdef1234", &Secret::new("secret")),
            "basic MTIzNDU2Nzg5MGFiY2RlZjEyMzQ6c2VjcmV0"
        );
        assert_eq!(token_authorization(&Secret::new("token123")), "token token123");
    }
}
