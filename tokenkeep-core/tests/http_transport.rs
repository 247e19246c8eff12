//! End-to-end tests against a mock HTTP server.
//!
//! The mock server plays an Enterprise Server: API routes live under
//! `/api/v3` and login routes at the host root.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::Arc;
use tokenkeep_core::{
    ApiRequest, AuthError, AuthOperation, ClientType, Credential, Expiration, ExistingCredential,
    HttpTransport, OAuthUserAuth, Secret, UserAuthenticator, WebFlowOptions,
};
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn transport(server: &MockServer) -> Arc<HttpTransport> {
    Arc::new(HttpTransport::with_base_url(format!("{}/api/v3", server.uri())))
}

fn expiring_app(server: &MockServer, expires_at: DateTime<Utc>) -> OAuthUserAuth {
    OAuthUserAuth::builder("lv1.1234567890abcdef", "secret")
        .client_type(ClientType::GitHubApp)
        .strategy(ExistingCredential::new("ghu_old").with_expiration(Expiration {
            refresh_token: Secret::new("ghr_old"),
            expires_at,
            refresh_token_expires_at: Utc::now() + Duration::days(180),
        }))
        .transport(transport(server))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_web_flow_then_api_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(header("accept", "application/json"))
        .and(body_json(json!({
            "client_id": "1234567890abcdef1234",
            "client_secret": "secret",
            "code": "code123"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token123",
            "scope": "repo,gist",
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v3/user"))
        .and(header("authorization", "token token123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octocat" })))
        .expect(2)
        .mount(&server)
        .await;

    let auth = OAuthUserAuth::builder("1234567890abcdef1234", "secret")
        .strategy(WebFlowOptions::new("code123"))
        .transport(transport(&server))
        .build()
        .unwrap();

    for _ in 0..2 {
        let response = auth.request(ApiRequest::get("/user")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body["login"], "octocat");
    }

    let authentication = auth.cached().await.unwrap();
    assert_eq!(
        authentication.credential,
        Credential::OAuthApp {
            scopes: vec!["repo".to_string(), "gist".to_string()]
        }
    );
}

#[tokio::test]
async fn test_token_endpoint_error_in_success_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired.",
            "error_uri": "https://docs.github.com/apps/troubleshooting"
        })))
        .mount(&server)
        .await;

    let auth = OAuthUserAuth::builder("1234567890abcdef1234", "secret")
        .strategy(WebFlowOptions::new("expired"))
        .transport(transport(&server))
        .build()
        .unwrap();

    match auth.authenticate(AuthOperation::Get).await {
        Err(AuthError::Request(error)) => {
            assert_eq!(error.status, 200);
            assert!(error.message.contains("bad_verification_code"));
        }
        other => panic!("expected request error, got {:?}", other),
    }
    assert!(auth.cached().await.is_none());
}

#[tokio::test]
async fn test_refresh_uses_server_date() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(body_json(json!({
            "client_id": "lv1.1234567890abcdef",
            "client_secret": "secret",
            "grant_type": "refresh_token",
            "refresh_token": "ghr_old"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("date", "Wed, 21 Oct 2015 07:28:00 GMT")
                .set_body_json(json!({
                    "access_token": "ghu_new",
                    "expires_in": 28800,
                    "refresh_token": "ghr_new",
                    "refresh_token_expires_in": 15897600,
                    "scope": "",
                    "token_type": "bearer"
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = expiring_app(&server, Utc::now() + Duration::hours(1));
    let authentication = auth.authenticate(AuthOperation::Refresh).await.unwrap();

    let issued_at = Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap();
    assert_eq!(authentication.token.expose(), "ghu_new");
    assert_eq!(
        authentication.expiration(),
        Some(&Expiration {
            refresh_token: Secret::new("ghr_new"),
            expires_at: issued_at + Duration::seconds(28800),
            refresh_token_expires_at: issued_at + Duration::seconds(15897600),
        })
    );
}

#[tokio::test]
async fn test_management_routes_send_basic_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/applications/lv1.1234567890abcdef/token"))
        .and(header(
            "authorization",
            "basic bHYxLjEyMzQ1Njc4OTBhYmNkZWY6c2VjcmV0",
        ))
        .and(body_json(json!({ "access_token": "ghu_old" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "token": "ghu_old",
            "scopes": [],
            "expires_at": "2030-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = expiring_app(&server, Utc::now() + Duration::hours(1));
    let authentication = auth.authenticate(AuthOperation::Check).await.unwrap();

    let expiration = authentication.expiration().unwrap();
    assert_eq!(
        expiration.expires_at,
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    );
    assert_eq!(expiration.refresh_token.expose(), "ghr_old");
}

#[tokio::test]
async fn test_check_not_found_invalidates_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/applications/lv1.1234567890abcdef/token"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = expiring_app(&server, Utc::now() + Duration::hours(1));

    let result = auth.authenticate(AuthOperation::Check).await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));

    // No further remote calls once the token is known to be invalid.
    let result = auth.authenticate(AuthOperation::Get).await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));
}

#[tokio::test]
async fn test_delete_tolerates_missing_token() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v3/applications/lv1.1234567890abcdef/grant"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = expiring_app(&server, Utc::now() + Duration::hours(1));
    let authentication = auth
        .authenticate(AuthOperation::DeleteAuthorization)
        .await
        .unwrap();

    assert!(authentication.invalid);
    assert!(auth.cached().await.unwrap().invalid);
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/v3/applications/lv1.1234567890abcdef/token"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "Internal Server Error" })),
        )
        .mount(&server)
        .await;

    let auth = expiring_app(&server, Utc::now() + Duration::hours(1));

    match auth.authenticate(AuthOperation::Reset).await {
        Err(AuthError::Request(error)) => {
            assert_eq!(error.status, 500);
            assert_eq!(error.message, "Internal Server Error");
        }
        other => panic!("expected request error, got {:?}", other),
    }
    assert!(!auth.cached().await.unwrap().invalid);
}
