//! Integration tests for the OAuth callback endpoint
//!
//! These tests run the full flow against a live axum server, a mock
//! provider and an in-memory SQLite database: token exchange including the
//! long-lived upgrade, credential and connection persistence, webhook
//! registration, and the redirect contract for every failure class.

use anyhow::{Context, Result as AnyhowResult};
use channels::channels::{InstagramConnector, Registry, WhatsAppConnector};
use channels::config::{AppConfig, PlatformOAuthConfig};
use channels::crypto::CryptoKey;
use channels::oauth_state::StateSigner;
use channels::repositories::{ConnectionStatusRepository, CredentialRepository, WebhookRepository};
use channels::server::{AppState, create_app};
use chrono::Utc;
use reqwest::StatusCode;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "test_utils/mod.rs"]
mod test_utils;

use test_utils::{TEST_SIGNING_SECRET, insert_user, setup_test_db, sign_state};

const DASHBOARD_ORIGIN: &str = "http://localhost:3000";
const AUTOMATION_BASE: &str = "http://localhost:5678";
const MAX_AGE_MS: i64 = 600_000;

struct TestServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<AnyhowResult<()>>>,
}

impl TestServerHandle {
    async fn shutdown(mut self) -> AnyhowResult<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            handle.await.context("server task join failed")??;
        }
        Ok(())
    }
}

fn test_crypto_key() -> CryptoKey {
    CryptoKey::new(vec![7u8; 32]).expect("32-byte key")
}

fn platform_config(base: &str) -> PlatformOAuthConfig {
    PlatformOAuthConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "https://api.example.com/callback".to_string(),
        authorize_base: Some(base.to_string()),
        token_base: Some(base.to_string()),
        api_base: Some(base.to_string()),
        scopes: None,
    }
}

/// Spawns the app on a random port with the given registry and database.
async fn spawn_test_app(db: DatabaseConnection, registry: Registry) -> (String, TestServerHandle) {
    let config = AppConfig {
        operator_tokens: vec!["test-token".to_string()],
        dashboard_origin: DASHBOARD_ORIGIN.to_string(),
        automation_base_url: AUTOMATION_BASE.to_string(),
        ..Default::default()
    };

    let state = AppState {
        config: Arc::new(config),
        db: Arc::new(db),
        http: reqwest::Client::new(),
        registry: Arc::new(registry),
        crypto_key: test_crypto_key(),
        state_signer: StateSigner::new(TEST_SIGNING_SECRET.to_vec(), MAX_AGE_MS),
    };
    let app = create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_url = format!("http://{}", addr);

    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let join_handle = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        let _ = ready_tx.send(());
        server.await.context("axum server error")
    });

    ready_rx.await.expect("server task to signal readiness");

    (
        server_url,
        TestServerHandle {
            shutdown_tx: Some(shutdown_tx),
            join_handle: Some(join_handle),
        },
    )
}

/// Client that surfaces redirects instead of following them.
fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn fresh_state(user_id: &str, platform: &str) -> String {
    sign_state(
        TEST_SIGNING_SECRET,
        user_id,
        platform,
        Utc::now().timestamp_millis(),
    )
}

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .expect("Location header")
        .to_str()
        .unwrap()
        .to_string()
}

async fn mount_instagram_happy_path(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "shorttok",
            "user_id": "ig9",
            "expires_in": 3600
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/access_token"))
        .and(query_param("grant_type", "ig_exchange_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "longtok",
            "token_type": "bearer",
            "expires_in": 5184000
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ig9",
            "username": "acme.store",
            "account_type": "BUSINESS",
            "followers_count": 1200
        })))
        .mount(server)
        .await;
}

fn instagram_registry(server: &MockServer) -> Registry {
    let mut registry = Registry::new();
    registry.register(Arc::new(InstagramConnector::from_config(&platform_config(
        &server.uri(),
    ))));
    registry
}

#[tokio::test]
async fn instagram_callback_persists_long_lived_credential_and_redirects()
-> Result<(), Box<dyn std::error::Error>> {
    let provider = MockServer::start().await;
    mount_instagram_happy_path(&provider).await;

    let db = setup_test_db().await?;
    insert_user(&db, "user42").await?;
    let verify_db = Arc::new(db.clone());

    let (server_url, handle) = spawn_test_app(db, instagram_registry(&provider)).await;

    let response = no_redirect_client()
        .get(format!(
            "{}/callback/instagram?code=abc123&state={}",
            server_url,
            fresh_state("user42", "instagram")
        ))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        format!(
            "{}/connect/success?userId=user42&platform=instagram&instagramId=ig9",
            DASHBOARD_ORIGIN
        )
    );

    // The stored credential is the upgraded long-lived token, encrypted.
    let credentials = CredentialRepository::new(Arc::clone(&verify_db), test_crypto_key());
    let credential = credentials
        .find("user42", "instagram")
        .await?
        .expect("credential persisted");
    let ciphertext = credential
        .access_token_ciphertext
        .clone()
        .expect("access token stored");
    assert_ne!(ciphertext, b"longtok");

    let (access, refresh) = credentials.decrypt_tokens(&credential).await?;
    assert_eq!(access.as_deref(), Some("longtok"));
    assert_eq!(refresh, None);
    assert_eq!(credential.account_id.as_deref(), Some("ig9"));
    assert!(credential.expires_at.is_some());
    assert!(credential.disconnected_at.is_none());

    let statuses = ConnectionStatusRepository::new(Arc::clone(&verify_db));
    let connection = statuses
        .find("user42", "instagram")
        .await?
        .expect("connection recorded");
    assert!(connection.connected);
    assert_eq!(connection.username.as_deref(), Some("acme.store"));
    assert_eq!(connection.profile_warning, None);
    assert_eq!(connection.profile.as_ref().unwrap()["followers_count"], 1200);

    let webhooks = WebhookRepository::new(Arc::clone(&verify_db));
    let registration = webhooks
        .find("user42", "instagram")
        .await?
        .expect("webhook registered");
    assert!(registration.active);
    assert_eq!(
        registration.url,
        format!("{}/webhook/instagram/user42", AUTOMATION_BASE)
    );

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn expired_state_redirects_without_contacting_the_provider()
-> Result<(), Box<dyn std::error::Error>> {
    let provider = MockServer::start().await;

    let db = setup_test_db().await?;
    insert_user(&db, "user42").await?;
    let (server_url, handle) = spawn_test_app(db, instagram_registry(&provider)).await;

    let stale = sign_state(
        TEST_SIGNING_SECRET,
        "user42",
        "instagram",
        Utc::now().timestamp_millis() - 2 * MAX_AGE_MS,
    );
    let response = no_redirect_client()
        .get(format!(
            "{}/callback/instagram?code=abc123&state={}",
            server_url, stale
        ))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with(&format!("{}/connect/error?", DASHBOARD_ORIGIN)));
    assert!(location.contains("platform=instagram"));
    assert!(location.contains("code=expired_state"));

    // A stale token must never reach the token endpoint.
    assert!(provider.received_requests().await.unwrap().is_empty());

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn missing_parameters_redirect_with_distinct_codes()
-> Result<(), Box<dyn std::error::Error>> {
    let provider = MockServer::start().await;

    let db = setup_test_db().await?;
    let (server_url, handle) = spawn_test_app(db, instagram_registry(&provider)).await;
    let client = no_redirect_client();

    let no_code = client
        .get(format!(
            "{}/callback/instagram?state={}",
            server_url,
            fresh_state("user42", "instagram")
        ))
        .send()
        .await?;
    assert_eq!(no_code.status(), StatusCode::FOUND);
    assert!(location(&no_code).contains("code=missing_code"));

    let no_state = client
        .get(format!("{}/callback/instagram?code=abc123", server_url))
        .send()
        .await?;
    assert_eq!(no_state.status(), StatusCode::FOUND);
    assert!(location(&no_state).contains("code=missing_state"));

    let forged = client
        .get(format!(
            "{}/callback/instagram?code=abc123&state=forged.token",
            server_url
        ))
        .send()
        .await?;
    assert!(location(&forged).contains("code=invalid_state"));

    assert!(provider.received_requests().await.unwrap().is_empty());

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn provider_denial_redirects_as_provider_error() -> Result<(), Box<dyn std::error::Error>> {
    let provider = MockServer::start().await;

    let db = setup_test_db().await?;
    insert_user(&db, "user42").await?;
    let (server_url, handle) = spawn_test_app(db, instagram_registry(&provider)).await;

    let response = no_redirect_client()
        .get(format!(
            "{}/callback/instagram?error=access_denied&error_description=The+user+denied+your+request",
            server_url
        ))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.contains("code=provider_error"));
    assert!(location.contains("access_denied"));

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn error_body_under_http_200_redirects_as_provider_error()
-> Result<(), Box<dyn std::error::Error>> {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error_type": "OAuthException",
            "error_message": "Invalid authorization code"
        })))
        .mount(&provider)
        .await;

    let db = setup_test_db().await?;
    insert_user(&db, "user42").await?;
    let verify_db = Arc::new(db.clone());
    let (server_url, handle) = spawn_test_app(db, instagram_registry(&provider)).await;

    let response = no_redirect_client()
        .get(format!(
            "{}/callback/instagram?code=bad&state={}",
            server_url,
            fresh_state("user42", "instagram")
        ))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).contains("code=provider_error"));

    let credentials = CredentialRepository::new(verify_db, test_crypto_key());
    assert!(credentials.find("user42", "instagram").await?.is_none());

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn unknown_user_fails_after_exchange_without_persisting()
-> Result<(), Box<dyn std::error::Error>> {
    let provider = MockServer::start().await;
    mount_instagram_happy_path(&provider).await;

    let db = setup_test_db().await?;
    let verify_db = Arc::new(db.clone());
    let (server_url, handle) = spawn_test_app(db, instagram_registry(&provider)).await;

    let response = no_redirect_client()
        .get(format!(
            "{}/callback/instagram?code=abc123&state={}",
            server_url,
            fresh_state("ghost", "instagram")
        ))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).contains("code=user_not_found"));

    let credentials = CredentialRepository::new(verify_db, test_crypto_key());
    assert!(credentials.find("ghost", "instagram").await?.is_none());

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn profile_fetch_failure_is_recorded_but_not_fatal()
-> Result<(), Box<dyn std::error::Error>> {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "shorttok",
            "user_id": "ig9",
            "expires_in": 3600
        })))
        .mount(&provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "longtok",
            "expires_in": 5184000
        })))
        .mount(&provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&provider)
        .await;

    let db = setup_test_db().await?;
    insert_user(&db, "user42").await?;
    let verify_db = Arc::new(db.clone());
    let (server_url, handle) = spawn_test_app(db, instagram_registry(&provider)).await;

    let response = no_redirect_client()
        .get(format!(
            "{}/callback/instagram?code=abc123&state={}",
            server_url,
            fresh_state("user42", "instagram")
        ))
        .send()
        .await?;

    // Still a success: the tokens are in hand, only enrichment failed.
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with(&format!("{}/connect/success?", DASHBOARD_ORIGIN)));

    let statuses = ConnectionStatusRepository::new(Arc::clone(&verify_db));
    let connection = statuses
        .find("user42", "instagram")
        .await?
        .expect("connection recorded");
    assert!(connection.connected);
    assert!(connection.profile_warning.is_some());
    assert_eq!(connection.username, None);

    let credentials = CredentialRepository::new(verify_db, test_crypto_key());
    let credential = credentials
        .find("user42", "instagram")
        .await?
        .expect("credential persisted");
    let (access, _) = credentials.decrypt_tokens(&credential).await?;
    assert_eq!(access.as_deref(), Some("longtok"));

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn whatsapp_account_id_comes_from_the_profile() -> Result<(), Box<dyn std::error::Error>> {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "wa-token",
            "token_type": "bearer",
            "expires_in": 5183944
        })))
        .mount(&provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "wa77",
            "name": "Acme Support"
        })))
        .mount(&provider)
        .await;

    let mut registry = Registry::new();
    registry.register(Arc::new(WhatsAppConnector::from_config(&platform_config(
        &provider.uri(),
    ))));

    let db = setup_test_db().await?;
    insert_user(&db, "user42").await?;
    let (server_url, handle) = spawn_test_app(db, registry).await;

    let response = no_redirect_client()
        .get(format!(
            "{}/callback/whatsapp?code=abc123&state={}",
            server_url,
            fresh_state("user42", "whatsapp")
        ))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        format!(
            "{}/connect/success?userId=user42&platform=whatsapp&whatsappId=wa77",
            DASHBOARD_ORIGIN
        )
    );

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn unregistered_platform_gets_problem_json() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup_test_db().await?;
    let (server_url, handle) = spawn_test_app(db, Registry::new()).await;

    let response = no_redirect_client()
        .get(format!("{}/callback/telegram?code=abc", server_url))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "UNSUPPORTED_PLATFORM");

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn json_callback_variant_returns_connection_summary()
-> Result<(), Box<dyn std::error::Error>> {
    let provider = MockServer::start().await;
    mount_instagram_happy_path(&provider).await;

    let db = setup_test_db().await?;
    insert_user(&db, "user42").await?;
    let (server_url, handle) = spawn_test_app(db, instagram_registry(&provider)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/callback/instagram", server_url))
        .json(&json!({
            "code": "abc123",
            "state": fresh_state("user42", "instagram")
        }))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "connected");
    assert_eq!(body["user_id"], "user42");
    assert_eq!(body["platform"], "instagram");
    assert_eq!(body["account_id"], "ig9");
    assert_eq!(body["username"], "acme.store");

    // Missing code surfaces as problem+json rather than a redirect.
    let missing = client
        .post(format!("{}/callback/instagram", server_url))
        .json(&json!({
            "state": fresh_state("user42", "instagram")
        }))
        .send()
        .await?;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let body: Value = missing.json().await?;
    assert_eq!(body["code"], "MISSING_CODE");
    assert!(body["trace_id"].is_string());

    handle.shutdown().await?;
    Ok(())
}
