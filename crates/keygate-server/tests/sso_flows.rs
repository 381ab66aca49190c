// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Router tests for the SSO request, callback and direct second-factor flows,
//! with the auth server mocked by wiremock.

mod common;

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
	body::Body,
	http::{header, Method, Request, StatusCode},
};
use common::{body_string, spawn_app, test_config, TestApp, BASE_URL};
use keygate_common_secret::SecretString;
use keygate_server::db::EventRepository;
use keygate_server::{create_app_state_with, Collaborators, ServerConfig};
use keygate_server_auth::signing::sign_callback;
use keygate_server_auth::{AuthType, OrgId, ProviderError, SecondFactor, SecondFactorOutcome};
use keygate_server_config::SsoMode;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sso_config(mode: SsoMode, auth_server: &str, default_org: Option<OrgId>) -> ServerConfig {
	let mut config = test_config();
	config.sso.mode = Some(mode);
	config.sso.auth_server_url = Some(auth_server.to_string());
	config.sso.license = Some(SecretString::new("license-key".to_string()));
	config.sso.saml_url = Some("https://idp.example.test/sso".to_string());
	config.sso.saml_issuer_url = Some("https://idp.example.test/issuer".to_string());
	config.sso.saml_cert = Some("CERT".to_string());
	config.sso.default_org_id = default_org.map(|id| id.to_string());
	config
}

/// App in SAML mode whose default organization is the seeded `default-org`.
async fn saml_app(auth_server: &MockServer) -> (TestApp, OrgId) {
	let app = spawn_app(test_config()).await;
	let default_org = app.directory().create_org("default-org", false).await.unwrap();
	let app = app
		.reconfigure(sso_config(SsoMode::Saml, &auth_server.uri(), Some(default_org.id)))
		.await;
	(app, default_org.id)
}

async fn stored_state(app: &TestApp) -> (String, String) {
	sqlx::query_as::<_, (String, String)>("SELECT state, secret FROM sso_states")
		.fetch_one(&app.pool)
		.await
		.unwrap()
}

fn signed_callback(query: &str, secret: &str) -> String {
	let sig = sign_callback(secret.as_bytes(), query.as_bytes()).unwrap();
	format!("/sso/callback?{query}&sig={}", sig.replace('=', "%3D"))
}

// ============================================================================
// Request phase
// ============================================================================

#[tokio::test]
async fn provider_rejection_disables_sso() {
	let auth_server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/request/google"))
		.respond_with(ResponseTemplate::new(401))
		.mount(&auth_server)
		.await;
	let app = spawn_app(sso_config(SsoMode::Google, &auth_server.uri(), None)).await;

	let response = app.get("/sso/request").await;
	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

	let states: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sso_states")
		.fetch_one(&app.pool)
		.await
		.unwrap();
	assert_eq!(states, 0);
}

#[tokio::test]
async fn provider_failure_is_opaque_server_error() {
	let auth_server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/request/google"))
		.respond_with(ResponseTemplate::new(503).set_body_string("license db offline"))
		.mount(&auth_server)
		.await;
	let app = spawn_app(sso_config(SsoMode::Google, &auth_server.uri(), None)).await;

	let response = app.get("/sso/request").await;
	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(!body_string(response).await.contains("license db offline"));
}

#[tokio::test]
async fn google_request_redirects_to_provider() {
	let auth_server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/request/google"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(serde_json::json!({ "url": "https://accounts.example.test/auth" })),
		)
		.mount(&auth_server)
		.await;
	let app = spawn_app(sso_config(SsoMode::Google, &auth_server.uri(), None)).await;

	let response = app.get("/sso/request").await;
	assert_eq!(response.status(), StatusCode::FOUND);
	assert_eq!(
		response.headers()[header::LOCATION],
		"https://accounts.example.test/auth"
	);
}

#[tokio::test]
async fn request_refused_without_subscription() {
	let auth_server = MockServer::start().await;
	let mut config = sso_config(SsoMode::Google, &auth_server.uri(), None);
	config.subscription.active = false;
	let app = spawn_app(config).await;

	let response = app.get("/sso/request").await;
	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn sso_disabled_without_mode() {
	let app = spawn_app(test_config()).await;
	assert_eq!(
		app.get("/sso/request").await.status(),
		StatusCode::METHOD_NOT_ALLOWED
	);
	assert_eq!(
		app.get("/sso/callback?state=x&sig=y").await.status(),
		StatusCode::METHOD_NOT_ALLOWED
	);
}

// ============================================================================
// Callback phase
// ============================================================================

#[tokio::test]
async fn saml_callback_falls_back_to_default_org() {
	let auth_server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/request/saml"))
		.respond_with(ResponseTemplate::new(200).set_body_string("<form>saml</form>"))
		.mount(&auth_server)
		.await;
	let (app, default_org) = saml_app(&auth_server).await;

	let response = app.get("/sso/request").await;
	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(body_string(response).await, "<form>saml</form>");

	let (state, secret) = stored_state(&app).await;
	let query = format!("state={state}&username=alice&org=acme");
	let response = app.get(&signed_callback(&query, &secret)).await;
	assert_eq!(response.status(), StatusCode::FOUND);

	let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
	let view_path = location.strip_prefix(BASE_URL).unwrap().to_string();
	assert!(view_path.starts_with("/k/"));

	let user = app
		.directory()
		.get_user_by_name(&default_org, "alice")
		.await
		.unwrap()
		.unwrap();
	assert_eq!(user.auth_type, AuthType::Saml);

	let events = EventRepository::new(app.pool.clone())
		.list_after(0, 10)
		.await
		.unwrap();
	assert_eq!(events.len(), 3);

	// The minted link is one-time.
	assert_eq!(app.get(&view_path).await.status(), StatusCode::OK);
	assert_eq!(app.get(&view_path).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn saml_callback_uses_named_org_when_present() {
	let auth_server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/request/saml"))
		.respond_with(ResponseTemplate::new(200).set_body_string("<form/>"))
		.mount(&auth_server)
		.await;
	let (app, _) = saml_app(&auth_server).await;
	let acme = app.directory().create_org("acme", false).await.unwrap();

	app.get("/sso/request").await;
	let (state, secret) = stored_state(&app).await;
	let query = format!("state={state}&username=bob&email=bob%40acme.test&org=acme");
	let response = app.get(&signed_callback(&query, &secret)).await;
	assert_eq!(response.status(), StatusCode::FOUND);

	let user = app
		.directory()
		.get_user_by_name(&acme.id, "bob")
		.await
		.unwrap()
		.unwrap();
	assert_eq!(user.email.as_deref(), Some("bob@acme.test"));
}

#[tokio::test]
async fn state_redeemed_once_even_after_bad_signature() {
	let auth_server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/request/saml"))
		.respond_with(ResponseTemplate::new(200).set_body_string("<form/>"))
		.mount(&auth_server)
		.await;
	let (app, _) = saml_app(&auth_server).await;

	app.get("/sso/request").await;
	let (state, secret) = stored_state(&app).await;
	let query = format!("state={state}&username=alice");

	let forged = app.get(&signed_callback(&query, "wrong-secret")).await;
	assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

	let genuine = app.get(&signed_callback(&query, &secret)).await;
	assert_eq!(genuine.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn callback_without_username_is_bad_request() {
	let auth_server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(path("/v1/request/saml"))
		.respond_with(ResponseTemplate::new(200).set_body_string("<form/>"))
		.mount(&auth_server)
		.await;
	let (app, _) = saml_app(&auth_server).await;

	app.get("/sso/request").await;
	let (state, secret) = stored_state(&app).await;
	let query = format!("state={state}&org=acme");
	let response = app.get(&signed_callback(&query, &secret)).await;
	assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

// ============================================================================
// Direct second factor
// ============================================================================

/// Knows only `carol` and approves her.
struct KnowsCarol;

#[async_trait]
impl SecondFactor for KnowsCarol {
	async fn authenticate(
		&self,
		username: &str,
		_strong: bool,
		_remote_addr: Option<IpAddr>,
	) -> Result<SecondFactorOutcome, ProviderError> {
		if username == "carol" {
			Ok(SecondFactorOutcome::Approved { org_id: None })
		} else {
			Ok(SecondFactorOutcome::UnknownUser)
		}
	}
}

async fn duo_app() -> (TestApp, OrgId) {
	let app = spawn_app(test_config()).await;
	let org = app.directory().create_org("default-org", false).await.unwrap();

	let mut config = test_config();
	config.sso.mode = Some(SsoMode::Duo);
	config.sso.default_org_id = Some(org.id.to_string());
	config.paths.profiles_dir = app.profiles_dir.clone();

	let mut collaborators = Collaborators::from_config(&config);
	collaborators.second_factor = Arc::new(KnowsCarol);
	let state = create_app_state_with(app.pool.clone(), &config, collaborators).await;
	(app.with_state(state), org.id)
}

fn authenticate(username: &str) -> Request<Body> {
	Request::builder()
		.method(Method::POST)
		.uri("/sso/authenticate")
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(
			serde_json::json!({ "username": username }).to_string(),
		))
		.unwrap()
}

#[tokio::test]
async fn direct_login_tries_email_local_part() {
	let (app, org_id) = duo_app().await;

	let response = app.send(authenticate("carol@example.test")).await;
	assert_eq!(response.status(), StatusCode::OK);
	let url = body_string(response).await;
	assert!(url.starts_with(&format!("{BASE_URL}/k/")));

	let user = app
		.directory()
		.get_user_by_name(&org_id, "carol")
		.await
		.unwrap()
		.unwrap();
	assert_eq!(user.auth_type, AuthType::Duo);
}

#[tokio::test]
async fn direct_login_unknown_everywhere_is_unauthorized() {
	let (app, _) = duo_app().await;
	let response = app.send(authenticate("mallory@example.test")).await;
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn direct_login_requires_username() {
	let (app, _) = duo_app().await;
	let response = app.send(authenticate("  ")).await;
	assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn direct_login_refused_outside_duo_mode() {
	let app = spawn_app(test_config()).await;
	let response = app.send(authenticate("carol")).await;
	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
