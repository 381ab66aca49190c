// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client for the hosted auth server that fronts Google and SAML sign-in.
//!
//! # Flow
//!
//! 1. **Request**: `POST {auth_server}/v1/request/google` or `/v1/request/saml`
//!    with the license, callback URL, state and callback secret. Google answers
//!    with `{"url": ...}` to redirect to; SAML answers with an auto-submitting
//!    HTML form.
//! 2. **Callback**: the auth server redirects the browser to
//!    `/sso/callback?state=..&username=..&sig=..`, signed with the secret from
//!    step 1. That is checked by the correlator, not here.
//! 3. **Verification**: local policy on the identity the callback carries.
//!    Google identities must belong to an allowed domain when a list is
//!    configured; SAML identities pass their organization name through.
//!
//! # Security Considerations
//!
//! - The license and callback secret are [`SecretString`]s; request bodies are
//!   never logged.
//! - A 401 from the auth server means the license is not entitled; it maps to
//!   [`ProviderError::Rejected`].
//! - Other failures log the status and body and surface as
//!   [`ProviderError::Status`]; the body is never returned to the browser.

use std::time::Duration;

use async_trait::async_trait;
use keygate_common_secret::SecretString;
use keygate_server_auth::{
	IdentityProvider, OrgId, ProviderError, RedirectTarget, SsoRequest, Verification,
};
use keygate_server_config::SsoConfig;
use serde::{Deserialize, Serialize};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SsoClientError {
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	#[error("HTTP request failed: {0}")]
	HttpRequest(#[from] reqwest::Error),

	#[error("auth server rejected the license")]
	Rejected,

	#[error("auth server returned status {0}")]
	Status(u16),

	#[error("failed to parse response: {0}")]
	ParseError(String),
}

impl From<SsoClientError> for ProviderError {
	fn from(err: SsoClientError) -> Self {
		match err {
			SsoClientError::Rejected => ProviderError::Rejected,
			SsoClientError::Status(status) => ProviderError::Status { status },
			SsoClientError::HttpRequest(e) => ProviderError::Transport(e.to_string()),
			SsoClientError::ParseError(msg) | SsoClientError::InvalidConfig(msg) => {
				ProviderError::InvalidResponse(msg)
			}
		}
	}
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct SamlSettings {
	pub sso_url: String,
	pub issuer_url: String,
	pub cert: String,
}

#[derive(Debug, Clone)]
pub struct AuthServerConfig {
	pub base_url: String,
	pub license: SecretString,
	pub saml: Option<SamlSettings>,
	/// Lowercase domains a Google identity may belong to. Empty allows any.
	pub allowed_domains: Vec<String>,
	pub timeout: Duration,
}

impl AuthServerConfig {
	/// Build from the `sso` config section.
	///
	/// # Errors
	///
	/// Returns [`SsoClientError::InvalidConfig`] if no auth server URL is set.
	pub fn from_sso_config(config: &SsoConfig) -> Result<Self, SsoClientError> {
		let base_url = config
			.auth_server_url
			.clone()
			.filter(|u| !u.is_empty())
			.ok_or_else(|| SsoClientError::InvalidConfig("auth_server_url is not set".to_string()))?;

		let saml = match (&config.saml_url, &config.saml_issuer_url, &config.saml_cert) {
			(Some(sso_url), Some(issuer_url), Some(cert)) => Some(SamlSettings {
				sso_url: sso_url.clone(),
				issuer_url: issuer_url.clone(),
				cert: cert.clone(),
			}),
			_ => None,
		};

		Ok(Self {
			base_url: base_url.trim_end_matches('/').to_string(),
			license: config
				.license
				.clone()
				.unwrap_or_else(|| SecretString::new(String::new())),
			saml,
			allowed_domains: config.allowed_domains.clone(),
			timeout: config.request_timeout(),
		})
	}

	fn domain_allowed(&self, username: &str) -> bool {
		if self.allowed_domains.is_empty() {
			return true;
		}
		let Some((_, domain)) = username.rsplit_once('@') else {
			return false;
		};
		let domain = domain.to_ascii_lowercase();
		self.allowed_domains.iter().any(|d| *d == domain)
	}
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct AuthRequestBody<'a> {
	license: &'a str,
	callback: &'a str,
	state: &'a str,
	secret: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	sso_url: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	issuer_url: Option<&'a str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	cert: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GoogleRequestResponse {
	url: String,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct AuthServerClient {
	config: AuthServerConfig,
	http_client: reqwest::Client,
}

impl AuthServerClient {
	/// # Errors
	///
	/// Returns [`SsoClientError::HttpRequest`] if the HTTP client cannot be built.
	#[tracing::instrument(skip_all, name = "AuthServerClient::new")]
	pub fn new(config: AuthServerConfig) -> Result<Self, SsoClientError> {
		let http_client = reqwest::Client::builder()
			.user_agent(concat!("keygate/", env!("CARGO_PKG_VERSION")))
			.timeout(config.timeout)
			.build()?;

		Ok(Self {
			config,
			http_client,
		})
	}

	pub fn config(&self) -> &AuthServerConfig {
		&self.config
	}

	/// POST a request-phase body and return the successful response.
	async fn post_request(
		&self,
		kind: &'static str,
		body: &AuthRequestBody<'_>,
	) -> Result<reqwest::Response, SsoClientError> {
		let url = format!("{}/v1/request/{kind}", self.config.base_url);
		tracing::debug!(%url, "requesting sso handshake");

		let response = self.http_client.post(&url).json(body).send().await?;
		let status = response.status();

		if status == reqwest::StatusCode::UNAUTHORIZED {
			return Err(SsoClientError::Rejected);
		}
		if status != reqwest::StatusCode::OK {
			let content = response.text().await.unwrap_or_default();
			tracing::error!(
				status_code = status.as_u16(),
				%content,
				kind,
				"auth server error"
			);
			return Err(SsoClientError::Status(status.as_u16()));
		}

		Ok(response)
	}

	#[tracing::instrument(skip(self, request), name = "AuthServerClient::request_google")]
	pub async fn begin_google(&self, request: &SsoRequest) -> Result<String, SsoClientError> {
		let body = AuthRequestBody {
			license: self.config.license.expose(),
			callback: &request.callback_url,
			state: &request.state,
			secret: request.secret.expose(),
			sso_url: None,
			issuer_url: None,
			cert: None,
		};

		let response = self.post_request("google", &body).await?;
		let data: GoogleRequestResponse = response
			.json()
			.await
			.map_err(|e| SsoClientError::ParseError(format!("failed to parse google response: {e}")))?;
		Ok(data.url)
	}

	#[tracing::instrument(skip(self, request), name = "AuthServerClient::request_saml")]
	pub async fn begin_saml(&self, request: &SsoRequest) -> Result<String, SsoClientError> {
		let saml = self
			.config
			.saml
			.as_ref()
			.ok_or_else(|| SsoClientError::InvalidConfig("saml settings are not configured".to_string()))?;

		let body = AuthRequestBody {
			license: self.config.license.expose(),
			callback: &request.callback_url,
			state: &request.state,
			secret: request.secret.expose(),
			sso_url: Some(saml.sso_url.as_str()),
			issuer_url: Some(saml.issuer_url.as_str()),
			cert: Some(saml.cert.as_str()),
		};

		let response = self.post_request("saml", &body).await?;
		Ok(response.text().await?)
	}
}

#[async_trait]
impl IdentityProvider for AuthServerClient {
	async fn request_google(&self, request: &SsoRequest) -> Result<RedirectTarget, ProviderError> {
		Ok(RedirectTarget::Url(self.begin_google(request).await?))
	}

	async fn request_saml(&self, request: &SsoRequest) -> Result<RedirectTarget, ProviderError> {
		Ok(RedirectTarget::Html(self.begin_saml(request).await?))
	}

	async fn verify_google(&self, username: &str) -> Result<Verification<OrgId>, ProviderError> {
		if self.config.domain_allowed(username) {
			Ok(Verification::Accepted(None))
		} else {
			tracing::warn!("google identity outside allowed domains");
			Ok(Verification::Rejected)
		}
	}

	async fn verify_saml(
		&self,
		_username: &str,
		_email: Option<&str>,
		org_name: Option<&str>,
	) -> Result<Verification<String>, ProviderError> {
		Ok(Verification::Accepted(org_name.map(str::to_string)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use wiremock::matchers::{body_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn config(base_url: &str) -> AuthServerConfig {
		AuthServerConfig {
			base_url: base_url.to_string(),
			license: SecretString::new("lic-123".to_string()),
			saml: Some(SamlSettings {
				sso_url: "https://idp.example/sso".to_string(),
				issuer_url: "https://idp.example/issuer".to_string(),
				cert: "CERT".to_string(),
			}),
			allowed_domains: Vec::new(),
			timeout: Duration::from_secs(5),
		}
	}

	fn sso_request() -> SsoRequest {
		SsoRequest {
			callback_url: "https://vpn.example/sso/callback".to_string(),
			state: "state-1".to_string(),
			secret: SecretString::new("secret-1".to_string()),
		}
	}

	mod request_phase {
		use super::*;

		#[tokio::test]
		async fn google_returns_redirect_url() {
			let server = MockServer::start().await;
			Mock::given(method("POST"))
				.and(path("/v1/request/google"))
				.and(body_json(json!({
					"license": "lic-123",
					"callback": "https://vpn.example/sso/callback",
					"state": "state-1",
					"secret": "secret-1",
				})))
				.respond_with(
					ResponseTemplate::new(200)
						.set_body_json(json!({ "url": "https://accounts.example/auth" })),
				)
				.mount(&server)
				.await;

			let client = AuthServerClient::new(config(&server.uri())).unwrap();
			let target = client.request_google(&sso_request()).await.unwrap();
			assert_eq!(
				target,
				RedirectTarget::Url("https://accounts.example/auth".to_string())
			);
		}

		#[tokio::test]
		async fn saml_sends_idp_settings_and_returns_html() {
			let server = MockServer::start().await;
			Mock::given(method("POST"))
				.and(path("/v1/request/saml"))
				.and(body_json(json!({
					"license": "lic-123",
					"callback": "https://vpn.example/sso/callback",
					"state": "state-1",
					"secret": "secret-1",
					"sso_url": "https://idp.example/sso",
					"issuer_url": "https://idp.example/issuer",
					"cert": "CERT",
				})))
				.respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
				.mount(&server)
				.await;

			let client = AuthServerClient::new(config(&server.uri())).unwrap();
			let target = client.request_saml(&sso_request()).await.unwrap();
			assert_eq!(target, RedirectTarget::Html("<form></form>".to_string()));
		}

		#[tokio::test]
		async fn unauthorized_maps_to_rejected() {
			let server = MockServer::start().await;
			Mock::given(method("POST"))
				.and(path("/v1/request/google"))
				.respond_with(ResponseTemplate::new(401))
				.mount(&server)
				.await;

			let client = AuthServerClient::new(config(&server.uri())).unwrap();
			let err = client.request_google(&sso_request()).await.unwrap_err();
			assert!(matches!(err, ProviderError::Rejected));
		}

		#[tokio::test]
		async fn server_error_maps_to_status() {
			let server = MockServer::start().await;
			Mock::given(method("POST"))
				.and(path("/v1/request/saml"))
				.respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
				.mount(&server)
				.await;

			let client = AuthServerClient::new(config(&server.uri())).unwrap();
			let err = client.request_saml(&sso_request()).await.unwrap_err();
			assert!(matches!(err, ProviderError::Status { status: 502 }));
		}

		#[tokio::test]
		async fn malformed_google_body_is_invalid_response() {
			let server = MockServer::start().await;
			Mock::given(method("POST"))
				.and(path("/v1/request/google"))
				.respond_with(ResponseTemplate::new(200).set_body_string("not json"))
				.mount(&server)
				.await;

			let client = AuthServerClient::new(config(&server.uri())).unwrap();
			let err = client.request_google(&sso_request()).await.unwrap_err();
			assert!(matches!(err, ProviderError::InvalidResponse(_)));
		}

		#[tokio::test]
		async fn unreachable_server_is_transport_error() {
			let client = AuthServerClient::new(config("http://127.0.0.1:9")).unwrap();
			let err = client.request_google(&sso_request()).await.unwrap_err();
			assert!(matches!(err, ProviderError::Transport(_)));
		}

		#[tokio::test]
		async fn saml_without_settings_fails_before_sending() {
			let server = MockServer::start().await;
			let mut cfg = config(&server.uri());
			cfg.saml = None;
			let client = AuthServerClient::new(cfg).unwrap();
			assert!(client.request_saml(&sso_request()).await.is_err());
			assert!(server.received_requests().await.unwrap_or_default().is_empty());
		}
	}

	mod verification {
		use super::*;

		#[tokio::test]
		async fn google_any_domain_when_unrestricted() {
			let client = AuthServerClient::new(config("http://unused")).unwrap();
			assert_eq!(
				client.verify_google("bob@anywhere.test").await.unwrap(),
				Verification::Accepted(None)
			);
		}

		#[tokio::test]
		async fn google_domain_restriction() {
			let mut cfg = config("http://unused");
			cfg.allowed_domains = vec!["example.com".to_string()];
			let client = AuthServerClient::new(cfg).unwrap();

			assert_eq!(
				client.verify_google("bob@Example.COM").await.unwrap(),
				Verification::Accepted(None)
			);
			assert_eq!(
				client.verify_google("bob@evil.test").await.unwrap(),
				Verification::Rejected
			);
			assert_eq!(
				client.verify_google("no-domain").await.unwrap(),
				Verification::Rejected
			);
		}

		#[tokio::test]
		async fn saml_passes_org_name_through() {
			let client = AuthServerClient::new(config("http://unused")).unwrap();
			assert_eq!(
				client
					.verify_saml("alice", None, Some("acme"))
					.await
					.unwrap(),
				Verification::Accepted(Some("acme".to_string()))
			);
			assert_eq!(
				client.verify_saml("alice", None, None).await.unwrap(),
				Verification::Accepted(None)
			);
		}
	}

	mod config_loading {
		use super::*;

		#[test]
		fn requires_auth_server_url() {
			let err = AuthServerConfig::from_sso_config(&SsoConfig::default()).unwrap_err();
			assert!(matches!(err, SsoClientError::InvalidConfig(_)));
		}

		#[test]
		fn saml_settings_need_all_three_fields() {
			let sso = SsoConfig {
				auth_server_url: Some("https://auth.example/".to_string()),
				saml_url: Some("https://idp.example/sso".to_string()),
				..SsoConfig::default()
			};
			let cfg = AuthServerConfig::from_sso_config(&sso).unwrap();
			assert!(cfg.saml.is_none());
			assert_eq!(cfg.base_url, "https://auth.example");
		}
	}

	mod proptests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn allowed_domain_match_ignores_case(local in "[a-z]{1,8}", upper in prop::bool::ANY) {
				let mut cfg = config("http://unused");
				cfg.allowed_domains = vec!["corp.example".to_string()];
				let domain = if upper { "CORP.EXAMPLE" } else { "corp.example" };
				let email = format!("{local}@{domain}");
				prop_assert!(cfg.domain_allowed(&email));
				let other = format!("{local}@corp.example.evil");
				prop_assert!(!cfg.domain_allowed(&other));
			}
		}
	}
}
