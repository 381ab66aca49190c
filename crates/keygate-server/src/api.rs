// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router construction.

use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::{get, post};
use axum::Router;
use keygate_common_secret::SecretString;
use keygate_server_auth::{
	DenyAllSecondFactor, IdentityProvider, LinkResolver, OrgId, ProviderError, RedirectTarget,
	SecondFactor, SsoCorrelator, SsoDependencies, SsoRequest, SsoSettings, SyncAuthenticator,
	TimingGuard, Verification,
};
use keygate_server_auth_sso::{AuthServerClient, AuthServerConfig};
use keygate_server_config::ServerConfig;
use keygate_server_db::{
	DirectoryRepository, EventRepository, KeyLinkRepository, NonceRepository, SsoStateRepository,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::profiles::{FsProfileStore, ProfileStore};
use crate::routes;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
	pub links: Arc<LinkResolver>,
	pub sync: Arc<SyncAuthenticator>,
	pub sso: Arc<SsoCorrelator>,
	pub directory: Arc<DirectoryRepository>,
	pub profiles: Arc<dyn ProfileStore>,
	pub guard: TimingGuard,
	pub admin_token: Option<SecretString>,
	/// Public URL root without a trailing slash.
	pub base_url: String,
	pub subscription_active: bool,
}

/// Outside services the server talks to. Swapped out in tests.
pub struct Collaborators {
	pub provider: Arc<dyn IdentityProvider>,
	pub second_factor: Arc<dyn SecondFactor>,
	pub profiles: Arc<dyn ProfileStore>,
}

impl Collaborators {
	/// Auth server client when one is configured, deny-all second factor and
	/// profiles from `paths.profiles_dir`.
	pub fn from_config(config: &ServerConfig) -> Self {
		let provider: Arc<dyn IdentityProvider> =
			match AuthServerConfig::from_sso_config(&config.sso).and_then(AuthServerClient::new) {
				Ok(client) => {
					info!(base_url = %client.config().base_url, "auth server client configured");
					Arc::new(client)
				}
				Err(e) => {
					if config.sso.mode.is_some() {
						warn!(error = %e, "sso enabled but auth server client unavailable");
					}
					Arc::new(UnavailableProvider)
				}
			};

		Self {
			provider,
			second_factor: Arc::new(DenyAllSecondFactor),
			profiles: Arc::new(FsProfileStore::new(config.paths.profiles_dir.clone())),
		}
	}
}

/// Stands in for the auth server when none is configured.
struct UnavailableProvider;

#[async_trait]
impl IdentityProvider for UnavailableProvider {
	async fn request_google(&self, _request: &SsoRequest) -> Result<RedirectTarget, ProviderError> {
		Err(ProviderError::Rejected)
	}

	async fn request_saml(&self, _request: &SsoRequest) -> Result<RedirectTarget, ProviderError> {
		Err(ProviderError::Rejected)
	}

	async fn verify_google(&self, _username: &str) -> Result<Verification<OrgId>, ProviderError> {
		Ok(Verification::Rejected)
	}

	async fn verify_saml(
		&self,
		_username: &str,
		_email: Option<&str>,
		_org_name: Option<&str>,
	) -> Result<Verification<String>, ProviderError> {
		Ok(Verification::Rejected)
	}
}

/// Build state with collaborators derived from `config`.
pub async fn create_app_state(pool: SqlitePool, config: &ServerConfig) -> AppState {
	create_app_state_with(pool, config, Collaborators::from_config(config)).await
}

pub async fn create_app_state_with(
	pool: SqlitePool,
	config: &ServerConfig,
	collaborators: Collaborators,
) -> AppState {
	let guard = TimingGuard::from_config(&config.auth);
	let directory = Arc::new(DirectoryRepository::new(pool.clone()));
	let events = Arc::new(EventRepository::new(pool.clone()));

	let links = Arc::new(LinkResolver::new(
		Arc::new(KeyLinkRepository::new(pool.clone())),
		guard,
		config.auth.short_id_length,
	));

	let sync = Arc::new(SyncAuthenticator::new(
		&config.auth,
		Arc::new(NonceRepository::new(pool.clone())),
	));

	let sso = Arc::new(SsoCorrelator::new(
		SsoSettings::from_config(&config.sso, &config.subscription),
		SsoDependencies {
			states: Arc::new(SsoStateRepository::new(pool)),
			provider: collaborators.provider,
			second_factor: collaborators.second_factor,
			directory: directory.clone(),
			events,
			links: links.clone(),
		},
	));

	AppState {
		links,
		sync,
		sso,
		directory,
		profiles: collaborators.profiles,
		guard,
		admin_token: config.auth.admin_token.clone(),
		base_url: config.http.base_url.clone(),
		subscription_active: config.subscription.active,
	}
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(routes::health::health_check))
		// Routes sharing a prefix share parameter names; handlers extract by position.
		.route("/key/{first}", get(routes::keys::link_archive))
		.route("/key/{first}/{second}", get(routes::keys::two_segment_key))
		.route(
			"/key/{first}/{second}/{third}/{fourth}",
			get(routes::sync::sync_profile),
		)
		.route("/key_onc/{first}", get(routes::keys::link_onc_archive))
		.route("/key_onc/{first}/{second}", get(routes::keys::admin_onc_archive))
		.route(
			"/k/{short_id}",
			get(routes::keys::landing_page).delete(routes::keys::revoke_link),
		)
		.route("/ku/{short_id}", get(routes::keys::profile_uris))
		.route("/sso/request", get(routes::sso::sso_request))
		.route("/sso/callback", get(routes::sso::sso_callback))
		.route("/sso/authenticate", post(routes::sso::sso_authenticate))
		.with_state(state)
}
