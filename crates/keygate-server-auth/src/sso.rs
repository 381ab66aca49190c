// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSO request/callback correlation and the direct second-factor login.
//!
//! ```text
//! browser            keygate                   auth server / IdP
//!    │ GET /sso/request │                             │
//!    │─────────────────>│ state, secret (64 chars)    │
//!    │                  │ POST /v1/request/{google,saml}
//!    │                  │────────────────────────────>│
//!    │                  │ store SsoState              │
//!    │ redirect / form  │                             │
//!    │<─────────────────│                             │
//!    │ ... provider login ...                         │
//!    │ GET /sso/callback?state=..&username=..&sig=..  │
//!    │─────────────────>│ take SsoState (atomic)      │
//!    │                  │ check sig with secret       │
//!    │                  │ verify identity, 2nd factor │
//!    │                  │ provision user, mint link   │
//!    │ redirect /k/{short_id}                         │
//!    │<─────────────────│                             │
//! ```

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use keygate_common_secret::SecretString;
use keygate_server_config::{SsoConfig, SsoMode, SubscriptionConfig};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{AuthError, ProviderError};
use crate::links::LinkResolver;
use crate::provider::{
	IdentityProvider, RedirectTarget, SecondFactor, SecondFactorOutcome, SsoRequest, Verification,
};
use crate::provision::UserProvisioner;
use crate::signing::{sign_callback, signatures_match};
use crate::store::{Directory, EventPublisher, SsoStateStore};
use crate::token::{random_token, SSO_TOKEN_LEN};
use crate::types::{AuthType, KeyLink, OrgId, Organization, SsoProvider, SsoState, User};

/// Deployment-level SSO switches.
#[derive(Debug, Clone, Default)]
pub struct SsoSettings {
	pub mode: Option<SsoMode>,
	pub default_org_id: Option<OrgId>,
	pub subscription_active: bool,
}

impl SsoSettings {
	pub fn from_config(sso: &SsoConfig, subscription: &SubscriptionConfig) -> Self {
		let default_org_id = sso
			.default_org_id
			.as_deref()
			.and_then(|raw| match raw.parse::<OrgId>() {
				Ok(id) => Some(id),
				Err(e) => {
					warn!(value = %raw, error = %e, "ignoring malformed sso default org id");
					None
				}
			});
		Self {
			mode: sso.mode,
			default_org_id,
			subscription_active: subscription.active,
		}
	}
}

/// Collaborators the correlator drives.
pub struct SsoDependencies {
	pub states: Arc<dyn SsoStateStore>,
	pub provider: Arc<dyn IdentityProvider>,
	pub second_factor: Arc<dyn SecondFactor>,
	pub directory: Arc<dyn Directory>,
	pub events: Arc<dyn EventPublisher>,
	pub links: Arc<LinkResolver>,
}

/// A parsed `/sso/callback` query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsoCallback {
	pub state: Option<String>,
	pub signature: Option<String>,
	/// Raw query up to, not including, the first `&sig=`.
	pub signed_query: String,
	params: Vec<(String, String)>,
}

impl SsoCallback {
	pub fn from_raw_query(raw: &str) -> Self {
		let signed_query = match raw.find("&sig=") {
			Some(idx) => &raw[..idx],
			None => raw,
		};

		let mut state = None;
		let mut signature = None;
		for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
			match key.as_ref() {
				"state" if state.is_none() => state = Some(value.into_owned()),
				"sig" if signature.is_none() => signature = Some(value.into_owned()),
				_ => {}
			}
		}

		Self {
			state: state.filter(|s| !s.is_empty()),
			signature,
			signed_query: signed_query.to_string(),
			params: url::form_urlencoded::parse(signed_query.as_bytes())
				.into_owned()
				.collect(),
		}
	}

	/// First non-empty value of a signed parameter.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params
			.iter()
			.find(|(k, v)| k == name && !v.is_empty())
			.map(|(_, v)| v.as_str())
	}
}

/// The user a successful SSO login resolved to, with its fresh one-time link.
#[derive(Debug, Clone)]
pub struct ProvisionedUser {
	pub org: Organization,
	pub user: User,
	pub link: KeyLink,
}

pub struct SsoCorrelator {
	settings: SsoSettings,
	states: Arc<dyn SsoStateStore>,
	provider: Arc<dyn IdentityProvider>,
	second_factor: Arc<dyn SecondFactor>,
	directory: Arc<dyn Directory>,
	provisioner: UserProvisioner,
	links: Arc<LinkResolver>,
}

fn upstream(context: &'static str, err: ProviderError) -> AuthError {
	error!(error = %err, context, "identity provider call failed");
	AuthError::Upstream(format!("{context}: {err}"))
}

impl SsoCorrelator {
	pub fn new(settings: SsoSettings, deps: SsoDependencies) -> Self {
		Self {
			settings,
			provisioner: UserProvisioner::new(Arc::clone(&deps.directory), deps.events),
			states: deps.states,
			provider: deps.provider,
			second_factor: deps.second_factor,
			directory: deps.directory,
			links: deps.links,
		}
	}

	pub fn settings(&self) -> &SsoSettings {
		&self.settings
	}

	fn redirect_mode(&self) -> Result<SsoMode, AuthError> {
		match self.settings.mode {
			Some(mode) if mode.uses_redirect() => Ok(mode),
			_ => Err(AuthError::FeatureDisabled),
		}
	}

	/// Start a Google or SAML round trip. The state is persisted only after
	/// the provider accepted the request.
	#[instrument(skip(self))]
	pub async fn begin(&self, callback_url: &str) -> Result<RedirectTarget, AuthError> {
		let mode = self.redirect_mode()?;
		if !self.settings.subscription_active {
			debug!("sso request refused: subscription inactive");
			return Err(AuthError::FeatureDisabled);
		}

		let request = SsoRequest {
			callback_url: callback_url.to_string(),
			state: random_token(SSO_TOKEN_LEN),
			secret: SecretString::new(random_token(SSO_TOKEN_LEN)),
		};

		let (provider, result) = if mode.is_google() {
			(
				SsoProvider::Google,
				self.provider.request_google(&request).await,
			)
		} else {
			(SsoProvider::Saml, self.provider.request_saml(&request).await)
		};

		let target = match result {
			Ok(target) => target,
			Err(ProviderError::Rejected) => {
				info!(provider = provider.as_str(), "auth server rejected sso request");
				return Err(AuthError::FeatureDisabled);
			}
			Err(e) => return Err(upstream("sso request", e)),
		};

		self.states
			.insert(&SsoState {
				state: request.state,
				provider,
				secret: request.secret,
				created_at: Utc::now(),
			})
			.await?;

		Ok(target)
	}

	/// Finish a round trip started by [`begin`](Self::begin).
	///
	/// The state record is deleted before the signature is checked, so a
	/// captured state cannot be tried twice.
	#[instrument(skip(self, callback))]
	pub async fn complete(
		&self,
		callback: &SsoCallback,
		remote_addr: Option<IpAddr>,
	) -> Result<ProvisionedUser, AuthError> {
		let mode = self.redirect_mode()?;
		let guard = self.links.guard();

		let Some(state) = callback.state.as_deref() else {
			guard.delay_if_absent(false).await;
			return Err(AuthError::NotFound);
		};
		let Some(record) = self.states.take(state).await? else {
			debug!("sso callback for unknown or spent state");
			guard.delay_if_absent(false).await;
			return Err(AuthError::NotFound);
		};

		let result = self.finish_callback(mode, record, callback, remote_addr).await;
		if result.is_err() {
			guard.delay_if_absent(false).await;
		}
		result
	}

	/// Checks on a redeemed state. Any failure here answers no faster than
	/// an unknown state.
	async fn finish_callback(
		&self,
		mode: SsoMode,
		record: SsoState,
		callback: &SsoCallback,
		remote_addr: Option<IpAddr>,
	) -> Result<ProvisionedUser, AuthError> {
		let expected = sign_callback(
			record.secret.expose().as_bytes(),
			callback.signed_query.as_bytes(),
		)
		.map_err(|_| AuthError::Unauthorized)?;
		let provided = callback.signature.as_deref().unwrap_or_default();
		if !signatures_match(provided, &expected) {
			warn!("sso callback signature mismatch");
			return Err(AuthError::Unauthorized);
		}

		let (username, email, org_hint) = match record.provider {
			SsoProvider::Saml => self.verify_saml(callback).await?,
			SsoProvider::Google => self.verify_google(callback).await?,
		};

		if mode.requires_second_factor() {
			match self
				.second_factor
				.authenticate(&username, false, remote_addr)
				.await
				.map_err(|e| upstream("second factor", e))?
			{
				SecondFactorOutcome::Approved { .. } => {}
				SecondFactorOutcome::Denied | SecondFactorOutcome::UnknownUser => {
					warn!("sso second factor denied");
					return Err(AuthError::Unauthorized);
				}
			}
		}

		let org = match org_hint {
			Some(org) => org,
			None => self.org_or_default(None).await?,
		};

		self.provision(org, &username, email.as_deref(), AuthType::from(mode))
			.await
	}

	/// Direct login for deployments that only run a second factor.
	///
	/// Tries the full username and, for an email address, its local part. An
	/// `UnknownUser` answer moves on to the next candidate.
	#[instrument(skip(self))]
	pub async fn authenticate_second_factor(
		&self,
		username: &str,
		remote_addr: Option<IpAddr>,
	) -> Result<ProvisionedUser, AuthError> {
		if self.settings.mode != Some(SsoMode::Duo) {
			return Err(AuthError::FeatureDisabled);
		}
		let username = username.trim();
		if username.is_empty() {
			return Err(AuthError::BadRequest("username"));
		}

		let mut candidates = vec![username];
		let mut email = None;
		if let Some((local, _)) = username.split_once('@') {
			email = Some(username);
			if !local.is_empty() {
				candidates.push(local);
			}
		}

		let mut approved = None;
		for candidate in candidates {
			match self
				.second_factor
				.authenticate(candidate, true, remote_addr)
				.await
				.map_err(|e| upstream("second factor", e))?
			{
				SecondFactorOutcome::Approved { org_id } => {
					approved = Some((candidate, org_id));
					break;
				}
				SecondFactorOutcome::Denied => break,
				SecondFactorOutcome::UnknownUser => continue,
			}
		}

		let Some((name, org_id)) = approved else {
			warn!("second factor login denied");
			return Err(AuthError::Unauthorized);
		};

		let org = self.org_or_default(org_id).await?;
		self.provision(org, name, email, AuthType::Duo).await
	}

	/// Returns the username, email and, when the provider named one that
	/// exists, the organization.
	async fn verify_saml(
		&self,
		callback: &SsoCallback,
	) -> Result<(String, Option<String>, Option<Organization>), AuthError> {
		let username = callback
			.param("username")
			.ok_or(AuthError::BadRequest("username"))?;
		let email = callback.param("email");
		let org_name = callback.param("org");

		let hint = match self
			.provider
			.verify_saml(username, email, org_name)
			.await
			.map_err(|e| upstream("saml verification", e))?
		{
			Verification::Accepted(hint) => hint,
			Verification::Rejected => {
				warn!("saml identity rejected by provider");
				return Err(AuthError::Unauthorized);
			}
		};

		let org = match hint {
			Some(name) => self.directory.org_by_name(&name).await?,
			None => None,
		};

		Ok((username.to_string(), email.map(str::to_string), org))
	}

	async fn verify_google(
		&self,
		callback: &SsoCallback,
	) -> Result<(String, Option<String>, Option<Organization>), AuthError> {
		let username = callback
			.param("username")
			.ok_or(AuthError::BadRequest("username"))?;

		let hint = match self
			.provider
			.verify_google(username)
			.await
			.map_err(|e| upstream("google verification", e))?
		{
			Verification::Accepted(hint) => hint,
			Verification::Rejected => {
				warn!("google identity rejected by provider");
				return Err(AuthError::Unauthorized);
			}
		};

		let org = match hint {
			Some(id) => Some(self.org_or_default(Some(id)).await?),
			None => None,
		};

		Ok((username.to_string(), Some(username.to_string()), org))
	}

	/// The organization with `id`, else the configured default. Neither
	/// existing disables the flow.
	async fn org_or_default(&self, id: Option<OrgId>) -> Result<Organization, AuthError> {
		let Some(id) = id.or(self.settings.default_org_id) else {
			warn!("no organization resolved for sso login and no default configured");
			return Err(AuthError::FeatureDisabled);
		};
		match self.directory.org_by_id(&id).await? {
			Some(org) => Ok(org),
			None => {
				warn!(org_id = %id, "sso organization does not exist");
				Err(AuthError::FeatureDisabled)
			}
		}
	}

	async fn provision(
		&self,
		org: Organization,
		username: &str,
		email: Option<&str>,
		auth_type: AuthType,
	) -> Result<ProvisionedUser, AuthError> {
		let user = self
			.provisioner
			.ensure_user(&org, username, email, auth_type)
			.await?;
		let link = self.links.issue(org.id, user.id, true).await?;
		Ok(ProvisionedUser { org, user, link })
	}
}
