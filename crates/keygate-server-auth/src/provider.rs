// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Contracts with the external identity provider and second factor.

use std::net::IpAddr;

use async_trait::async_trait;
use keygate_common_secret::SecretString;

use crate::error::ProviderError;
use crate::types::OrgId;

/// Where the browser goes after the request phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
	/// Redirect to the provider's authorization URL.
	Url(String),
	/// Serve the provider's auto-submitting form as-is.
	Html(String),
}

/// Parameters for a request-phase call.
#[derive(Debug, Clone)]
pub struct SsoRequest {
	pub callback_url: String,
	pub state: String,
	pub secret: SecretString,
}

/// Result of asking the provider whether an asserted identity is acceptable.
/// The payload is an optional hint for the owning organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification<T> {
	Accepted(Option<T>),
	Rejected,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
	async fn request_google(&self, request: &SsoRequest) -> Result<RedirectTarget, ProviderError>;

	async fn request_saml(&self, request: &SsoRequest) -> Result<RedirectTarget, ProviderError>;

	/// The hint, when present, is an organization id.
	async fn verify_google(&self, username: &str) -> Result<Verification<OrgId>, ProviderError>;

	/// The hint, when present, is an organization name.
	async fn verify_saml(
		&self,
		username: &str,
		email: Option<&str>,
		org_name: Option<&str>,
	) -> Result<Verification<String>, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondFactorOutcome {
	Approved { org_id: Option<OrgId> },
	Denied,
	/// The provider has never heard of this username.
	UnknownUser,
}

#[async_trait]
pub trait SecondFactor: Send + Sync {
	/// `strong` requests a push or passcode rather than a remembered device.
	async fn authenticate(
		&self,
		username: &str,
		strong: bool,
		remote_addr: Option<IpAddr>,
	) -> Result<SecondFactorOutcome, ProviderError>;
}

/// Used when no second factor is wired up. Denies everyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllSecondFactor;

#[async_trait]
impl SecondFactor for DenyAllSecondFactor {
	async fn authenticate(
		&self,
		username: &str,
		_strong: bool,
		_remote_addr: Option<IpAddr>,
	) -> Result<SecondFactorOutcome, ProviderError> {
		tracing::warn!(%username, "second factor required but no provider is configured");
		Ok(SecondFactorOutcome::Denied)
	}
}
