// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single sign-on configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use keygate_common_secret::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Which federated flow the deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SsoMode {
	Google,
	GoogleDuo,
	Saml,
	SamlDuo,
	Duo,
}

impl SsoMode {
	/// Modes whose first factor is a Google assertion.
	pub fn is_google(self) -> bool {
		matches!(self, Self::Google | Self::GoogleDuo)
	}

	/// Modes whose first factor is a SAML assertion.
	pub fn is_saml(self) -> bool {
		matches!(self, Self::Saml | Self::SamlDuo)
	}

	/// Modes that go through the auth server request/callback round trip.
	pub fn uses_redirect(self) -> bool {
		self.is_google() || self.is_saml()
	}

	pub fn requires_second_factor(self) -> bool {
		matches!(self, Self::GoogleDuo | Self::SamlDuo | Self::Duo)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Google => "google",
			Self::GoogleDuo => "google_duo",
			Self::Saml => "saml",
			Self::SamlDuo => "saml_duo",
			Self::Duo => "duo",
		}
	}
}

impl fmt::Display for SsoMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SsoMode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"google" => Ok(Self::Google),
			"google_duo" => Ok(Self::GoogleDuo),
			"saml" => Ok(Self::Saml),
			"saml_duo" => Ok(Self::SamlDuo),
			"duo" => Ok(Self::Duo),
			other => Err(ConfigError::InvalidValue {
				key: "sso.mode".to_string(),
				message: format!("unknown sso mode '{other}'"),
			}),
		}
	}
}

#[derive(Debug, Clone)]
pub struct SsoConfig {
	/// `None` disables every SSO endpoint.
	pub mode: Option<SsoMode>,
	pub default_org_id: Option<String>,
	pub auth_server_url: Option<String>,
	pub license: Option<SecretString>,
	pub saml_url: Option<String>,
	pub saml_issuer_url: Option<String>,
	pub saml_cert: Option<String>,
	/// Email domains accepted for Google sign in. Empty accepts any domain.
	pub allowed_domains: Vec<String>,
	pub request_timeout_secs: u64,
}

impl SsoConfig {
	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}
}

impl Default for SsoConfig {
	fn default() -> Self {
		SsoConfigLayer::default().finalize(None)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SsoConfigLayer {
	#[serde(default)]
	pub mode: Option<SsoMode>,
	#[serde(default)]
	pub default_org_id: Option<String>,
	#[serde(default)]
	pub auth_server_url: Option<String>,
	#[serde(default)]
	pub saml_url: Option<String>,
	#[serde(default)]
	pub saml_issuer_url: Option<String>,
	#[serde(default)]
	pub saml_cert: Option<String>,
	#[serde(default)]
	pub allowed_domains: Option<Vec<String>>,
	#[serde(default)]
	pub request_timeout_secs: Option<u64>,
}

impl SsoConfigLayer {
	pub fn merge(&mut self, other: SsoConfigLayer) {
		if other.mode.is_some() {
			self.mode = other.mode;
		}
		if other.default_org_id.is_some() {
			self.default_org_id = other.default_org_id;
		}
		if other.auth_server_url.is_some() {
			self.auth_server_url = other.auth_server_url;
		}
		if other.saml_url.is_some() {
			self.saml_url = other.saml_url;
		}
		if other.saml_issuer_url.is_some() {
			self.saml_issuer_url = other.saml_issuer_url;
		}
		if other.saml_cert.is_some() {
			self.saml_cert = other.saml_cert;
		}
		if other.allowed_domains.is_some() {
			self.allowed_domains = other.allowed_domains;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
	}

	pub fn finalize(self, license: Option<SecretString>) -> SsoConfig {
		SsoConfig {
			mode: self.mode,
			default_org_id: self.default_org_id,
			auth_server_url: self
				.auth_server_url
				.map(|url| url.trim_end_matches('/').to_string()),
			license,
			saml_url: self.saml_url,
			saml_issuer_url: self.saml_issuer_url,
			saml_cert: self.saml_cert,
			allowed_domains: self
				.allowed_domains
				.unwrap_or_default()
				.into_iter()
				.map(|d| d.trim().trim_start_matches('@').to_lowercase())
				.filter(|d| !d.is_empty())
				.collect(),
			request_timeout_secs: self.request_timeout_secs.unwrap_or(10),
		}
	}
}
