// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core records shared by the link, sync and SSO flows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use keygate_common_secret::SecretString;
use keygate_server_config::SsoMode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ID Types
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = uuid::Error;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Uuid::parse_str(s).map(Self)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(OrgId, "Unique identifier for an organization.");
define_id_type!(UserId, "Unique identifier for a user.");
define_id_type!(ServerId, "Unique identifier for a VPN server.");
define_id_type!(LinkId, "Unique identifier for a key link record.");

// =============================================================================
// Auth Type
// =============================================================================

/// How a user last authenticated. Updated when an SSO login arrives through a
/// different flow than the one the user was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
	Local,
	Google,
	GoogleDuo,
	Saml,
	SamlDuo,
	Duo,
}

impl AuthType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::Google => "google",
			Self::GoogleDuo => "google_duo",
			Self::Saml => "saml",
			Self::SamlDuo => "saml_duo",
			Self::Duo => "duo",
		}
	}
}

impl fmt::Display for AuthType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for AuthType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"local" => Ok(Self::Local),
			"google" => Ok(Self::Google),
			"google_duo" => Ok(Self::GoogleDuo),
			"saml" => Ok(Self::Saml),
			"saml_duo" => Ok(Self::SamlDuo),
			"duo" => Ok(Self::Duo),
			other => Err(format!("unknown auth type: {other}")),
		}
	}
}

impl From<SsoMode> for AuthType {
	fn from(mode: SsoMode) -> Self {
		match mode {
			SsoMode::Google => Self::Google,
			SsoMode::GoogleDuo => Self::GoogleDuo,
			SsoMode::Saml => Self::Saml,
			SsoMode::SamlDuo => Self::SamlDuo,
			SsoMode::Duo => Self::Duo,
		}
	}
}

// =============================================================================
// Key Links
// =============================================================================

/// Consumption state of a one-time link. Reusable links carry `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneTime {
	Unused,
	Used,
}

impl OneTime {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Unused => "unused",
			Self::Used => "used",
		}
	}
}

impl FromStr for OneTime {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"unused" => Ok(Self::Unused),
			"used" => Ok(Self::Used),
			other => Err(format!("unknown one_time state: {other}")),
		}
	}
}

/// A routable pair of tokens granting access to one user's key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLink {
	pub id: LinkId,
	/// Token used by the landing page and the profile URI endpoint.
	pub short_id: String,
	/// Token used by the archive and single-profile downloads.
	pub key_id: String,
	pub org_id: OrgId,
	pub user_id: UserId,
	pub one_time: Option<OneTime>,
	pub created_at: DateTime<Utc>,
}

impl KeyLink {
	pub fn is_one_time(&self) -> bool {
		self.one_time.is_some()
	}

	pub fn descriptor(&self) -> KeyLinkDescriptor {
		KeyLinkDescriptor {
			id: self.id,
			key_url: format!("/key/{}.tar", self.key_id),
			key_zip_url: format!("/key/{}.zip", self.key_id),
			key_onc_url: format!("/key_onc/{}.zip", self.key_id),
			view_url: format!("/k/{}", self.short_id),
			uri_url: format!("/ku/{}", self.short_id),
		}
	}
}

/// Relative URLs handed back when a link is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLinkDescriptor {
	pub id: LinkId,
	pub key_url: String,
	pub key_zip_url: String,
	pub key_onc_url: String,
	pub view_url: String,
	pub uri_url: String,
}

/// Selects a link by one of its two public tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkQuery {
	ShortId(String),
	KeyId(String),
}

impl LinkQuery {
	pub fn token(&self) -> &str {
		match self {
			Self::ShortId(t) | Self::KeyId(t) => t,
		}
	}
}

// =============================================================================
// Nonces and SSO state
// =============================================================================

/// A consumed (token, nonce) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthNonce {
	pub token: String,
	pub nonce: String,
	pub timestamp: DateTime<Utc>,
}

/// Which provider handshake an SSO state was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SsoProvider {
	Google,
	Saml,
}

impl SsoProvider {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Google => "google",
			Self::Saml => "saml",
		}
	}
}

impl FromStr for SsoProvider {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"google" => Ok(Self::Google),
			"saml" => Ok(Self::Saml),
			other => Err(format!("unknown sso provider: {other}")),
		}
	}
}

/// Correlation record for one SSO round trip. Redeemed at most once.
#[derive(Debug, Clone)]
pub struct SsoState {
	pub state: String,
	pub provider: SsoProvider,
	/// HMAC key the auth server signs its callback with.
	pub secret: SecretString,
	pub created_at: DateTime<Utc>,
}

// =============================================================================
// Directory records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
	pub id: OrgId,
	pub name: String,
	/// Whether users of this organization are shown an OTP secret.
	pub otp_auth: bool,
}

#[derive(Debug, Clone)]
pub struct User {
	pub id: UserId,
	pub org_id: OrgId,
	pub name: String,
	pub email: Option<String>,
	pub auth_type: AuthType,
	pub sync_secret: Option<SecretString>,
	pub otp_secret: Option<SecretString>,
}

/// Fields for a user created by SSO provisioning.
#[derive(Debug, Clone)]
pub struct NewUser {
	pub org_id: OrgId,
	pub name: String,
	pub email: Option<String>,
	pub auth_type: AuthType,
	pub sync_secret: SecretString,
	pub otp_secret: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
	pub id: ServerId,
	pub org_id: OrgId,
	pub name: String,
}

/// Change notifications other processes subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
	OrgsUpdated,
	UsersUpdated(OrgId),
	ServersUpdated,
}

impl DomainEvent {
	pub fn event_type(&self) -> &'static str {
		match self {
			Self::OrgsUpdated => "organizations.updated",
			Self::UsersUpdated(_) => "users.updated",
			Self::ServersUpdated => "servers.updated",
		}
	}

	pub fn resource_id(&self) -> Option<OrgId> {
		match self {
			Self::UsersUpdated(org_id) => Some(*org_id),
			_ => None,
		}
	}
}
