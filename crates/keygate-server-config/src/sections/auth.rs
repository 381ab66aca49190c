// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Link, sync-signature and admin-token settings.

use std::str::FromStr;
use std::time::Duration;

use keygate_common_secret::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// How long the nonce insert waits before a sync request is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceDurability {
	/// Accepted once the write is handed to the store.
	#[default]
	Accepted,
	/// Accepted only once the write is durably committed.
	Committed,
}

impl FromStr for NonceDurability {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"accepted" => Ok(Self::Accepted),
			"committed" => Ok(Self::Committed),
			other => Err(ConfigError::InvalidValue {
				key: "auth.nonce_durability".to_string(),
				message: format!("expected 'accepted' or 'committed', got '{other}'"),
			}),
		}
	}
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
	pub sync_time_window_secs: u64,
	pub sync_signature_max_len: usize,
	pub not_found_delay_ms: u64,
	pub jitter_max_ms: u64,
	pub short_id_length: usize,
	pub nonce_durability: NonceDurability,
	/// Bearer token for the administrative endpoints. Unset disables them.
	pub admin_token: Option<SecretString>,
}

impl AuthConfig {
	pub fn sync_time_window(&self) -> Duration {
		Duration::from_secs(self.sync_time_window_secs)
	}

	pub fn not_found_delay(&self) -> Duration {
		Duration::from_millis(self.not_found_delay_ms)
	}

	pub fn jitter_max(&self) -> Duration {
		Duration::from_millis(self.jitter_max_ms)
	}
}

impl Default for AuthConfig {
	fn default() -> Self {
		AuthConfigLayer::default().finalize(None)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub sync_time_window_secs: Option<u64>,
	#[serde(default)]
	pub sync_signature_max_len: Option<usize>,
	#[serde(default)]
	pub not_found_delay_ms: Option<u64>,
	#[serde(default)]
	pub jitter_max_ms: Option<u64>,
	#[serde(default)]
	pub short_id_length: Option<usize>,
	#[serde(default)]
	pub nonce_durability: Option<NonceDurability>,
}

impl AuthConfigLayer {
	pub fn merge(&mut self, other: AuthConfigLayer) {
		if other.sync_time_window_secs.is_some() {
			self.sync_time_window_secs = other.sync_time_window_secs;
		}
		if other.sync_signature_max_len.is_some() {
			self.sync_signature_max_len = other.sync_signature_max_len;
		}
		if other.not_found_delay_ms.is_some() {
			self.not_found_delay_ms = other.not_found_delay_ms;
		}
		if other.jitter_max_ms.is_some() {
			self.jitter_max_ms = other.jitter_max_ms;
		}
		if other.short_id_length.is_some() {
			self.short_id_length = other.short_id_length;
		}
		if other.nonce_durability.is_some() {
			self.nonce_durability = other.nonce_durability;
		}
	}

	pub fn finalize(self, admin_token: Option<SecretString>) -> AuthConfig {
		AuthConfig {
			sync_time_window_secs: self.sync_time_window_secs.unwrap_or(120),
			sync_signature_max_len: self.sync_signature_max_len.unwrap_or(10240),
			not_found_delay_ms: self.not_found_delay_ms.unwrap_or(250),
			jitter_max_ms: self.jitter_max_ms.unwrap_or(25),
			short_id_length: self.short_id_length.unwrap_or(12),
			nonce_durability: self.nonce_durability.unwrap_or_default(),
			admin_token,
		}
	}
}
