// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background cleanup of spent nonces and abandoned SSO states.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HousekeepingConfig {
	pub interval_secs: u64,
	pub sso_state_ttl_secs: u64,
	pub nonce_retention_secs: u64,
}

impl Default for HousekeepingConfig {
	fn default() -> Self {
		HousekeepingConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HousekeepingConfigLayer {
	#[serde(default)]
	pub interval_secs: Option<u64>,
	#[serde(default)]
	pub sso_state_ttl_secs: Option<u64>,
	#[serde(default)]
	pub nonce_retention_secs: Option<u64>,
}

impl HousekeepingConfigLayer {
	pub fn merge(&mut self, other: HousekeepingConfigLayer) {
		if other.interval_secs.is_some() {
			self.interval_secs = other.interval_secs;
		}
		if other.sso_state_ttl_secs.is_some() {
			self.sso_state_ttl_secs = other.sso_state_ttl_secs;
		}
		if other.nonce_retention_secs.is_some() {
			self.nonce_retention_secs = other.nonce_retention_secs;
		}
	}

	pub fn finalize(self) -> HousekeepingConfig {
		HousekeepingConfig {
			interval_secs: self.interval_secs.unwrap_or(300),
			sso_state_ttl_secs: self.sso_state_ttl_secs.unwrap_or(600),
			nonce_retention_secs: self.nonce_retention_secs.unwrap_or(3600),
		}
	}
}
