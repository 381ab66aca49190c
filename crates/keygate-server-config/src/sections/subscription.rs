// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Entitlement flags.

use serde::Deserialize;

#[derive(Debug, Clone, Default)]
pub struct SubscriptionConfig {
	/// Gates device sync, SSO request and the ONC download link.
	pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionConfigLayer {
	#[serde(default)]
	pub active: Option<bool>,
}

impl SubscriptionConfigLayer {
	pub fn merge(&mut self, other: SubscriptionConfigLayer) {
		if other.active.is_some() {
			self.active = other.active;
		}
	}

	pub fn finalize(self) -> SubscriptionConfig {
		SubscriptionConfig {
			active: self.active.unwrap_or(false),
		}
	}
}
