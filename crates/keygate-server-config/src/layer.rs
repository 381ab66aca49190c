// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The partial configuration produced by each source.

use serde::Deserialize;

use crate::sections::{
	AuthConfigLayer, DatabaseConfigLayer, HousekeepingConfigLayer, HttpConfigLayer,
	LoggingConfigLayer, PathsConfigLayer, SsoConfigLayer, SubscriptionConfigLayer,
};

/// One source's view of the configuration. Every field is optional so that
/// later sources only override what they actually set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub auth: Option<AuthConfigLayer>,
	#[serde(default)]
	pub sso: Option<SsoConfigLayer>,
	#[serde(default)]
	pub subscription: Option<SubscriptionConfigLayer>,
	#[serde(default)]
	pub paths: Option<PathsConfigLayer>,
	#[serde(default)]
	pub housekeeping: Option<HousekeepingConfigLayer>,
}

fn merge_section<T>(target: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (target.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *target = Some(incoming),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.auth, other.auth, AuthConfigLayer::merge);
		merge_section(&mut self.sso, other.sso, SsoConfigLayer::merge);
		merge_section(
			&mut self.subscription,
			other.subscription,
			SubscriptionConfigLayer::merge,
		);
		merge_section(&mut self.paths, other.paths, PathsConfigLayer::merge);
		merge_section(
			&mut self.housekeeping,
			other.housekeeping,
			HousekeepingConfigLayer::merge,
		);
	}
}
