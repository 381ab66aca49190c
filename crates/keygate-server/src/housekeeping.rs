// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic removal of expired nonces and abandoned SSO states.

use std::time::Duration;

use chrono::{DateTime, Utc};
use keygate_server_config::HousekeepingConfig;
use keygate_server_db::{DbError, NonceRepository, SsoStateRepository};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
	pub nonces: u64,
	pub sso_states: u64,
}

pub struct Housekeeper {
	nonces: NonceRepository,
	states: SsoStateRepository,
	nonce_retention: chrono::Duration,
	sso_state_ttl: chrono::Duration,
	interval: Duration,
}

fn seconds(secs: u64) -> chrono::Duration {
	i64::try_from(secs)
		.ok()
		.and_then(chrono::Duration::try_seconds)
		.unwrap_or(chrono::Duration::MAX)
}

fn cutoff(now: DateTime<Utc>, age: chrono::Duration) -> DateTime<Utc> {
	now.checked_sub_signed(age).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl Housekeeper {
	pub fn new(
		nonces: NonceRepository,
		states: SsoStateRepository,
		config: &HousekeepingConfig,
	) -> Self {
		Self {
			nonces,
			states,
			nonce_retention: seconds(config.nonce_retention_secs),
			sso_state_ttl: seconds(config.sso_state_ttl_secs),
			interval: Duration::from_secs(config.interval_secs.max(1)),
		}
	}

	/// One purge pass relative to `now`.
	#[instrument(skip(self))]
	pub async fn run_once(&self, now: DateTime<Utc>) -> Result<PurgeReport, DbError> {
		let nonces = self.nonces.purge_before(cutoff(now, self.nonce_retention)).await?;
		let sso_states = self.states.purge_before(cutoff(now, self.sso_state_ttl)).await?;
		if nonces > 0 || sso_states > 0 {
			info!(nonces, sso_states, "housekeeping purged expired records");
		}
		Ok(PurgeReport { nonces, sso_states })
	}

	/// Run [`Self::run_once`] every interval until the task is aborted.
	pub fn spawn(self) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(self.interval);
			loop {
				ticker.tick().await;
				if let Err(e) = self.run_once(Utc::now()).await {
					error!(error = %e, "housekeeping pass failed");
				}
			}
		})
	}
}
