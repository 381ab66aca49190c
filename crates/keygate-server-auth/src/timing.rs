// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Latency shaping for token lookups.

use std::time::Duration;

use keygate_server_config::AuthConfig;

/// Per-request delays that hide whether a token exists.
///
/// Both delays are plain `tokio::time::sleep` calls on the requesting task.
#[derive(Debug, Clone, Copy)]
pub struct TimingGuard {
	not_found_delay: Duration,
	jitter_max: Duration,
}

impl TimingGuard {
	pub fn new(not_found_delay: Duration, jitter_max: Duration) -> Self {
		Self {
			not_found_delay,
			jitter_max,
		}
	}

	pub fn from_config(config: &AuthConfig) -> Self {
		Self::new(config.not_found_delay(), config.jitter_max())
	}

	/// No delays at all.
	pub fn disabled() -> Self {
		Self::new(Duration::ZERO, Duration::ZERO)
	}

	pub fn not_found_delay(&self) -> Duration {
		self.not_found_delay
	}

	/// Sleep a uniformly random duration in `0..=jitter_max`.
	pub async fn jitter(&self) {
		let max_ms = self.jitter_max.as_millis() as u64;
		if max_ms == 0 {
			return;
		}
		let ms = fastrand::u64(0..=max_ms);
		tokio::time::sleep(Duration::from_millis(ms)).await;
	}

	pub async fn delay_if_absent(&self, found: bool) {
		if !found && !self.not_found_delay.is_zero() {
			tokio::time::sleep(self.not_found_delay).await;
		}
	}
}
