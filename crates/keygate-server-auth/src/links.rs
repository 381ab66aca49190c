// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Issuing, resolving and revoking key links.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, StoreError};
use crate::store::LinkStore;
use crate::timing::TimingGuard;
use crate::token::{random_token, KEY_ID_LEN};
use crate::types::{KeyLink, LinkId, LinkQuery, OneTime, OrgId, UserId};

/// Fresh tokens are drawn this many times before a clash is reported.
const ISSUE_ATTEMPTS: usize = 3;

pub struct LinkResolver {
	store: Arc<dyn LinkStore>,
	guard: TimingGuard,
	short_id_length: usize,
}

impl LinkResolver {
	pub fn new(store: Arc<dyn LinkStore>, guard: TimingGuard, short_id_length: usize) -> Self {
		Self {
			store,
			guard,
			short_id_length,
		}
	}

	pub fn guard(&self) -> &TimingGuard {
		&self.guard
	}

	/// Look a link up by token.
	///
	/// With `consume_one_time`, an unused one-time link is flipped to used by a
	/// single compare-and-set. Losing that race, or finding the link already
	/// used, looks exactly like the link not existing.
	#[instrument(skip(self, query), fields(by_short_id = matches!(query, LinkQuery::ShortId(_))))]
	pub async fn resolve(
		&self,
		query: &LinkQuery,
		consume_one_time: bool,
	) -> Result<KeyLink, AuthError> {
		self.guard.jitter().await;

		let Some(mut link) = self.store.find(query).await? else {
			self.guard.delay_if_absent(false).await;
			return Err(AuthError::NotFound);
		};

		if consume_one_time {
			match link.one_time {
				Some(OneTime::Unused) => {
					if !self.store.mark_used(&link.id, &link.short_id).await? {
						debug!(link_id = %link.id, "one-time link consumed by a concurrent request");
						self.guard.delay_if_absent(false).await;
						return Err(AuthError::NotFound);
					}
					link.one_time = Some(OneTime::Used);
				}
				Some(OneTime::Used) => {
					debug!(link_id = %link.id, "one-time link already used");
					self.guard.delay_if_absent(false).await;
					return Err(AuthError::NotFound);
				}
				None => {}
			}
		}

		Ok(link)
	}

	#[instrument(skip(self), fields(%org_id, %user_id))]
	pub async fn issue(
		&self,
		org_id: OrgId,
		user_id: UserId,
		one_time: bool,
	) -> Result<KeyLink, AuthError> {
		let mut last_conflict = None;
		for attempt in 1..=ISSUE_ATTEMPTS {
			let link = KeyLink {
				id: LinkId::generate(),
				short_id: random_token(self.short_id_length),
				key_id: random_token(KEY_ID_LEN),
				org_id,
				user_id,
				one_time: one_time.then_some(OneTime::Unused),
				created_at: Utc::now(),
			};

			match self.store.insert(&link).await {
				Ok(()) => {
					debug!(link_id = %link.id, one_time, "key link issued");
					return Ok(link);
				}
				Err(StoreError::Conflict(msg)) => {
					warn!(attempt, "key link token collision, retrying");
					last_conflict = Some(msg);
				}
				Err(e) => return Err(e.into()),
			}
		}

		Err(StoreError::Conflict(last_conflict.unwrap_or_default()).into())
	}

	/// Delete by short id whatever its consumption state. Deleting a missing
	/// link succeeds.
	#[instrument(skip(self, short_id))]
	pub async fn revoke(&self, short_id: &str) -> Result<(), AuthError> {
		self.guard.jitter().await;
		let removed = self.store.delete_by_short_id(short_id).await?;
		debug!(removed, "key link revoke");
		Ok(())
	}
}
