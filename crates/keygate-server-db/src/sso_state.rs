// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pending SSO round trips.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keygate_common_secret::SecretString;
use keygate_server_auth::{SsoState, SsoStateStore, StoreError};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_on_unique, DbError};
use crate::row::{format_ts, parse_col, parse_ts};

#[derive(Clone)]
pub struct SsoStateRepository {
	pool: SqlitePool,
}

impl SsoStateRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, state), fields(provider = state.provider.as_str()))]
	pub async fn insert_state(&self, state: &SsoState) -> Result<(), DbError> {
		sqlx::query("INSERT INTO sso_states (state, provider, secret, created_at) VALUES (?, ?, ?, ?)")
			.bind(&state.state)
			.bind(state.provider.as_str())
			.bind(state.secret.expose())
			.bind(format_ts(state.created_at))
			.execute(&self.pool)
			.await
			.map_err(conflict_on_unique("sso state"))?;
		Ok(())
	}

	/// Delete and return the record in one statement. Of two concurrent
	/// callers with the same state, only one gets `Some`.
	#[tracing::instrument(skip(self, state))]
	pub async fn take_state(&self, state: &str) -> Result<Option<SsoState>, DbError> {
		let row = sqlx::query(
			r#"
			DELETE FROM sso_states
			WHERE state = ?
			RETURNING state, provider, secret, created_at
			"#,
		)
		.bind(state)
		.fetch_optional(&self.pool)
		.await?;

		let Some(row) = row else {
			return Ok(None);
		};

		let provider: String = row.get("provider");
		let secret: String = row.get("secret");
		let created_at: String = row.get("created_at");
		Ok(Some(SsoState {
			state: row.get("state"),
			provider: parse_col("provider", &provider)?,
			secret: SecretString::new(secret),
			created_at: parse_ts("created_at", &created_at)?,
		}))
	}

	#[tracing::instrument(skip(self))]
	pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
		let result = sqlx::query("DELETE FROM sso_states WHERE created_at < ?")
			.bind(format_ts(cutoff))
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}
}

#[async_trait]
impl SsoStateStore for SsoStateRepository {
	async fn insert(&self, state: &SsoState) -> Result<(), StoreError> {
		Ok(self.insert_state(state).await?)
	}

	async fn take(&self, state: &str) -> Result<Option<SsoState>, StoreError> {
		Ok(self.take_state(state).await?)
	}
}
