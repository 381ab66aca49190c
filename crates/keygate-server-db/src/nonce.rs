// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ledger of consumed sync nonces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keygate_server_auth::{AuthNonce, NonceLedger, NonceOutcome, StoreError};
use keygate_server_config::NonceDurability;
use sqlx::sqlite::SqlitePool;

use crate::error::DbError;
use crate::row::format_ts;

#[derive(Clone)]
pub struct NonceRepository {
	pool: SqlitePool,
}

impl NonceRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert the pair; a primary-key clash means it was seen before.
	///
	/// With [`NonceDurability::Committed`] the insert runs with
	/// `synchronous = FULL` on its connection, so the row survives a crash
	/// once this returns.
	#[tracing::instrument(skip(self, nonce))]
	pub async fn record_nonce(
		&self,
		nonce: &AuthNonce,
		durability: NonceDurability,
	) -> Result<NonceOutcome, DbError> {
		let mut conn = self.pool.acquire().await?;
		let committed = durability == NonceDurability::Committed;

		if committed {
			sqlx::query("PRAGMA synchronous = FULL")
				.execute(&mut *conn)
				.await?;
		}

		let inserted = sqlx::query("INSERT INTO auth_nonces (token, nonce, timestamp) VALUES (?, ?, ?)")
			.bind(&nonce.token)
			.bind(&nonce.nonce)
			.bind(format_ts(nonce.timestamp))
			.execute(&mut *conn)
			.await;

		let outcome = match inserted {
			Ok(_) => Ok(NonceOutcome::Accepted),
			Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
				tracing::debug!("nonce already recorded");
				Ok(NonceOutcome::ReplayDetected)
			}
			Err(e) => Err(e.into()),
		};

		// The insert already decided the outcome; a failed restore only
		// leaves this connection on the stricter setting.
		if committed {
			if let Err(e) = sqlx::query("PRAGMA synchronous = NORMAL")
				.execute(&mut *conn)
				.await
			{
				tracing::warn!(error = %e, "failed to restore synchronous = NORMAL");
			}
		}

		outcome
	}

	/// Drop nonces recorded before `cutoff`. Returns the number removed.
	#[tracing::instrument(skip(self))]
	pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DbError> {
		let result = sqlx::query("DELETE FROM auth_nonces WHERE timestamp < ?")
			.bind(format_ts(cutoff))
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}
}

#[async_trait]
impl NonceLedger for NonceRepository {
	async fn record(
		&self,
		nonce: &AuthNonce,
		durability: NonceDurability,
	) -> Result<NonceOutcome, StoreError> {
		Ok(self.record_nonce(nonce, durability).await?)
	}
}
