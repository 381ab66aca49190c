// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key link repository.
//!
//! One-time consumption is a single conditional `UPDATE`; SQLite serializes
//! writers, so of any number of concurrent consumers exactly one sees a row
//! change.

use async_trait::async_trait;
use keygate_server_auth::{KeyLink, LinkId, LinkQuery, LinkStore, OneTime, StoreError};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_on_unique, DbError};
use crate::row::{format_ts, parse_col, parse_ts};

#[derive(Clone)]
pub struct KeyLinkRepository {
	pool: SqlitePool,
}

impl KeyLinkRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a freshly issued link.
	///
	/// # Errors
	/// `DbError::Conflict` when the short id or key id is already taken.
	#[tracing::instrument(skip(self, link), fields(link_id = %link.id))]
	pub async fn insert_link(&self, link: &KeyLink) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO key_links (id, short_id, key_id, org_id, user_id, one_time, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(link.id.to_string())
		.bind(&link.short_id)
		.bind(&link.key_id)
		.bind(link.org_id.to_string())
		.bind(link.user_id.to_string())
		.bind(link.one_time.map(OneTime::as_str))
		.bind(format_ts(link.created_at))
		.execute(&self.pool)
		.await
		.map_err(conflict_on_unique("key link token"))?;

		tracing::debug!(link_id = %link.id, "key link stored");
		Ok(())
	}

	#[tracing::instrument(skip(self, query))]
	pub async fn find_link(&self, query: &LinkQuery) -> Result<Option<KeyLink>, DbError> {
		let sql = match query {
			LinkQuery::ShortId(_) => {
				"SELECT id, short_id, key_id, org_id, user_id, one_time, created_at FROM key_links WHERE short_id = ?"
			}
			LinkQuery::KeyId(_) => {
				"SELECT id, short_id, key_id, org_id, user_id, one_time, created_at FROM key_links WHERE key_id = ?"
			}
		};
		let row = sqlx::query(sql)
			.bind(query.token())
			.fetch_optional(&self.pool)
			.await?;

		row.as_ref().map(parse_link_row).transpose()
	}

	/// Flip an unused one-time link to used. Returns `false` if the link is
	/// gone, already used, or was never one-time.
	#[tracing::instrument(skip(self, short_id), fields(link_id = %id))]
	pub async fn mark_link_used(&self, id: &LinkId, short_id: &str) -> Result<bool, DbError> {
		let result = sqlx::query(
			r#"
			UPDATE key_links
			SET one_time = 'used'
			WHERE id = ? AND short_id = ? AND one_time = 'unused'
			"#,
		)
		.bind(id.to_string())
		.bind(short_id)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() == 1)
	}

	#[tracing::instrument(skip(self, short_id))]
	pub async fn delete_link(&self, short_id: &str) -> Result<bool, DbError> {
		let result = sqlx::query("DELETE FROM key_links WHERE short_id = ?")
			.bind(short_id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}
}

#[async_trait]
impl LinkStore for KeyLinkRepository {
	async fn insert(&self, link: &KeyLink) -> Result<(), StoreError> {
		Ok(self.insert_link(link).await?)
	}

	async fn find(&self, query: &LinkQuery) -> Result<Option<KeyLink>, StoreError> {
		Ok(self.find_link(query).await?)
	}

	async fn mark_used(&self, id: &LinkId, short_id: &str) -> Result<bool, StoreError> {
		Ok(self.mark_link_used(id, short_id).await?)
	}

	async fn delete_by_short_id(&self, short_id: &str) -> Result<bool, StoreError> {
		Ok(self.delete_link(short_id).await?)
	}
}

fn parse_link_row(row: &sqlx::sqlite::SqliteRow) -> Result<KeyLink, DbError> {
	let id: String = row.get("id");
	let org_id: String = row.get("org_id");
	let user_id: String = row.get("user_id");
	let one_time: Option<String> = row.get("one_time");
	let created_at: String = row.get("created_at");

	Ok(KeyLink {
		id: parse_col("key link id", &id)?,
		short_id: row.get("short_id"),
		key_id: row.get("key_id"),
		org_id: parse_col("org_id", &org_id)?,
		user_id: parse_col("user_id", &user_id)?,
		one_time: one_time
			.as_deref()
			.map(|s| parse_col("one_time", s))
			.transpose()?,
		created_at: parse_ts("created_at", &created_at)?,
	})
}
