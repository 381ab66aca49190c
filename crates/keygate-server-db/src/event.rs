// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted domain events, read by other processes sharing the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keygate_server_auth::{DomainEvent, EventPublisher, StoreError};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::row::{format_ts, parse_ts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
	pub id: i64,
	pub event_type: String,
	pub resource_id: Option<String>,
	pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct EventRepository {
	pool: SqlitePool,
}

impl EventRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(event_type = event.event_type()))]
	pub async fn append(&self, event: DomainEvent) -> Result<i64, DbError> {
		let result = sqlx::query("INSERT INTO events (event_type, resource_id, created_at) VALUES (?, ?, ?)")
			.bind(event.event_type())
			.bind(event.resource_id().map(|id| id.to_string()))
			.bind(format_ts(Utc::now()))
			.execute(&self.pool)
			.await?;
		Ok(result.last_insert_rowid())
	}

	/// Events with an id greater than `after`, oldest first.
	#[tracing::instrument(skip(self))]
	pub async fn list_after(&self, after: i64, limit: i64) -> Result<Vec<StoredEvent>, DbError> {
		let rows = sqlx::query(
			"SELECT id, event_type, resource_id, created_at FROM events WHERE id > ? ORDER BY id LIMIT ?",
		)
		.bind(after)
		.bind(limit)
		.fetch_all(&self.pool)
		.await?;

		rows
			.iter()
			.map(|row| -> Result<StoredEvent, DbError> {
				let created_at: String = row.get("created_at");
				Ok(StoredEvent {
					id: row.get("id"),
					event_type: row.get("event_type"),
					resource_id: row.get("resource_id"),
					created_at: parse_ts("created_at", &created_at)?,
				})
			})
			.collect()
	}
}

#[async_trait]
impl EventPublisher for EventRepository {
	async fn publish(&self, event: DomainEvent) -> Result<(), StoreError> {
		self.append(event).await?;
		Ok(())
	}
}
