// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use keygate_server_auth::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for StoreError {
	fn from(err: DbError) -> Self {
		match err {
			DbError::Conflict(what) => StoreError::Conflict(what),
			other => StoreError::Backend(other.to_string()),
		}
	}
}

/// Map a unique-constraint failure to [`DbError::Conflict`].
pub(crate) fn conflict_on_unique(what: &str) -> impl FnOnce(sqlx::Error) -> DbError + '_ {
	move |e| match e {
		sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
			DbError::Conflict(what.to_string())
		}
		other => DbError::Sqlx(other),
	}
}
