// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Organizations, users and servers.

use async_trait::async_trait;
use chrono::Utc;
use keygate_common_secret::SecretString;
use keygate_server_auth::{
	AuthType, Directory, NewUser, OrgId, Organization, Server, ServerId, StoreError,
	SyncSecretLookup, User, UserId,
};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_on_unique, DbError};
use crate::row::{format_ts, parse_col};

const USER_COLUMNS: &str = "id, org_id, name, email, auth_type, sync_secret, otp_secret";

#[derive(Clone)]
pub struct DirectoryRepository {
	pool: SqlitePool,
}

impl DirectoryRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn create_org(&self, name: &str, otp_auth: bool) -> Result<Organization, DbError> {
		let org = Organization {
			id: OrgId::generate(),
			name: name.to_string(),
			otp_auth,
		};
		sqlx::query("INSERT INTO organizations (id, name, otp_auth, created_at) VALUES (?, ?, ?, ?)")
			.bind(org.id.to_string())
			.bind(&org.name)
			.bind(org.otp_auth)
			.bind(format_ts(Utc::now()))
			.execute(&self.pool)
			.await
			.map_err(conflict_on_unique("organization name"))?;

		tracing::debug!(org_id = %org.id, "organization created");
		Ok(org)
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn create_server(&self, org_id: &OrgId, name: &str) -> Result<Server, DbError> {
		let server = Server {
			id: ServerId::generate(),
			org_id: *org_id,
			name: name.to_string(),
		};
		sqlx::query("INSERT INTO servers (id, org_id, name, created_at) VALUES (?, ?, ?, ?)")
			.bind(server.id.to_string())
			.bind(server.org_id.to_string())
			.bind(&server.name)
			.bind(format_ts(Utc::now()))
			.execute(&self.pool)
			.await?;
		Ok(server)
	}

	#[tracing::instrument(skip(self), fields(org_id = %id))]
	pub async fn get_org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, DbError> {
		let row = sqlx::query("SELECT id, name, otp_auth FROM organizations WHERE id = ?")
			.bind(id.to_string())
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_org_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_org_by_name(&self, name: &str) -> Result<Option<Organization>, DbError> {
		let row = sqlx::query("SELECT id, name, otp_auth FROM organizations WHERE name = ?")
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;
		row.as_ref().map(parse_org_row).transpose()
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id, user_id = %id))]
	pub async fn get_user_by_id(&self, org_id: &OrgId, id: &UserId) -> Result<Option<User>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {USER_COLUMNS} FROM users WHERE org_id = ? AND id = ?"
		))
		.bind(org_id.to_string())
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;
		row.as_ref().map(parse_user_row).transpose()
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn get_user_by_name(&self, org_id: &OrgId, name: &str) -> Result<Option<User>, DbError> {
		let row = sqlx::query(&format!(
			"SELECT {USER_COLUMNS} FROM users WHERE org_id = ? AND name = ?"
		))
		.bind(org_id.to_string())
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;
		row.as_ref().map(parse_user_row).transpose()
	}

	/// # Errors
	/// `DbError::Conflict` when the organization already has a user by that name.
	#[tracing::instrument(skip(self, new), fields(org_id = %new.org_id, auth_type = %new.auth_type))]
	pub async fn insert_user(&self, new: &NewUser) -> Result<User, DbError> {
		let user = User {
			id: UserId::generate(),
			org_id: new.org_id,
			name: new.name.clone(),
			email: new.email.clone(),
			auth_type: new.auth_type,
			sync_secret: Some(new.sync_secret.clone()),
			otp_secret: Some(new.otp_secret.clone()),
		};

		sqlx::query(
			r#"
			INSERT INTO users (id, org_id, name, email, auth_type, sync_secret, otp_secret, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(user.id.to_string())
		.bind(user.org_id.to_string())
		.bind(&user.name)
		.bind(&user.email)
		.bind(user.auth_type.as_str())
		.bind(new.sync_secret.expose())
		.bind(new.otp_secret.expose())
		.bind(format_ts(Utc::now()))
		.execute(&self.pool)
		.await
		.map_err(conflict_on_unique("user name"))?;

		tracing::debug!(user_id = %user.id, "user created");
		Ok(user)
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn set_auth_type(&self, id: &UserId, auth_type: AuthType) -> Result<(), DbError> {
		sqlx::query("UPDATE users SET auth_type = ? WHERE id = ?")
			.bind(auth_type.as_str())
			.bind(id.to_string())
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(org_id = %org_id))]
	pub async fn list_servers(&self, org_id: &OrgId) -> Result<Vec<Server>, DbError> {
		let rows = sqlx::query("SELECT id, org_id, name FROM servers WHERE org_id = ? ORDER BY name")
			.bind(org_id.to_string())
			.fetch_all(&self.pool)
			.await?;

		let mut servers = Vec::with_capacity(rows.len());
		for row in &rows {
			let id: String = row.get("id");
			let org_id: String = row.get("org_id");
			servers.push(Server {
				id: parse_col("server id", &id)?,
				org_id: parse_col("org_id", &org_id)?,
				name: row.get("name"),
			});
		}
		Ok(servers)
	}

	/// Cheap round trip used by the health endpoint.
	pub async fn ping(&self) -> Result<(), DbError> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}
}

#[async_trait]
impl Directory for DirectoryRepository {
	async fn org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, StoreError> {
		Ok(self.get_org_by_id(id).await?)
	}

	async fn org_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError> {
		Ok(self.get_org_by_name(name).await?)
	}

	async fn user_by_id(&self, org_id: &OrgId, id: &UserId) -> Result<Option<User>, StoreError> {
		Ok(self.get_user_by_id(org_id, id).await?)
	}

	async fn user_by_name(&self, org_id: &OrgId, name: &str) -> Result<Option<User>, StoreError> {
		Ok(self.get_user_by_name(org_id, name).await?)
	}

	async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
		Ok(self.insert_user(user).await?)
	}

	async fn update_auth_type(&self, id: &UserId, auth_type: AuthType) -> Result<(), StoreError> {
		Ok(self.set_auth_type(id, auth_type).await?)
	}

	async fn servers_for_org(&self, org_id: &OrgId) -> Result<Vec<Server>, StoreError> {
		Ok(self.list_servers(org_id).await?)
	}
}

#[async_trait]
impl SyncSecretLookup for DirectoryRepository {
	async fn sync_secret(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
	) -> Result<Option<SecretString>, StoreError> {
		Ok(self
			.get_user_by_id(org_id, user_id)
			.await?
			.and_then(|u| u.sync_secret))
	}
}

fn parse_org_row(row: &sqlx::sqlite::SqliteRow) -> Result<Organization, DbError> {
	let id: String = row.get("id");
	Ok(Organization {
		id: parse_col("org id", &id)?,
		name: row.get("name"),
		otp_auth: row.get("otp_auth"),
	})
}

fn parse_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, DbError> {
	let id: String = row.get("id");
	let org_id: String = row.get("org_id");
	let auth_type: String = row.get("auth_type");
	let sync_secret: Option<String> = row.get("sync_secret");
	let otp_secret: Option<String> = row.get("otp_secret");

	Ok(User {
		id: parse_col("user id", &id)?,
		org_id: parse_col("org_id", &org_id)?,
		name: row.get("name"),
		email: row.get("email"),
		auth_type: parse_col("auth_type", &auth_type)?,
		sync_secret: sync_secret.map(SecretString::new),
		otp_secret: otp_secret.map(SecretString::new),
	})
}
