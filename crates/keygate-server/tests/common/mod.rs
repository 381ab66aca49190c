// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared setup for router-level tests.

#![allow(dead_code)]

use std::path::PathBuf;

use axum::{
	body::Body,
	http::{Request, Response},
	Router,
};
use keygate_common_secret::SecretString;
use keygate_server::db::{create_pool, run_migrations, DirectoryRepository};
use keygate_server::{create_app_state, create_router, AppState, ServerConfig};
use keygate_server_auth::{AuthType, NewUser, Organization, Server, User};
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-test-token";
pub const SYNC_SECRET: &str = "device-sync-secret-0123456789abcdef";
pub const BASE_URL: &str = "https://vpn.example.test";

/// Defaults with delays off, an admin token and an active subscription.
pub fn test_config() -> ServerConfig {
	let mut config = ServerConfig::default();
	config.auth.not_found_delay_ms = 0;
	config.auth.jitter_max_ms = 0;
	config.auth.admin_token = Some(SecretString::new(ADMIN_TOKEN.to_string()));
	config.subscription.active = true;
	config.http.base_url = BASE_URL.to_string();
	config
}

pub struct TestApp {
	pub router: Router,
	pub state: AppState,
	pub pool: SqlitePool,
	pub profiles_dir: PathBuf,
	_dir: TempDir,
}

/// Creates an app with an isolated database and profiles directory.
pub async fn spawn_app(mut config: ServerConfig) -> TestApp {
	let dir = tempdir().unwrap();
	let db_path = dir.path().join("keygate.db");
	let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
	let pool = create_pool(&db_url).await.unwrap();
	run_migrations(&pool).await.unwrap();

	let profiles_dir = dir.path().join("profiles");
	config.paths.profiles_dir = profiles_dir.clone();

	let state = create_app_state(pool.clone(), &config).await;
	TestApp {
		router: create_router(state.clone()),
		state,
		pool,
		profiles_dir,
		_dir: dir,
	}
}

impl TestApp {
	/// Rebuild state and router over the same database and profiles, for
	/// settings that depend on seeded rows.
	pub async fn reconfigure(self, mut config: ServerConfig) -> TestApp {
		config.paths.profiles_dir = self.profiles_dir.clone();
		let state = create_app_state(self.pool.clone(), &config).await;
		self.with_state(state)
	}

	pub fn with_state(self, state: AppState) -> TestApp {
		TestApp {
			router: create_router(state.clone()),
			state,
			..self
		}
	}

	pub fn directory(&self) -> DirectoryRepository {
		DirectoryRepository::new(self.pool.clone())
	}

	pub async fn send(&self, request: Request<Body>) -> Response<Body> {
		self.router.clone().oneshot(request).await.unwrap()
	}

	pub async fn get(&self, uri: &str) -> Response<Body> {
		self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
			.await
	}

	/// An organization with one user (holding [`SYNC_SECRET`]) and one server.
	pub async fn seed(&self, org_name: &str, otp_auth: bool) -> (Organization, User, Server) {
		let directory = self.directory();
		let org = directory.create_org(org_name, otp_auth).await.unwrap();
		let user = directory
			.insert_user(&NewUser {
				org_id: org.id,
				name: "alice".to_string(),
				email: Some("alice@example.test".to_string()),
				auth_type: AuthType::Local,
				sync_secret: SecretString::new(SYNC_SECRET.to_string()),
				otp_secret: SecretString::new("JBSWY3DPEHPK3PXP".to_string()),
			})
			.await
			.unwrap();
		let server = directory.create_server(&org.id, "east").await.unwrap();
		(org, user, server)
	}

	pub fn write_profile(&self, org: &Organization, user: &User, rel: &str, contents: &[u8]) {
		let path = self
			.profiles_dir
			.join(org.id.to_string())
			.join(user.id.to_string())
			.join(rel);
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(path, contents).unwrap();
	}
}

pub async fn body_string(response: Response<Body>) -> String {
	let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
		.await
		.unwrap();
	String::from_utf8(bytes.to_vec()).unwrap()
}
