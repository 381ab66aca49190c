// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access to users' prebuilt VPN profiles.
//!
//! Profiles are produced elsewhere and dropped on disk; this server only
//! streams them. Layout under the profiles directory:
//!
//! ```text
//! {org_id}/{user_id}/profile.tar
//! {org_id}/{user_id}/profile.zip
//! {org_id}/{user_id}/onc.zip
//! {org_id}/{user_id}/servers/{server_id}.ovpn
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use keygate_server_auth::{Organization, Server, User};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
	#[error("{what} not available")]
	Missing { what: String },

	#[error("failed to read {what}: {source}")]
	Io {
		what: String,
		#[source]
		source: std::io::Error,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
	Tar,
	Zip,
	/// Chromebook (ONC) bundle.
	Onc,
}

impl ArchiveKind {
	fn file_name(self) -> &'static str {
		match self {
			Self::Tar => "profile.tar",
			Self::Zip => "profile.zip",
			Self::Onc => "onc.zip",
		}
	}

	/// Extension used in the download file name.
	pub fn extension(self) -> &'static str {
		match self {
			Self::Tar => "tar",
			Self::Zip | Self::Onc => "zip",
		}
	}
}

/// One server's client configuration for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProfile {
	/// Download name, `{org}_{user}_{server}.ovpn`.
	pub name: String,
	pub conf: String,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
	async fn archive(
		&self,
		org: &Organization,
		user: &User,
		kind: ArchiveKind,
	) -> Result<Vec<u8>, ProfileError>;

	async fn server_profile(
		&self,
		org: &Organization,
		user: &User,
		server: &Server,
	) -> Result<ServerProfile, ProfileError>;
}

/// [`ProfileStore`] reading from a directory tree.
#[derive(Debug, Clone)]
pub struct FsProfileStore {
	root: PathBuf,
}

impl FsProfileStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn user_dir(&self, org: &Organization, user: &User) -> PathBuf {
		self.root.join(org.id.to_string()).join(user.id.to_string())
	}
}

async fn read_file(path: &Path, what: String) -> Result<Vec<u8>, ProfileError> {
	match tokio::fs::read(path).await {
		Ok(bytes) => Ok(bytes),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			debug!(path = %path.display(), "profile file missing");
			Err(ProfileError::Missing { what })
		}
		Err(source) => Err(ProfileError::Io { what, source }),
	}
}

#[async_trait]
impl ProfileStore for FsProfileStore {
	#[instrument(skip(self, org, user), fields(org_id = %org.id, user_id = %user.id))]
	async fn archive(
		&self,
		org: &Organization,
		user: &User,
		kind: ArchiveKind,
	) -> Result<Vec<u8>, ProfileError> {
		let path = self.user_dir(org, user).join(kind.file_name());
		read_file(&path, format!("{kind:?} archive")).await
	}

	#[instrument(skip(self, org, user, server), fields(server_id = %server.id))]
	async fn server_profile(
		&self,
		org: &Organization,
		user: &User,
		server: &Server,
	) -> Result<ServerProfile, ProfileError> {
		let path = self
			.user_dir(org, user)
			.join("servers")
			.join(format!("{}.ovpn", server.id));
		let what = format!("profile for server {}", server.id);
		let bytes = read_file(&path, what.clone()).await?;
		let conf = String::from_utf8(bytes).map_err(|e| ProfileError::Io {
			what,
			source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
		})?;
		Ok(ServerProfile {
			name: format!("{}_{}_{}.ovpn", org.name, user.name, server.name),
			conf,
		})
	}
}

/// Lowercase hex SHA-256 of a profile, as devices report it.
pub fn conf_hash(conf: &str) -> String {
	hex::encode(Sha256::digest(conf.as_bytes()))
}

/// The profile a syncing device should receive, or `None` when the copy it
/// holds (identified by `key_hash`) is current or no profile exists.
pub async fn sync_conf(
	store: &dyn ProfileStore,
	org: &Organization,
	user: &User,
	server: &Server,
	key_hash: &str,
) -> Result<Option<String>, ProfileError> {
	let profile = match store.server_profile(org, user, server).await {
		Ok(profile) => profile,
		Err(ProfileError::Missing { .. }) => return Ok(None),
		Err(e) => return Err(e),
	};
	if conf_hash(&profile.conf).eq_ignore_ascii_case(key_hash) {
		Ok(None)
	} else {
		Ok(Some(profile.conf))
	}
}
