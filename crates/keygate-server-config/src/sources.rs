// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	AuthConfigLayer, DatabaseConfigLayer, HousekeepingConfigLayer, HttpConfigLayer,
	LoggingConfigLayer, PathsConfigLayer, SsoConfigLayer, SubscriptionConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is skipped.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/keygate/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: KEYGATE_SERVER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			database: Some(load_database_from_env()),
			logging: Some(load_logging_from_env()),
			auth: Some(load_auth_from_env()?),
			sso: Some(load_sso_from_env()?),
			subscription: Some(load_subscription_from_env()),
			paths: Some(load_paths_from_env()),
			housekeeping: Some(load_housekeeping_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u16 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid usize value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_list(name: &str) -> Option<Vec<String>> {
	env_var(name).map(|s| {
		s.split(',')
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
			.collect()
	})
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("KEYGATE_SERVER_HOST"),
		port: env_u16("KEYGATE_SERVER_PORT")?,
		base_url: env_var("KEYGATE_SERVER_BASE_URL"),
	})
}

fn load_database_from_env() -> DatabaseConfigLayer {
	DatabaseConfigLayer {
		url: env_var("KEYGATE_SERVER_DATABASE_URL"),
	}
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("KEYGATE_SERVER_LOG_LEVEL"),
	}
}

fn load_auth_from_env() -> Result<AuthConfigLayer, ConfigError> {
	Ok(AuthConfigLayer {
		sync_time_window_secs: env_u64("KEYGATE_SERVER_AUTH_SYNC_TIME_WINDOW_SECS")?,
		sync_signature_max_len: env_usize("KEYGATE_SERVER_AUTH_SYNC_SIGNATURE_MAX_LEN")?,
		not_found_delay_ms: env_u64("KEYGATE_SERVER_AUTH_NOT_FOUND_DELAY_MS")?,
		jitter_max_ms: env_u64("KEYGATE_SERVER_AUTH_JITTER_MAX_MS")?,
		short_id_length: env_usize("KEYGATE_SERVER_AUTH_SHORT_ID_LENGTH")?,
		nonce_durability: env_var("KEYGATE_SERVER_AUTH_NONCE_DURABILITY")
			.map(|v| v.parse())
			.transpose()?,
	})
}

fn load_sso_from_env() -> Result<SsoConfigLayer, ConfigError> {
	Ok(SsoConfigLayer {
		mode: env_var("KEYGATE_SERVER_SSO_MODE")
			.map(|v| v.parse())
			.transpose()?,
		default_org_id: env_var("KEYGATE_SERVER_SSO_DEFAULT_ORG_ID"),
		auth_server_url: env_var("KEYGATE_SERVER_SSO_AUTH_SERVER_URL"),
		saml_url: env_var("KEYGATE_SERVER_SSO_SAML_URL"),
		saml_issuer_url: env_var("KEYGATE_SERVER_SSO_SAML_ISSUER_URL"),
		saml_cert: env_var("KEYGATE_SERVER_SSO_SAML_CERT"),
		allowed_domains: env_list("KEYGATE_SERVER_SSO_ALLOWED_DOMAINS"),
		request_timeout_secs: env_u64("KEYGATE_SERVER_SSO_REQUEST_TIMEOUT_SECS")?,
	})
}

fn load_subscription_from_env() -> SubscriptionConfigLayer {
	SubscriptionConfigLayer {
		active: env_bool("KEYGATE_SERVER_SUBSCRIPTION_ACTIVE"),
	}
}

fn load_paths_from_env() -> PathsConfigLayer {
	PathsConfigLayer {
		profiles_dir: env_var("KEYGATE_SERVER_PROFILES_DIR").map(PathBuf::from),
	}
}

fn load_housekeeping_from_env() -> Result<HousekeepingConfigLayer, ConfigError> {
	Ok(HousekeepingConfigLayer {
		interval_secs: env_u64("KEYGATE_SERVER_HOUSEKEEPING_INTERVAL_SECS")?,
		sso_state_ttl_secs: env_u64("KEYGATE_SERVER_HOUSEKEEPING_SSO_STATE_TTL_SECS")?,
		nonce_retention_secs: env_u64("KEYGATE_SERVER_HOUSEKEEPING_NONCE_RETENTION_SECS")?,
	})
}
