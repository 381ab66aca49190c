// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Keygate server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`KEYGATE_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use keygate_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Server listening on {}:{}", config.http.host, config.http.port);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use keygate_common_secret::load_secret_env;
use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub auth: AuthConfig,
	pub sso: SsoConfig,
	pub subscription: SubscriptionConfig,
	pub paths: PathsConfig,
	pub housekeeping: HousekeepingConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`KEYGATE_SERVER_*`)
/// 2. Config file (`/etc/keygate/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	let admin_token = load_secret_env("KEYGATE_SERVER_ADMIN_TOKEN")
		.map_err(|e| ConfigError::Secret(e.to_string()))?;
	let license = load_secret_env("KEYGATE_SERVER_SSO_LICENSE")
		.map_err(|e| ConfigError::Secret(e.to_string()))?;

	finalize(merged, admin_token, license)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(
	layer: ServerConfigLayer,
	admin_token: Option<keygate_common_secret::SecretString>,
	sso_license: Option<keygate_common_secret::SecretString>,
) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let auth = layer.auth.unwrap_or_default().finalize(admin_token);
	let sso = layer.sso.unwrap_or_default().finalize(sso_license);
	let subscription = layer.subscription.unwrap_or_default().finalize();
	let paths = layer.paths.unwrap_or_default().finalize();
	let housekeeping = layer.housekeeping.unwrap_or_default().finalize();

	validate_config(&auth, &sso, &housekeeping)?;

	info!(
		host = %http.host,
		port = http.port,
		database = %database.url,
		sso_mode = sso.mode.map(|m| m.as_str()).unwrap_or("disabled"),
		subscription_active = subscription.active,
		admin_enabled = auth.admin_token.is_some(),
		sync_window_secs = auth.sync_time_window_secs,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		logging,
		auth,
		sso,
		subscription,
		paths,
		housekeeping,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(
	auth: &AuthConfig,
	sso: &SsoConfig,
	housekeeping: &HousekeepingConfig,
) -> Result<(), ConfigError> {
	if auth.short_id_length < 8 {
		return Err(ConfigError::Validation(format!(
			"auth.short_id_length must be at least 8, got {}",
			auth.short_id_length
		)));
	}

	// A nonce purged while its timestamp is still inside the window could be replayed.
	if housekeeping.nonce_retention_secs <= auth.sync_time_window_secs.saturating_mul(2) {
		return Err(ConfigError::Validation(format!(
			"housekeeping.nonce_retention_secs ({}) must exceed twice auth.sync_time_window_secs ({})",
			housekeeping.nonce_retention_secs, auth.sync_time_window_secs
		)));
	}

	if let Some(mode) = sso.mode {
		if mode.uses_redirect() && sso.auth_server_url.is_none() {
			return Err(ConfigError::Validation(format!(
				"sso mode '{mode}' requires KEYGATE_SERVER_SSO_AUTH_SERVER_URL"
			)));
		}
		if mode.is_saml()
			&& (sso.saml_url.is_none() || sso.saml_issuer_url.is_none() || sso.saml_cert.is_none())
		{
			return Err(ConfigError::Validation(format!(
				"sso mode '{mode}' requires saml_url, saml_issuer_url and saml_cert"
			)));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_validate() {
		let config = finalize(ServerConfigLayer::default(), None, None).unwrap();
		assert_eq!(config.socket_addr(), "0.0.0.0:8080");
		assert!(config.sso.mode.is_none());
		assert!(!config.subscription.active);
	}

	#[test]
	fn test_saml_requires_provider_settings() {
		let layer = ServerConfigLayer {
			sso: Some(SsoConfigLayer {
				mode: Some(SsoMode::Saml),
				auth_server_url: Some("https://auth.example.com".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer, None, None).unwrap_err();
		assert!(err.to_string().contains("saml_url"));
	}

	#[test]
	fn test_google_requires_auth_server() {
		let layer = ServerConfigLayer {
			sso: Some(SsoConfigLayer {
				mode: Some(SsoMode::Google),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(matches!(
			finalize(layer, None, None),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn test_duo_needs_no_auth_server() {
		let layer = ServerConfigLayer {
			sso: Some(SsoConfigLayer {
				mode: Some(SsoMode::Duo),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(layer, None, None).is_ok());
	}

	#[test]
	fn test_nonce_retention_must_cover_window() {
		let layer = ServerConfigLayer {
			auth: Some(AuthConfigLayer {
				sync_time_window_secs: Some(600),
				..Default::default()
			}),
			..Default::default()
		};
		let err = finalize(layer, None, None).unwrap_err();
		assert!(err.to_string().contains("nonce_retention_secs"));
	}

	#[test]
	fn test_short_id_length_floor() {
		let layer = ServerConfigLayer {
			auth: Some(AuthConfigLayer {
				short_id_length: Some(4),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(layer, None, None).is_err());
	}

	#[test]
	fn test_socket_addr() {
		let config = ServerConfig {
			http: HttpConfig {
				host: "127.0.0.1".to_string(),
				port: 9000,
				base_url: "http://localhost:9000".to_string(),
			},
			..Default::default()
		};
		assert_eq!(config.socket_addr(), "127.0.0.1:9000");
	}
}
