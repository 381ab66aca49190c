// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keygate server binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use keygate_server::db::{NonceRepository, SsoStateRepository};
use keygate_server::{create_app_state, create_router, Housekeeper};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Keygate server - key links, device sync and SSO.
#[derive(Parser, Debug)]
#[command(name = "keygate-server", about = "Keygate key delivery server", version)]
struct Args {
	/// Config file to use instead of /etc/keygate/server.toml
	#[arg(long, env = "KEYGATE_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => keygate_server_config::load_config_with_file(path)?,
		None => keygate_server_config::load_config()?,
	};

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting keygate-server"
	);

	let pool = keygate_server::db::create_pool(&config.database.url).await?;
	keygate_server::db::run_migrations(&pool).await?;
	tracing::info!("database migrations complete");

	let housekeeping = Housekeeper::new(
		NonceRepository::new(pool.clone()),
		SsoStateRepository::new(pool.clone()),
		&config.housekeeping,
	)
	.spawn();

	let state = create_app_state(pool, &config).await;
	let app = create_router(state)
		.layer(TraceLayer::new_for_http())
		.layer(
			CorsLayer::new()
				.allow_origin(Any)
				.allow_methods(Any)
				.allow_headers(Any),
		);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	housekeeping.abort();
	tracing::info!("Server shutdown complete");
	Ok(())
}
