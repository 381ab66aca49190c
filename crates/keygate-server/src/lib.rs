// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP server for Keygate key links, device sync and SSO.
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /key/{key_id}.tar\|.zip`, `GET /key_onc/{key_id}.zip` | [`routes::keys::link_archive`], [`routes::keys::link_onc_archive`] |
//! | `GET /key/{key_id}/{server_id}.key` | [`routes::keys::two_segment_key`] |
//! | `GET /key/{org}/{user}[.tar\|.zip]`, `GET /key_onc/{org}/{user}.zip` | admin, [`routes::keys::two_segment_key`], [`routes::keys::admin_onc_archive`] |
//! | `GET\|DELETE /k/{short_id}`, `GET /ku/{short_id}` | [`routes::keys`] |
//! | `GET /key/{org}/{user}/{server}/{hash}` | [`routes::sync::sync_profile`] |
//! | `GET /sso/request`, `GET /sso/callback`, `POST /sso/authenticate` | [`routes::sso`] |
//! | `GET /health` | [`routes::health::health_check`] |

pub mod admin;
pub mod api;
pub mod client_info;
pub mod error;
pub mod housekeeping;
pub mod key_page;
pub mod profiles;
pub mod routes;

pub use api::{create_app_state, create_app_state_with, create_router, AppState, Collaborators};
pub use error::ServerError;
pub use housekeeping::Housekeeper;
pub use keygate_server_config::ServerConfig;
pub use keygate_server_db as db;
pub use profiles::{ArchiveKind, FsProfileStore, ProfileError, ProfileStore, ServerProfile};
