// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signed device sync.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use keygate_server_auth::{OrgId, ServerId, SyncRequest, UserId};
use tracing::{debug, instrument};

use crate::api::AppState;
use crate::error::ServerError;
use crate::profiles::sync_conf;
use crate::routes::{load_owner, parse_id};

/// GET /key/{org_id}/{user_id}/{server_id}/{key_hash}
///
/// Returns the server profile when the device's copy is stale, an empty
/// body when it is current.
#[instrument(skip_all)]
pub async fn sync_profile(
	State(state): State<AppState>,
	Path((org_id, user_id, server_id, key_hash)): Path<(String, String, String, String)>,
	method: Method,
	uri: Uri,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Response, ServerError> {
	state.guard.jitter().await;

	if !state.subscription_active {
		return Err(ServerError::NotEntitled);
	}

	// An unknown principal fails the same way as a bad signature.
	let (Ok(org_id), Ok(user_id)) = (org_id.parse::<OrgId>(), user_id.parse::<UserId>()) else {
		debug!("sync rejected: malformed principal ids");
		return Err(ServerError::Unauthorized);
	};

	let request = SyncRequest {
		headers: &headers,
		method: method.as_str(),
		path: uri.path(),
		body: &body,
		org_id,
		user_id,
	};
	state
		.sync
		.verify(&request, Utc::now(), state.directory.as_ref())
		.await?;

	let (org, user) = load_owner(&state, &org_id, &user_id).await?;
	let server_id: ServerId = parse_id(&server_id)?;
	let server = state
		.directory
		.list_servers(&org.id)
		.await?
		.into_iter()
		.find(|s| s.id == server_id)
		.ok_or(ServerError::NotFound)?;

	let conf = sync_conf(state.profiles.as_ref(), &org, &user, &server, &key_hash).await?;
	Ok(conf.unwrap_or_default().into_response())
}
