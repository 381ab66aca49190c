// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key link handlers: archive downloads, the landing page, profile URIs,
//! revocation and admin issuance.

use std::future::Future;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use keygate_server_auth::{KeyLink, KeyLinkDescriptor, LinkQuery, Organization, ServerId, User};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use crate::admin::require_admin;
use crate::api::AppState;
use crate::error::ServerError;
use crate::key_page::KeyPage;
use crate::profiles::{ArchiveKind, ProfileError};
use crate::routes::{load_owner, parse_id};

fn archive_target(target: &str) -> Option<(&str, ArchiveKind)> {
	if let Some(stem) = target.strip_suffix(".tar") {
		Some((stem, ArchiveKind::Tar))
	} else {
		target.strip_suffix(".zip").map(|stem| (stem, ArchiveKind::Zip))
	}
}

fn attachment_name(name: &str) -> String {
	name.chars()
		.map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
		.collect()
}

fn attachment(filename: &str, body: impl IntoResponse) -> Response {
	let disposition = format!("attachment; filename=\"{}\"", attachment_name(filename));
	let mut response = body.into_response();
	let headers = response.headers_mut();
	headers.insert(
		header::CONTENT_TYPE,
		HeaderValue::from_static("application/octet-stream"),
	);
	if let Ok(value) = HeaderValue::from_str(&disposition) {
		headers.insert(header::CONTENT_DISPOSITION, value);
	}
	response
}

/// Runs the checks that follow a successful token lookup. A NotFound from
/// them sleeps the same not-found delay as an unknown token.
async fn after_resolve<T>(
	state: &AppState,
	checks: impl Future<Output = Result<T, ServerError>>,
) -> Result<T, ServerError> {
	let result = checks.await;
	if matches!(result, Err(ServerError::NotFound)) {
		state.guard.delay_if_absent(false).await;
	}
	result
}

async fn resolve_owner(
	state: &AppState,
	query: LinkQuery,
	consume_one_time: bool,
) -> Result<(KeyLink, Organization, User), ServerError> {
	let link = state.links.resolve(&query, consume_one_time).await?;
	let (org, user) = after_resolve(state, load_owner(state, &link.org_id, &link.user_id)).await?;
	Ok((link, org, user))
}

async fn archive_response(
	state: &AppState,
	org: &Organization,
	user: &User,
	kind: ArchiveKind,
) -> Result<Response, ServerError> {
	let bytes = state.profiles.archive(org, user, kind).await?;
	Ok(attachment(
		&format!("{}.{}", user.name, kind.extension()),
		bytes,
	))
}

/// GET /key/{key_id}.tar | /key/{key_id}.zip
#[instrument(skip_all)]
pub async fn link_archive(
	State(state): State<AppState>,
	Path(target): Path<String>,
) -> Result<Response, ServerError> {
	let (key_id, kind) = archive_target(&target).ok_or(ServerError::NotFound)?;
	let (_, org, user) = resolve_owner(&state, LinkQuery::KeyId(key_id.to_string()), false).await?;
	after_resolve(&state, archive_response(&state, &org, &user, kind)).await
}

/// GET /key_onc/{key_id}.zip
#[instrument(skip_all)]
pub async fn link_onc_archive(
	State(state): State<AppState>,
	Path(target): Path<String>,
) -> Result<Response, ServerError> {
	let key_id = target.strip_suffix(".zip").ok_or(ServerError::NotFound)?;
	let (_, org, user) = resolve_owner(&state, LinkQuery::KeyId(key_id.to_string()), false).await?;
	after_resolve(&state, archive_response(&state, &org, &user, ArchiveKind::Onc)).await
}

/// GET /key/{a}/{b}, which carries three routes:
///
/// - `/key/{key_id}/{server_id}.key`: single server profile through a link
/// - `/key/{org_id}/{user_id}.tar|.zip`: admin archive download
/// - `/key/{org_id}/{user_id}`: admin link issuance
pub async fn two_segment_key(
	State(state): State<AppState>,
	Path((first, second)): Path<(String, String)>,
	headers: HeaderMap,
) -> Result<Response, ServerError> {
	if let Some(server_id) = second.strip_suffix(".key") {
		return server_profile(&state, &first, server_id).await;
	}

	require_admin(state.admin_token.as_ref(), &headers)?;
	match archive_target(&second) {
		Some((user_id, kind)) => admin_archive(&state, &first, user_id, kind).await,
		None => issue_link(&state, &first, &second)
			.await
			.map(|descriptor| Json(descriptor).into_response()),
	}
}

#[instrument(skip(state, key_id))]
async fn server_profile(
	state: &AppState,
	key_id: &str,
	server_id: &str,
) -> Result<Response, ServerError> {
	let (_, org, user) = resolve_owner(state, LinkQuery::KeyId(key_id.to_string()), false).await?;
	after_resolve(state, async {
		let server_id: ServerId = parse_id(server_id)?;
		let server = state
			.directory
			.list_servers(&org.id)
			.await?
			.into_iter()
			.find(|s| s.id == server_id)
			.ok_or(ServerError::NotFound)?;

		let profile = state.profiles.server_profile(&org, &user, &server).await?;
		Ok(attachment(&profile.name, profile.conf))
	})
	.await
}

#[instrument(skip(state))]
async fn admin_archive(
	state: &AppState,
	org_id: &str,
	user_id: &str,
	kind: ArchiveKind,
) -> Result<Response, ServerError> {
	let (org, user) = load_owner(state, &parse_id(org_id)?, &parse_id(user_id)?).await?;
	archive_response(state, &org, &user, kind).await
}

#[instrument(skip(state))]
async fn issue_link(
	state: &AppState,
	org_id: &str,
	user_id: &str,
) -> Result<KeyLinkDescriptor, ServerError> {
	let (org, user) = load_owner(state, &parse_id(org_id)?, &parse_id(user_id)?).await?;
	let link = state.links.issue(org.id, user.id, false).await?;
	info!(link_id = %link.id, user_id = %user.id, "issued key link");
	Ok(link.descriptor())
}

/// GET /key_onc/{org_id}/{user_id}.zip
pub async fn admin_onc_archive(
	State(state): State<AppState>,
	Path((org_id, target)): Path<(String, String)>,
	headers: HeaderMap,
) -> Result<Response, ServerError> {
	require_admin(state.admin_token.as_ref(), &headers)?;
	let user_id = target.strip_suffix(".zip").ok_or(ServerError::NotFound)?;
	admin_archive(&state, &org_id, user_id, ArchiveKind::Onc).await
}

/// GET /k/{short_id}
#[instrument(skip_all)]
pub async fn landing_page(
	State(state): State<AppState>,
	Path(short_id): Path<String>,
) -> Result<Html<String>, ServerError> {
	let (link, org, user) = resolve_owner(&state, LinkQuery::ShortId(short_id), true).await?;
	let servers = state.directory.list_servers(&org.id).await?;

	Ok(Html(
		KeyPage {
			org: &org,
			user: &user,
			link: &link,
			servers: &servers,
			show_onc: state.subscription_active,
		}
		.render(),
	))
}

/// DELETE /k/{short_id}
#[instrument(skip_all)]
pub async fn revoke_link(
	State(state): State<AppState>,
	Path(short_id): Path<String>,
) -> Result<Json<Value>, ServerError> {
	state.links.revoke(&short_id).await?;
	Ok(Json(json!({})))
}

/// GET /ku/{short_id}: server profile name to conf.
#[instrument(skip_all)]
pub async fn profile_uris(
	State(state): State<AppState>,
	Path(short_id): Path<String>,
) -> Result<Json<Map<String, Value>>, ServerError> {
	let (_, org, user) = resolve_owner(&state, LinkQuery::ShortId(short_id), true).await?;

	let mut confs = Map::new();
	for server in state.directory.list_servers(&org.id).await? {
		match state.profiles.server_profile(&org, &user, &server).await {
			Ok(profile) => {
				confs.insert(profile.name, Value::String(profile.conf));
			}
			Err(ProfileError::Missing { .. }) => {
				debug!(server_id = %server.id, "no profile for server, skipping");
			}
			Err(e) => return Err(e.into()),
		}
	}
	Ok(Json(confs))
}
