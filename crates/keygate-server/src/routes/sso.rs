// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSO request, callback and direct second-factor login.

use axum::extract::{RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use keygate_server_auth::{ProvisionedUser, RedirectTarget, SsoCallback};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::api::AppState;
use crate::client_info::ClientAddr;
use crate::error::ServerError;

fn found(location: &str) -> Response {
	(StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn view_url(state: &AppState, provisioned: &ProvisionedUser) -> String {
	format!("{}{}", state.base_url, provisioned.link.descriptor().view_url)
}

/// GET /sso/request
#[instrument(skip_all)]
pub async fn sso_request(State(state): State<AppState>) -> Result<Response, ServerError> {
	let callback_url = format!("{}/sso/callback", state.base_url);
	match state.sso.begin(&callback_url).await? {
		RedirectTarget::Url(url) => Ok(found(&url)),
		RedirectTarget::Html(body) => Ok(Html(body).into_response()),
	}
}

/// GET /sso/callback?...&sig=...
#[instrument(skip_all)]
pub async fn sso_callback(
	State(state): State<AppState>,
	ClientAddr(remote_addr): ClientAddr,
	RawQuery(query): RawQuery,
) -> Result<Response, ServerError> {
	let callback = SsoCallback::from_raw_query(query.as_deref().unwrap_or_default());
	let provisioned = state.sso.complete(&callback, remote_addr).await?;
	info!(user_id = %provisioned.user.id, org_id = %provisioned.org.id, "sso login completed");
	Ok(found(&view_url(&state, &provisioned)))
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
	#[serde(default)]
	pub username: String,
}

/// POST /sso/authenticate: responds with the landing page URL as text.
#[instrument(skip_all)]
pub async fn sso_authenticate(
	State(state): State<AppState>,
	ClientAddr(remote_addr): ClientAddr,
	Json(body): Json<AuthenticateRequest>,
) -> Result<String, ServerError> {
	let provisioned = state
		.sso
		.authenticate_second_factor(&body.username, remote_addr)
		.await?;
	info!(user_id = %provisioned.user.id, org_id = %provisioned.org.id, "second factor login completed");
	Ok(view_url(&state, &provisioned))
}
