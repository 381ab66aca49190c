// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP handlers.

pub mod health;
pub mod keys;
pub mod sso;
pub mod sync;

use std::str::FromStr;

use keygate_server_auth::{OrgId, Organization, User, UserId};

use crate::api::AppState;
use crate::error::ServerError;

/// Unparseable ids in a path look like any other unknown resource.
pub(crate) fn parse_id<T: FromStr>(raw: &str) -> Result<T, ServerError> {
	raw.parse().map_err(|_| ServerError::NotFound)
}

pub(crate) async fn load_owner(
	state: &AppState,
	org_id: &OrgId,
	user_id: &UserId,
) -> Result<(Organization, User), ServerError> {
	let org = state
		.directory
		.get_org_by_id(org_id)
		.await?
		.ok_or(ServerError::NotFound)?;
	let user = state
		.directory
		.get_user_by_id(&org.id, user_id)
		.await?
		.ok_or(ServerError::NotFound)?;
	Ok((org, user))
}
