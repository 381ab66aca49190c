// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bearer-token guard for the administrative endpoints.
//!
//! Admin and public routes share path shapes (`/key/{a}/{b}`), so the check
//! runs inside the handler once the route is known to be administrative.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use keygate_common_secret::SecretString;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::ServerError;

/// Fails closed when no admin token is configured.
pub fn require_admin(expected: Option<&SecretString>, headers: &HeaderMap) -> Result<(), ServerError> {
	let Some(expected) = expected else {
		warn!("admin auth failed: no token configured");
		return Err(ServerError::Unauthorized);
	};

	let Some(auth_value) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) else {
		warn!("admin auth failed: missing Authorization header");
		return Err(ServerError::Unauthorized);
	};

	let Some(token) = auth_value.strip_prefix("Bearer ").map(str::trim) else {
		warn!("admin auth failed: invalid Authorization format");
		return Err(ServerError::Unauthorized);
	};

	let expected_bytes = expected.expose().as_bytes();
	let token_bytes = token.as_bytes();

	if expected_bytes.len() != token_bytes.len() {
		warn!("admin auth failed: token length mismatch");
		return Err(ServerError::Unauthorized);
	}

	if expected_bytes.ct_eq(token_bytes).into() {
		Ok(())
	} else {
		warn!("admin auth failed: invalid token");
		Err(ServerError::Unauthorized)
	}
}
