// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use keygate_server_auth::AuthError;
use keygate_server_db::DbError;
use serde::Serialize;
use tracing::error;

use crate::profiles::ProfileError;

/// Non-standard status for "feature not entitled".
pub const STATUS_NOT_ENTITLED: u16 = 480;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("not found")]
	NotFound,
	#[error("unauthorized")]
	Unauthorized,
	#[error("feature disabled")]
	FeatureDisabled,
	#[error("missing required field: {0}")]
	BadRequest(&'static str),
	#[error("feature not entitled")]
	NotEntitled,
	#[error("upstream error: {0}")]
	Upstream(String),
	#[error("internal error: {0}")]
	Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: &'static str,
}

impl ServerError {
	fn status_and_code(&self) -> (StatusCode, &'static str) {
		match self {
			Self::NotFound => (StatusCode::NOT_FOUND, "not_found"),
			Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
			Self::FeatureDisabled => (StatusCode::METHOD_NOT_ALLOWED, "feature_disabled"),
			Self::BadRequest(_) => (StatusCode::NOT_ACCEPTABLE, "bad_request"),
			Self::NotEntitled => (
				StatusCode::from_u16(STATUS_NOT_ENTITLED).unwrap_or(StatusCode::FORBIDDEN),
				"not_entitled",
			),
			Self::Upstream(_) | Self::Internal(_) => {
				(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
			}
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		if let Self::Upstream(detail) | Self::Internal(detail) = &self {
			error!(error = %detail, "request failed");
		}
		let (status, code) = self.status_and_code();
		(status, Json(ErrorBody { error: code })).into_response()
	}
}

impl From<AuthError> for ServerError {
	fn from(e: AuthError) -> Self {
		match e {
			AuthError::NotFound => Self::NotFound,
			AuthError::Unauthorized => Self::Unauthorized,
			AuthError::FeatureDisabled => Self::FeatureDisabled,
			AuthError::BadRequest(field) => Self::BadRequest(field),
			AuthError::NotEntitled => Self::NotEntitled,
			AuthError::Upstream(msg) => Self::Upstream(msg),
			AuthError::Store(e) => Self::Internal(e.to_string()),
		}
	}
}

impl From<DbError> for ServerError {
	fn from(e: DbError) -> Self {
		Self::Internal(e.to_string())
	}
}

impl From<ProfileError> for ServerError {
	fn from(e: ProfileError) -> Self {
		match e {
			ProfileError::Missing { .. } => Self::NotFound,
			ProfileError::Io { .. } => Self::Internal(e.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn auth_errors_map_to_statuses() {
		let cases = [
			(AuthError::NotFound, 404),
			(AuthError::Unauthorized, 401),
			(AuthError::FeatureDisabled, 405),
			(AuthError::BadRequest("username"), 406),
			(AuthError::NotEntitled, 480),
			(AuthError::Upstream("boom".to_string()), 500),
		];
		for (err, expected) in cases {
			let response = ServerError::from(err).into_response();
			assert_eq!(response.status().as_u16(), expected);
		}
	}

	#[tokio::test]
	async fn internal_detail_not_in_body() {
		let response = ServerError::Internal("disk on fire at /var/lib".to_string()).into_response();
		let body = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		let text = String::from_utf8(body.to_vec()).unwrap();
		assert!(!text.contains("disk on fire"));
		assert!(text.contains("internal_error"));
	}

	#[test]
	fn missing_profile_is_not_found() {
		let err = ProfileError::Missing {
			what: "tar archive".to_string(),
		};
		assert!(matches!(ServerError::from(err), ServerError::NotFound));
	}
}
