// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Failures reported by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
	/// A uniqueness constraint rejected the write.
	#[error("conflict: {0}")]
	Conflict(String),

	#[error("storage backend error: {0}")]
	Backend(String),
}

/// Failures reported by the identity provider or second factor.
#[derive(Debug, Error)]
pub enum ProviderError {
	/// The provider refused the request outright (HTTP 401).
	#[error("provider rejected the request")]
	Rejected,

	#[error("provider returned status {status}")]
	Status { status: u16 },

	#[error("provider transport error: {0}")]
	Transport(String),

	#[error("invalid provider response: {0}")]
	InvalidResponse(String),
}

/// Outcome classes surfaced to the HTTP layer.
///
/// `Unauthorized` covers bad signatures, stale timestamps, replayed nonces and
/// failed provider verification alike. Callers must not tell them apart.
#[derive(Debug, Error)]
pub enum AuthError {
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

	#[error(transparent)]
	Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SigningError {
	#[error("invalid HMAC key")]
	InvalidKey,
}
