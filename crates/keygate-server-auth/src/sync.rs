// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Verification of HMAC-signed device sync requests.
//!
//! A device signs
//!
//! ```text
//! Auth-Token & Auth-Timestamp & Auth-Nonce[..32] & METHOD & /path [& body]
//! ```
//!
//! with its user's sync secret (HMAC-SHA-512, standard base64) and sends the
//! result as `Auth-Signature`. A verified request consumes its (token, nonce)
//! pair in the [`NonceLedger`], so an identical resubmission is refused.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use keygate_server_config::{AuthConfig, NonceDurability};
use tracing::{debug, instrument, warn};

use crate::error::AuthError;
use crate::signing::{canonical_signing_string, sign_sync, signatures_match, truncate_nonce};
use crate::store::{NonceLedger, NonceOutcome, SyncSecretLookup};
use crate::types::{AuthNonce, OrgId, UserId};

pub const HEADER_TOKEN: &str = "auth-token";
pub const HEADER_TIMESTAMP: &str = "auth-timestamp";
pub const HEADER_NONCE: &str = "auth-nonce";
pub const HEADER_SIGNATURE: &str = "auth-signature";

/// Everything about an inbound sync request that takes part in verification.
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
	pub headers: &'a HeaderMap,
	pub method: &'a str,
	pub path: &'a str,
	pub body: &'a [u8],
	pub org_id: OrgId,
	pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
	pub org_id: OrgId,
	pub user_id: UserId,
	pub token: String,
}

pub struct SyncAuthenticator {
	window_secs: u64,
	max_signing_len: usize,
	durability: NonceDurability,
	ledger: Arc<dyn NonceLedger>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers
		.get(name)
		.and_then(|v| v.to_str().ok())
		.filter(|v| !v.is_empty())
}

impl SyncAuthenticator {
	pub fn new(config: &AuthConfig, ledger: Arc<dyn NonceLedger>) -> Self {
		Self {
			window_secs: config.sync_time_window_secs,
			max_signing_len: config.sync_signature_max_len,
			durability: config.nonce_durability,
			ledger,
		}
	}

	/// Verify a signed sync request.
	///
	/// Every rejection is [`AuthError::Unauthorized`]; the reason is only
	/// visible in debug logs.
	#[instrument(skip(self, request, secrets), fields(org_id = %request.org_id, user_id = %request.user_id))]
	pub async fn verify(
		&self,
		request: &SyncRequest<'_>,
		now: DateTime<Utc>,
		secrets: &dyn SyncSecretLookup,
	) -> Result<VerifiedIdentity, AuthError> {
		let (Some(token), Some(timestamp), Some(nonce), Some(signature)) = (
			header(request.headers, HEADER_TOKEN),
			header(request.headers, HEADER_TIMESTAMP),
			header(request.headers, HEADER_NONCE),
			header(request.headers, HEADER_SIGNATURE),
		) else {
			debug!("sync rejected: missing auth header");
			return Err(AuthError::Unauthorized);
		};

		let nonce = truncate_nonce(nonce);

		let Ok(ts) = timestamp.parse::<i64>() else {
			debug!("sync rejected: malformed timestamp");
			return Err(AuthError::Unauthorized);
		};
		if ts.abs_diff(now.timestamp()) > self.window_secs {
			debug!(skew = ts.saturating_sub(now.timestamp()), "sync rejected: timestamp outside window");
			return Err(AuthError::Unauthorized);
		}

		let signing_string = canonical_signing_string(
			token,
			timestamp,
			nonce,
			request.method,
			request.path,
			request.body,
		);
		if signing_string.len() > self.max_signing_len {
			debug!(len = signing_string.len(), "sync rejected: signing string too long");
			return Err(AuthError::Unauthorized);
		}

		let Some(secret) = secrets
			.sync_secret(&request.org_id, &request.user_id)
			.await?
		else {
			debug!("sync rejected: unknown principal or no sync secret");
			return Err(AuthError::Unauthorized);
		};

		let expected = sign_sync(secret.expose().as_bytes(), &signing_string)
			.map_err(|_| AuthError::Unauthorized)?;
		if !signatures_match(signature, &expected) {
			debug!("sync rejected: signature mismatch");
			return Err(AuthError::Unauthorized);
		}

		let record = AuthNonce {
			token: token.to_string(),
			nonce: nonce.to_string(),
			timestamp: now,
		};
		match self.ledger.record(&record, self.durability).await? {
			NonceOutcome::Accepted => {}
			NonceOutcome::ReplayDetected => {
				warn!("sync rejected: nonce replay");
				return Err(AuthError::Unauthorized);
			}
		}

		Ok(VerifiedIdentity {
			org_id: request.org_id,
			user_id: request.user_id,
			token: token.to_string(),
		})
	}
}
