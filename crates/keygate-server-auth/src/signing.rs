// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HMAC-SHA-512 signatures for device sync requests and SSO callbacks.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::error::SigningError;

type HmacSha512 = Hmac<Sha512>;

/// Nonces longer than this are cut before they are signed or recorded.
pub const NONCE_MAX_LEN: usize = 32;

/// First [`NONCE_MAX_LEN`] characters of `nonce`.
pub fn truncate_nonce(nonce: &str) -> &str {
	match nonce.char_indices().nth(NONCE_MAX_LEN) {
		Some((idx, _)) => &nonce[..idx],
		None => nonce,
	}
}

/// `token&timestamp&nonce&method&path`, plus `&body` when the body is non-empty.
pub fn canonical_signing_string(
	token: &str,
	timestamp: &str,
	nonce: &str,
	method: &str,
	path: &str,
	body: &[u8],
) -> Vec<u8> {
	let mut out = Vec::with_capacity(
		token.len() + timestamp.len() + nonce.len() + method.len() + path.len() + body.len() + 5,
	);
	for (i, part) in [token, timestamp, nonce, method, path].iter().enumerate() {
		if i > 0 {
			out.push(b'&');
		}
		out.extend_from_slice(part.as_bytes());
	}
	if !body.is_empty() {
		out.push(b'&');
		out.extend_from_slice(body);
	}
	out
}

fn hmac_sha512(secret: &[u8], message: &[u8]) -> Result<Vec<u8>, SigningError> {
	let mut mac = HmacSha512::new_from_slice(secret).map_err(|_| SigningError::InvalidKey)?;
	mac.update(message);
	Ok(mac.finalize().into_bytes().to_vec())
}

/// Standard base64 of the HMAC, as sent in `Auth-Signature`.
pub fn sign_sync(secret: &[u8], message: &[u8]) -> Result<String, SigningError> {
	Ok(STANDARD.encode(hmac_sha512(secret, message)?))
}

/// URL-safe base64 (padded) of the HMAC, as sent in the callback `sig`.
pub fn sign_callback(secret: &[u8], query: &[u8]) -> Result<String, SigningError> {
	Ok(URL_SAFE.encode(hmac_sha512(secret, query)?))
}

/// Constant-time comparison of two encoded signatures.
pub fn signatures_match(provided: &str, expected: &str) -> bool {
	let provided = provided.as_bytes();
	let expected = expected.as_bytes();
	if provided.len() != expected.len() {
		return false;
	}
	provided.ct_eq(expected).into()
}


#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn nonces_sharing_a_prefix_sign_identically(
			prefix in "[a-zA-Z0-9]{32}",
			tail_a in "[a-zA-Z0-9]{1,16}",
			tail_b in "[a-zA-Z0-9]{1,16}",
		) {
			let a = format!("{prefix}{tail_a}");
			let b = format!("{prefix}{tail_b}");
			prop_assert_eq!(truncate_nonce(&a), truncate_nonce(&b));

			let sa = canonical_signing_string("t", "1", truncate_nonce(&a), "GET", "/p", b"");
			let sb = canonical_signing_string("t", "1", truncate_nonce(&b), "GET", "/p", b"");
			prop_assert_eq!(
				sign_sync(b"k", &sa).unwrap(),
				sign_sync(b"k", &sb).unwrap()
			);
		}

		#[test]
		fn signature_verifies_against_itself(
			secret in proptest::collection::vec(any::<u8>(), 1..64),
			message in proptest::collection::vec(any::<u8>(), 0..256),
		) {
			let sig = sign_sync(&secret, &message).unwrap();
			prop_assert!(signatures_match(&sig, &sign_sync(&secret, &message).unwrap()));
		}

		#[test]
		fn body_changes_signature(body in "[a-z]{1,32}") {
			let with = canonical_signing_string("t", "1", "n", "POST", "/p", body.as_bytes());
			let without = canonical_signing_string("t", "1", "n", "POST", "/p", b"");
			prop_assert_ne!(
				sign_sync(b"k", &with).unwrap(),
				sign_sync(b"k", &without).unwrap()
			);
		}
	}
}
