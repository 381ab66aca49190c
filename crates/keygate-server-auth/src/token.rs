// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Random tokens for links, SSO correlation and new-user secrets.

use rand::distributions::{Alphanumeric, Uniform};
use rand::Rng;

/// Length of SSO `state` and `secret` values.
pub const SSO_TOKEN_LEN: usize = 64;

/// Length of the download token on a key link.
pub const KEY_ID_LEN: usize = 32;

const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Random alphanumeric string from the OS-seeded thread RNG.
pub fn random_token(len: usize) -> String {
	rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(len)
		.map(char::from)
		.collect()
}

/// Random RFC 4648 base32 string, suitable as a TOTP secret.
pub fn random_base32(len: usize) -> String {
	let dist = Uniform::from(0..BASE32_ALPHABET.len());
	let mut rng = rand::thread_rng();
	(0..len)
		.map(|_| BASE32_ALPHABET[rng.sample(dist)] as char)
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn token_has_requested_length() {
		assert_eq!(random_token(SSO_TOKEN_LEN).len(), 64);
		assert_eq!(random_token(0).len(), 0);
	}

	#[test]
	fn base32_alphabet_only() {
		let s = random_base32(16);
		assert_eq!(s.len(), 16);
		assert!(s.bytes().all(|b| BASE32_ALPHABET.contains(&b)));
	}
}
