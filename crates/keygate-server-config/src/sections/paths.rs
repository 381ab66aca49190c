// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Filesystem locations.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct PathsConfig {
	/// Directory holding prebuilt profile archives and per-server confs.
	pub profiles_dir: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		PathsConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfigLayer {
	#[serde(default)]
	pub profiles_dir: Option<PathBuf>,
}

impl PathsConfigLayer {
	pub fn merge(&mut self, other: PathsConfigLayer) {
		if other.profiles_dir.is_some() {
			self.profiles_dir = other.profiles_dir;
		}
	}

	pub fn finalize(self) -> PathsConfig {
		PathsConfig {
			profiles_dir: self
				.profiles_dir
				.unwrap_or_else(|| PathBuf::from("./profiles")),
		}
	}
}
