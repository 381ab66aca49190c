// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The landing page behind `/k/{short_id}`.

use std::fmt::Write;

use keygate_server_auth::{KeyLink, Organization, Server, User};

pub struct KeyPage<'a> {
	pub org: &'a Organization,
	pub user: &'a User,
	pub link: &'a KeyLink,
	pub servers: &'a [Server],
	/// Offer the Chromebook bundle.
	pub show_onc: bool,
}

fn escape_html(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	for c in raw.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#x27;"),
			c => out.push(c),
		}
	}
	out
}

impl KeyPage<'_> {
	fn otp_secret(&self) -> Option<&str> {
		if !self.org.otp_auth {
			return None;
		}
		self.user
			.otp_secret
			.as_ref()
			.map(|s| s.expose().as_str())
			.filter(|s| !s.is_empty())
	}

	pub fn render(&self) -> String {
		let descriptor = self.link.descriptor();
		let title = escape_html(&format!("{} - {}", self.org.name, self.user.name));

		let mut html = String::new();
		// Writing into a String cannot fail.
		let _ = write!(
			html,
			"<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<ul class=\"downloads\">\n<li><a href=\"{tar}\">Download Profiles (tar)</a></li>\n<li><a href=\"{zip}\">Download Profiles (zip)</a></li>\n",
			tar = escape_html(&descriptor.key_url),
			zip = escape_html(&descriptor.key_zip_url),
		);

		if self.show_onc {
			let _ = writeln!(
				html,
				"<li><a href=\"{}\">Download Chromebook Profiles</a></li>",
				escape_html(&descriptor.key_onc_url)
			);
		}

		for server in self.servers {
			let _ = writeln!(
				html,
				"<li><a href=\"/key/{}/{}.key\">Download Profile ({})</a></li>",
				escape_html(&self.link.key_id),
				server.id,
				escape_html(&server.name)
			);
		}
		html.push_str("</ul>\n");

		if let Some(secret) = self.otp_secret() {
			let otp_url = format!(
				"otpauth://totp/{}@{}?secret={}",
				self.user.name, self.org.name, secret
			);
			let _ = write!(
				html,
				"<div class=\"otp\">\n<p>OTP secret: <code>{}</code></p>\n<p><a href=\"{url}\">{url}</a></p>\n</div>\n",
				escape_html(secret),
				url = escape_html(&otp_url),
			);
		}

		let _ = write!(
			html,
			"<p class=\"short-id\">{}</p>\n<p class=\"profile-uri\">{}</p>\n</body>\n</html>\n",
			escape_html(&self.link.short_id),
			escape_html(&descriptor.uri_url),
		);
		html
	}
}
