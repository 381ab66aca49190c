// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Find-or-create of users arriving through SSO.

use std::sync::Arc;

use keygate_common_secret::SecretString;
use tracing::{info, instrument};

use crate::error::{AuthError, StoreError};
use crate::store::{Directory, EventPublisher};
use crate::token::{random_base32, random_token};
use crate::types::{AuthType, DomainEvent, NewUser, Organization, User};

const SYNC_SECRET_LEN: usize = 32;
const OTP_SECRET_LEN: usize = 16;

#[derive(Clone)]
pub struct UserProvisioner {
	directory: Arc<dyn Directory>,
	events: Arc<dyn EventPublisher>,
}

impl UserProvisioner {
	pub fn new(directory: Arc<dyn Directory>, events: Arc<dyn EventPublisher>) -> Self {
		Self { directory, events }
	}

	/// Return the user named `username` in `org`, creating it if needed and
	/// bringing its auth type in line with `auth_type`.
	///
	/// Creation publishes the organization, user and server change events
	/// before returning.
	#[instrument(skip(self, org, email), fields(org_id = %org.id))]
	pub async fn ensure_user(
		&self,
		org: &Organization,
		username: &str,
		email: Option<&str>,
		auth_type: AuthType,
	) -> Result<User, AuthError> {
		if let Some(user) = self.directory.user_by_name(&org.id, username).await? {
			return self.align_auth_type(user, auth_type).await;
		}

		let new = NewUser {
			org_id: org.id,
			name: username.to_string(),
			email: email.map(str::to_string),
			auth_type,
			sync_secret: SecretString::new(random_token(SYNC_SECRET_LEN)),
			otp_secret: SecretString::new(random_base32(OTP_SECRET_LEN)),
		};

		match self.directory.create_user(&new).await {
			Ok(user) => {
				info!(user_id = %user.id, %auth_type, "provisioned user from sso");
				self.events.publish(DomainEvent::OrgsUpdated).await?;
				self.events.publish(DomainEvent::UsersUpdated(org.id)).await?;
				self.events.publish(DomainEvent::ServersUpdated).await?;
				Ok(user)
			}
			Err(StoreError::Conflict(_)) => {
				// Lost a creation race with another callback for the same name.
				let user = self
					.directory
					.user_by_name(&org.id, username)
					.await?
					.ok_or(AuthError::NotFound)?;
				self.align_auth_type(user, auth_type).await
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn align_auth_type(&self, mut user: User, auth_type: AuthType) -> Result<User, AuthError> {
		if user.auth_type != auth_type {
			self.directory.update_auth_type(&user.id, auth_type).await?;
			info!(user_id = %user.id, from = %user.auth_type, to = %auth_type, "updated user auth type");
			user.auth_type = auth_type;
		}
		Ok(user)
	}
}
