// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence seams. Every single-use guarantee in this crate is delegated to
//! one atomic operation on one of these traits.

use async_trait::async_trait;
use keygate_common_secret::SecretString;
use keygate_server_config::NonceDurability;

use crate::error::StoreError;
use crate::types::{
	AuthNonce, AuthType, DomainEvent, KeyLink, LinkId, LinkQuery, NewUser, OrgId, Organization,
	Server, SsoState, User, UserId,
};

#[async_trait]
pub trait LinkStore: Send + Sync {
	/// Insert a new link. A clash on either token is a [`StoreError::Conflict`].
	async fn insert(&self, link: &KeyLink) -> Result<(), StoreError>;

	async fn find(&self, query: &LinkQuery) -> Result<Option<KeyLink>, StoreError>;

	/// Compare-and-set `unused -> used` keyed on id, short id and the current
	/// state. Returns `false` when another consumer got there first.
	async fn mark_used(&self, id: &LinkId, short_id: &str) -> Result<bool, StoreError>;

	/// Unconditional delete. Returns whether a row was removed.
	async fn delete_by_short_id(&self, short_id: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceOutcome {
	Accepted,
	ReplayDetected,
}

#[async_trait]
pub trait NonceLedger: Send + Sync {
	/// Insert the pair. A uniqueness violation is reported as
	/// [`NonceOutcome::ReplayDetected`], never as an error.
	async fn record(
		&self,
		nonce: &AuthNonce,
		durability: NonceDurability,
	) -> Result<NonceOutcome, StoreError>;
}

#[async_trait]
pub trait SsoStateStore: Send + Sync {
	async fn insert(&self, state: &SsoState) -> Result<(), StoreError>;

	/// Find and delete in one step.
	async fn take(&self, state: &str) -> Result<Option<SsoState>, StoreError>;
}

/// Organization, user and server lookups needed by the flows.
#[async_trait]
pub trait Directory: Send + Sync {
	async fn org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, StoreError>;

	async fn org_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError>;

	async fn user_by_id(&self, org_id: &OrgId, id: &UserId) -> Result<Option<User>, StoreError>;

	async fn user_by_name(&self, org_id: &OrgId, name: &str) -> Result<Option<User>, StoreError>;

	/// Create a user. A duplicate name within the organization is a
	/// [`StoreError::Conflict`].
	async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;

	async fn update_auth_type(&self, id: &UserId, auth_type: AuthType) -> Result<(), StoreError>;

	async fn servers_for_org(&self, org_id: &OrgId) -> Result<Vec<Server>, StoreError>;
}

/// Resolves the shared secret a device signs sync requests with.
#[async_trait]
pub trait SyncSecretLookup: Send + Sync {
	/// `None` when the organization, the user or the secret is missing.
	async fn sync_secret(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
	) -> Result<Option<SecretString>, StoreError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
	async fn publish(&self, event: DomainEvent) -> Result<(), StoreError>;
}
