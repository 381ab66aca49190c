// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory implementations of the store and provider traits for unit tests.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use keygate_common_secret::SecretString;
use keygate_server_config::NonceDurability;

use crate::error::{ProviderError, StoreError};
use crate::provider::{
	IdentityProvider, RedirectTarget, SecondFactor, SecondFactorOutcome, SsoRequest, Verification,
};
use crate::store::{
	Directory, EventPublisher, LinkStore, NonceLedger, NonceOutcome, SsoStateStore,
	SyncSecretLookup,
};
use crate::types::{
	AuthNonce, AuthType, DomainEvent, KeyLink, LinkId, LinkQuery, NewUser, OneTime, OrgId,
	Organization, Server, SsoState, User, UserId,
};

#[derive(Default)]
pub struct MemoryLinkStore {
	links: Mutex<Vec<KeyLink>>,
	conflicts_pending: AtomicUsize,
	fail_mark_used: AtomicBool,
	mark_used_calls: AtomicUsize,
}

impl MemoryLinkStore {
	pub fn conflict_next_inserts(&self, n: usize) {
		self.conflicts_pending.store(n, Ordering::SeqCst);
	}

	pub fn fail_next_mark_used(&self) {
		self.fail_mark_used.store(true, Ordering::SeqCst);
	}

	pub fn mark_used_calls(&self) -> usize {
		self.mark_used_calls.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
	async fn insert(&self, link: &KeyLink) -> Result<(), StoreError> {
		if self
			.conflicts_pending
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok()
		{
			return Err(StoreError::Conflict("short_id".to_string()));
		}
		let mut links = self.links.lock().unwrap();
		if links
			.iter()
			.any(|l| l.short_id == link.short_id || l.key_id == link.key_id)
		{
			return Err(StoreError::Conflict("short_id".to_string()));
		}
		links.push(link.clone());
		Ok(())
	}

	async fn find(&self, query: &LinkQuery) -> Result<Option<KeyLink>, StoreError> {
		let links = self.links.lock().unwrap();
		Ok(links
			.iter()
			.find(|l| match query {
				LinkQuery::ShortId(s) => &l.short_id == s,
				LinkQuery::KeyId(k) => &l.key_id == k,
			})
			.cloned())
	}

	async fn mark_used(&self, id: &LinkId, short_id: &str) -> Result<bool, StoreError> {
		self.mark_used_calls.fetch_add(1, Ordering::SeqCst);
		if self.fail_mark_used.swap(false, Ordering::SeqCst) {
			return Ok(false);
		}
		let mut links = self.links.lock().unwrap();
		match links.iter_mut().find(|l| {
			&l.id == id && l.short_id == short_id && l.one_time == Some(OneTime::Unused)
		}) {
			Some(link) => {
				link.one_time = Some(OneTime::Used);
				Ok(true)
			}
			None => Ok(false),
		}
	}

	async fn delete_by_short_id(&self, short_id: &str) -> Result<bool, StoreError> {
		let mut links = self.links.lock().unwrap();
		let before = links.len();
		links.retain(|l| l.short_id != short_id);
		Ok(links.len() != before)
	}
}

#[derive(Default)]
pub struct MemoryNonceLedger {
	seen: Mutex<HashSet<(String, String)>>,
	durabilities: Mutex<Vec<NonceDurability>>,
}

impl MemoryNonceLedger {
	pub fn len(&self) -> usize {
		self.seen.lock().unwrap().len()
	}

	pub fn durabilities(&self) -> Vec<NonceDurability> {
		self.durabilities.lock().unwrap().clone()
	}
}

#[async_trait]
impl NonceLedger for MemoryNonceLedger {
	async fn record(
		&self,
		nonce: &AuthNonce,
		durability: NonceDurability,
	) -> Result<NonceOutcome, StoreError> {
		self.durabilities.lock().unwrap().push(durability);
		let inserted = self
			.seen
			.lock()
			.unwrap()
			.insert((nonce.token.clone(), nonce.nonce.clone()));
		Ok(if inserted {
			NonceOutcome::Accepted
		} else {
			NonceOutcome::ReplayDetected
		})
	}
}

#[derive(Default)]
pub struct MemorySsoStates {
	states: Mutex<HashMap<String, SsoState>>,
}

impl MemorySsoStates {
	pub fn len(&self) -> usize {
		self.states.lock().unwrap().len()
	}

	pub fn secret_for(&self, state: &str) -> Option<String> {
		self.states
			.lock()
			.unwrap()
			.get(state)
			.map(|s| s.secret.expose().clone())
	}

	pub fn only_state(&self) -> Option<String> {
		self.states.lock().unwrap().keys().next().cloned()
	}
}

#[async_trait]
impl SsoStateStore for MemorySsoStates {
	async fn insert(&self, state: &SsoState) -> Result<(), StoreError> {
		self.states
			.lock()
			.unwrap()
			.insert(state.state.clone(), state.clone());
		Ok(())
	}

	async fn take(&self, state: &str) -> Result<Option<SsoState>, StoreError> {
		Ok(self.states.lock().unwrap().remove(state))
	}
}

#[derive(Default)]
pub struct MemoryDirectory {
	orgs: Mutex<Vec<Organization>>,
	users: Mutex<Vec<User>>,
	servers: Mutex<Vec<Server>>,
}

impl MemoryDirectory {
	pub fn add_org(&self, name: &str) -> Organization {
		let org = Organization {
			id: OrgId::generate(),
			name: name.to_string(),
			otp_auth: false,
		};
		self.insert_org(org.clone());
		org
	}

	pub fn insert_org(&self, org: Organization) {
		self.orgs.lock().unwrap().push(org);
	}

	pub fn add_user(&self, org_id: OrgId, name: &str, sync_secret: Option<&str>) -> User {
		let user = User {
			id: UserId::generate(),
			org_id,
			name: name.to_string(),
			email: None,
			auth_type: AuthType::Local,
			sync_secret: sync_secret.map(SecretString::from),
			otp_secret: None,
		};
		self.users.lock().unwrap().push(user.clone());
		user
	}

	pub fn users_named(&self, org_id: OrgId, name: &str) -> Vec<User> {
		self.users
			.lock()
			.unwrap()
			.iter()
			.filter(|u| u.org_id == org_id && u.name == name)
			.cloned()
			.collect()
	}
}

#[async_trait]
impl Directory for MemoryDirectory {
	async fn org_by_id(&self, id: &OrgId) -> Result<Option<Organization>, StoreError> {
		Ok(self.orgs.lock().unwrap().iter().find(|o| &o.id == id).cloned())
	}

	async fn org_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError> {
		Ok(self
			.orgs
			.lock()
			.unwrap()
			.iter()
			.find(|o| o.name == name)
			.cloned())
	}

	async fn user_by_id(&self, org_id: &OrgId, id: &UserId) -> Result<Option<User>, StoreError> {
		Ok(self
			.users
			.lock()
			.unwrap()
			.iter()
			.find(|u| &u.org_id == org_id && &u.id == id)
			.cloned())
	}

	async fn user_by_name(&self, org_id: &OrgId, name: &str) -> Result<Option<User>, StoreError> {
		Ok(self
			.users
			.lock()
			.unwrap()
			.iter()
			.find(|u| &u.org_id == org_id && u.name == name)
			.cloned())
	}

	async fn create_user(&self, new: &NewUser) -> Result<User, StoreError> {
		let mut users = self.users.lock().unwrap();
		if users
			.iter()
			.any(|u| u.org_id == new.org_id && u.name == new.name)
		{
			return Err(StoreError::Conflict("users.name".to_string()));
		}
		let user = User {
			id: UserId::generate(),
			org_id: new.org_id,
			name: new.name.clone(),
			email: new.email.clone(),
			auth_type: new.auth_type,
			sync_secret: Some(new.sync_secret.clone()),
			otp_secret: Some(new.otp_secret.clone()),
		};
		users.push(user.clone());
		Ok(user)
	}

	async fn update_auth_type(&self, id: &UserId, auth_type: AuthType) -> Result<(), StoreError> {
		if let Some(user) = self.users.lock().unwrap().iter_mut().find(|u| &u.id == id) {
			user.auth_type = auth_type;
		}
		Ok(())
	}

	async fn servers_for_org(&self, org_id: &OrgId) -> Result<Vec<Server>, StoreError> {
		Ok(self
			.servers
			.lock()
			.unwrap()
			.iter()
			.filter(|s| &s.org_id == org_id)
			.cloned()
			.collect())
	}
}

#[async_trait]
impl SyncSecretLookup for MemoryDirectory {
	async fn sync_secret(
		&self,
		org_id: &OrgId,
		user_id: &UserId,
	) -> Result<Option<SecretString>, StoreError> {
		Ok(self
			.user_by_id(org_id, user_id)
			.await?
			.and_then(|u| u.sync_secret))
	}
}

#[derive(Default)]
pub struct RecordingEvents {
	events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEvents {
	pub fn events(&self) -> Vec<DomainEvent> {
		self.events.lock().unwrap().clone()
	}
}

#[async_trait]
impl EventPublisher for RecordingEvents {
	async fn publish(&self, event: DomainEvent) -> Result<(), StoreError> {
		self.events.lock().unwrap().push(event);
		Ok(())
	}
}

/// Identity provider whose answers are fixed up front.
pub struct FakeProvider {
	pub request_result: Mutex<Option<Result<RedirectTarget, ProviderError>>>,
	pub google: Verification<OrgId>,
	pub saml: Verification<String>,
	pub requests: AtomicUsize,
}

impl Default for FakeProvider {
	fn default() -> Self {
		Self {
			request_result: Mutex::new(None),
			google: Verification::Accepted(None),
			saml: Verification::Accepted(None),
			requests: AtomicUsize::new(0),
		}
	}
}

impl FakeProvider {
	fn next_request(&self) -> Result<RedirectTarget, ProviderError> {
		self.requests.fetch_add(1, Ordering::SeqCst);
		self.request_result
			.lock()
			.unwrap()
			.take()
			.unwrap_or_else(|| Ok(RedirectTarget::Url("https://idp.example/authorize".to_string())))
	}
}

#[async_trait]
impl IdentityProvider for FakeProvider {
	async fn request_google(&self, _request: &SsoRequest) -> Result<RedirectTarget, ProviderError> {
		self.next_request()
	}

	async fn request_saml(&self, _request: &SsoRequest) -> Result<RedirectTarget, ProviderError> {
		self.next_request()
	}

	async fn verify_google(&self, _username: &str) -> Result<Verification<OrgId>, ProviderError> {
		Ok(self.google.clone())
	}

	async fn verify_saml(
		&self,
		_username: &str,
		_email: Option<&str>,
		org_name: Option<&str>,
	) -> Result<Verification<String>, ProviderError> {
		Ok(match &self.saml {
			Verification::Accepted(None) => Verification::Accepted(org_name.map(str::to_string)),
			other => other.clone(),
		})
	}
}

/// Second factor answering per username; unknown names get `UnknownUser`.
#[derive(Default)]
pub struct FakeSecondFactor {
	pub answers: HashMap<String, SecondFactorOutcome>,
	pub calls: Mutex<Vec<(String, bool)>>,
}

#[async_trait]
impl SecondFactor for FakeSecondFactor {
	async fn authenticate(
		&self,
		username: &str,
		strong: bool,
		_remote_addr: Option<IpAddr>,
	) -> Result<SecondFactorOutcome, ProviderError> {
		self.calls
			.lock()
			.unwrap()
			.push((username.to_string(), strong));
		Ok(self
			.answers
			.get(username)
			.cloned()
			.unwrap_or(SecondFactorOutcome::UnknownUser))
	}
}
