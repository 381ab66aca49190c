// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Replay-safe credential delivery for Keygate.
//!
//! # Components
//!
//! - [`TimingGuard`]: jitter and a fixed delay on not-found so token probes
//!   learn nothing from response timing.
//! - [`LinkResolver`]: issues key links and resolves them, consuming one-time
//!   links with a single compare-and-set.
//! - [`SyncAuthenticator`]: HMAC-SHA-512 verification of device sync requests,
//!   backed by a [`NonceLedger`] that refuses replays.
//! - [`SsoCorrelator`]: Google/SAML request and callback correlation, the
//!   direct second-factor login, and provisioning of the resulting user.
//!
//! Persistence sits behind the traits in [`store`]; the identity provider and
//! second factor sit behind the traits in [`provider`].
//!
//! # Security Considerations
//!
//! - Every "does this token exist" answer goes through [`TimingGuard`].
//! - Signatures are compared in constant time.
//! - Sync secrets and SSO secrets are [`SecretString`](keygate_common_secret::SecretString)s
//!   and never reach the logs.

pub mod error;
pub mod links;
pub mod provider;
pub mod provision;
pub mod signing;
pub mod sso;
pub mod store;
pub mod sync;
pub mod timing;
pub mod token;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{AuthError, ProviderError, SigningError, StoreError};
pub use links::LinkResolver;
pub use provider::{
	DenyAllSecondFactor, IdentityProvider, RedirectTarget, SecondFactor, SecondFactorOutcome,
	SsoRequest, Verification,
};
pub use provision::UserProvisioner;
pub use sso::{ProvisionedUser, SsoCallback, SsoCorrelator, SsoDependencies, SsoSettings};
pub use store::{
	Directory, EventPublisher, LinkStore, NonceLedger, NonceOutcome, SsoStateStore,
	SyncSecretLookup,
};
pub use sync::{SyncAuthenticator, SyncRequest, VerifiedIdentity};
pub use timing::TimingGuard;
pub use types::{
	AuthNonce, AuthType, DomainEvent, KeyLink, KeyLinkDescriptor, LinkId, LinkQuery, NewUser,
	OneTime, OrgId, Organization, Server, ServerId, SsoProvider, SsoState, User, UserId,
};
