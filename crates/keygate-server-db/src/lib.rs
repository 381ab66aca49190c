// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for Keygate.
//!
//! Each repository wraps a [`SqlitePool`](sqlx::SqlitePool) and implements the
//! matching store trait from `keygate-server-auth`. The atomic steps the auth
//! layer depends on are single statements here:
//!
//! | Operation | Statement |
//! |---|---|
//! | consume a one-time link | `UPDATE .. WHERE one_time = 'unused'` |
//! | redeem an SSO state | `DELETE .. RETURNING` |
//! | accept a nonce | `INSERT` against `PRIMARY KEY (token, nonce)` |

pub mod directory;
pub mod error;
pub mod event;
pub mod link;
pub mod nonce;
pub mod pool;
mod row;
pub mod sso_state;
pub mod testing;

pub use directory::DirectoryRepository;
pub use error::{DbError, Result};
pub use event::{EventRepository, StoredEvent};
pub use link::KeyLinkRepository;
pub use nonce::NonceRepository;
pub use pool::{create_pool, run_migrations};
pub use sso_state::SsoStateRepository;
