// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod auth;
mod database;
mod housekeeping;
mod http;
mod logging;
mod paths;
mod sso;
mod subscription;

pub use auth::{AuthConfig, AuthConfigLayer, NonceDurability};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use housekeeping::{HousekeepingConfig, HousekeepingConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use paths::{PathsConfig, PathsConfigLayer};
pub use sso::{SsoConfig, SsoConfigLayer, SsoMode};
pub use subscription::{SubscriptionConfig, SubscriptionConfigLayer};
