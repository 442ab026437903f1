// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PursuitPal auth: token, CSRF and profile lifecycle for the browser
//! extension's backend, with single-flight refresh.

pub mod cli;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod credential;
pub mod error;
pub mod http;
pub mod message;
pub mod store;
pub mod wire;

use std::sync::Arc;

pub use crate::config::AuthConfig;
pub use crate::coordinator::AuthCoordinator;
pub use crate::credential::{Credential, CsrfToken, UserProfile};
pub use crate::error::{AuthError, ErrorCode};
pub use crate::http::RequestOptions;
pub use crate::store::{FileStore, KeyValueStore, MemoryStore};

/// Build the coordinator for this process, backed by the file store in the
/// configured state directory.
pub fn connect(config: AuthConfig) -> anyhow::Result<Arc<AuthCoordinator>> {
    config.validate()?;
    let dir = config.state_dir();
    let store = FileStore::in_dir(&dir)?;
    tracing::debug!(path = %store.path().display(), api = %config.api_url, "opened auth store");
    Ok(AuthCoordinator::new(config, Arc::new(store)))
}
