// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent key-value storage shared by every execution context.
//!
//! Values are JSON, mirroring extension storage. The store makes no
//! atomicity promise across keys or across processes; the coordinator
//! re-reads what it needs on every operation.

pub mod file;
pub mod memory;

use serde_json::Value;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage keys written by the coordinator.
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const TOKEN_EXPIRY: &str = "tokenExpiry";
    pub const USER: &str = "user";
    pub const USER_DATA_EXPIRY: &str = "userDataExpiry";
    pub const CSRF_TOKEN: &str = "csrfToken";
    pub const CSRF_TOKEN_EXPIRY: &str = "csrfTokenExpiry";

    /// Credential and profile keys; CSRF keys excluded.
    pub const SESSION: &[&str] = &[TOKEN, REFRESH_TOKEN, TOKEN_EXPIRY, USER, USER_DATA_EXPIRY];

    /// Every key, cleared together on logout.
    pub const ALL: &[&str] = &[
        TOKEN,
        REFRESH_TOKEN,
        TOKEN_EXPIRY,
        USER,
        USER_DATA_EXPIRY,
        CSRF_TOKEN,
        CSRF_TOKEN_EXPIRY,
    ];
}

/// Error from a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<StoreError> for crate::error::AuthError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Async key-value store over string keys.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write several entries in one operation.
    async fn set(&self, entries: Vec<(&'static str, Value)>) -> Result<(), StoreError>;

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;
}
