// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential, profile, and CSRF state as persisted in the key-value store.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::store::{keys, KeyValueStore, StoreError};

/// Access/refresh token pair with the access token's expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as epoch millis.
    pub expires_at: u64,
}

impl Credential {
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at
    }
}

/// Signed-in user as returned by the backend. Unknown fields are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// CSRF token with its own expiry (epoch millis).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    pub value: String,
    pub expires_at: u64,
}

/// Raw token fields as found in storage; any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<u64>,
}

impl StoredTokens {
    /// Full credential, if both tokens are present. A missing expiry reads as
    /// already expired.
    pub fn credential(&self) -> Option<Credential> {
        Some(Credential {
            access_token: self.access_token.clone()?,
            refresh_token: self.refresh_token.clone()?,
            expires_at: self.expires_at.unwrap_or(0),
        })
    }
}

fn non_empty_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn millis(value: Option<Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub async fn load_tokens(store: &dyn KeyValueStore) -> Result<StoredTokens, StoreError> {
    Ok(StoredTokens {
        access_token: non_empty_string(store.get(keys::TOKEN).await?),
        refresh_token: non_empty_string(store.get(keys::REFRESH_TOKEN).await?),
        expires_at: millis(store.get(keys::TOKEN_EXPIRY).await?),
    })
}

pub async fn save_credential(
    store: &dyn KeyValueStore,
    credential: &Credential,
) -> Result<(), StoreError> {
    store
        .set(vec![
            (keys::TOKEN, json!(credential.access_token)),
            (keys::REFRESH_TOKEN, json!(credential.refresh_token)),
            (keys::TOKEN_EXPIRY, json!(credential.expires_at)),
        ])
        .await
}

/// Cached profile, if present and its cache expiry is still ahead of `now_ms`.
pub async fn load_cached_user(
    store: &dyn KeyValueStore,
    now_ms: u64,
) -> Result<Option<UserProfile>, StoreError> {
    let Some(expiry) = millis(store.get(keys::USER_DATA_EXPIRY).await?) else {
        return Ok(None);
    };
    if now_ms >= expiry {
        return Ok(None);
    }
    match store.get(keys::USER).await? {
        Some(Value::Null) | None => Ok(None),
        Some(value) => match serde_json::from_value(value) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::debug!(err = %e, "ignoring malformed cached user");
                Ok(None)
            }
        },
    }
}

pub async fn save_user(
    store: &dyn KeyValueStore,
    user: &UserProfile,
    expires_at: u64,
) -> Result<(), StoreError> {
    store
        .set(vec![(keys::USER, serde_json::to_value(user)?), (keys::USER_DATA_EXPIRY, json!(expires_at))])
        .await
}

pub async fn load_csrf(store: &dyn KeyValueStore) -> Result<Option<CsrfToken>, StoreError> {
    let Some(value) = non_empty_string(store.get(keys::CSRF_TOKEN).await?) else {
        return Ok(None);
    };
    let expires_at = millis(store.get(keys::CSRF_TOKEN_EXPIRY).await?).unwrap_or(0);
    Ok(Some(CsrfToken { value, expires_at }))
}

pub async fn save_csrf(store: &dyn KeyValueStore, token: &CsrfToken) -> Result<(), StoreError> {
    store
        .set(vec![
            (keys::CSRF_TOKEN, json!(token.value)),
            (keys::CSRF_TOKEN_EXPIRY, json!(token.expires_at)),
        ])
        .await
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
