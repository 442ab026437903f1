// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth coordinator: token lifecycle, CSRF lifecycle, authenticated requests.
//!
//! One coordinator is constructed per execution context and handed to
//! whatever needs it. The single-flight refresh guarantee holds within
//! that context only; separate processes sharing a store converge through
//! the store, not through a lock.

mod csrf;
mod fetch;
mod refresh;

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Method;
use serde_json::json;

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::credential::{self, Credential, UserProfile};
use crate::error::AuthError;
use crate::http::{default_headers, Backend, RequestOptions};
use crate::store::{keys, KeyValueStore};
use crate::wire::{self, classify, LoginPayload, Reply};

use self::refresh::SharedRefresh;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh-token";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const ME_PATH: &str = "/auth/me";
pub const CSRF_PATH: &str = "/auth/csrf-token";
pub const VALIDATE_PATH: &str = "/auth/validate";

/// Owns the credential, profile cache and CSRF token for one execution context.
pub struct AuthCoordinator {
    config: AuthConfig,
    backend: Backend,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    /// In-flight refresh, if any. Never held across an await.
    refresh: Mutex<Option<SharedRefresh>>,
}

impl AuthCoordinator {
    pub fn new(config: AuthConfig, store: Arc<dyn KeyValueStore>) -> Arc<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: AuthConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let backend = Backend::new(&config.api_url, config.http_timeout());
        Arc::new(Self { config, backend, store, clock, refresh: Mutex::new(None) })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Expiry `ttl_ms` from now, pinned at `u64::MAX`.
    fn expiry_after(&self, ttl_ms: u64) -> u64 {
        self.now_ms().saturating_add(ttl_ms)
    }

    /// Snapshot of the persisted credential, if both tokens are present.
    pub async fn stored_credential(&self) -> Result<Option<Credential>, AuthError> {
        Ok(credential::load_tokens(self.store.as_ref()).await?.credential())
    }

    /// Whether a usable session exists, refreshing an expired access token on
    /// the way. Never fails: every error reads as `false`, and a failed
    /// refresh leaves the store logged out.
    pub async fn is_authenticated(self: &Arc<Self>) -> bool {
        let tokens = match credential::load_tokens(self.store.as_ref()).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(err = %e, "failed to read stored credential");
                return false;
            }
        };
        let Some(cred) = tokens.credential() else {
            return false;
        };
        if cred.is_valid_at(self.now_ms()) {
            return true;
        }

        tracing::debug!(expires_at = cred.expires_at, "access token expired, refreshing");
        // A failed refresh has already logged out.
        match self.refresh_token().await {
            Ok(_) => true,
            Err(e) => {
                tracing::info!(err = %e, "session could not be renewed");
                false
            }
        }
    }

    /// Log in and persist the resulting credential and profile.
    ///
    /// Any failure after input validation also clears credential and profile
    /// keys left over from an earlier session.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput("email and password are required".to_owned()));
        }

        match self.try_login(email, password).await {
            Ok(user) => {
                tracing::info!(email, "logged in");
                Ok(user)
            }
            Err(e) => {
                tracing::info!(email, err = %e, "login failed");
                self.store.remove(keys::SESSION).await?;
                Err(e)
            }
        }
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let body = json!({ "email": email, "password": password });
        let mut csrf_renewed = false;
        let mut csrf = self.csrf_token().await?;

        let payload = loop {
            let resp = self
                .backend
                .send(Method::POST, LOGIN_PATH, default_headers(None, Some(&csrf)), Some(&body))
                .await?;
            match classify(resp.status, &resp.body) {
                Reply::Success(value) => break value,
                Reply::CsrfRejected { .. } if !csrf_renewed => {
                    csrf_renewed = true;
                    csrf = self.refresh_csrf_token().await?;
                }
                Reply::Invalid { .. } => return Err(AuthError::InvalidResponse),
                Reply::Unauthorized => {
                    return Err(AuthError::InvalidCredentials("unauthorized".to_owned()))
                }
                Reply::CsrfRejected { message } | Reply::Failure { message, .. } => {
                    return Err(AuthError::InvalidCredentials(message))
                }
            }
        };

        match wire::parse_login(payload) {
            Some(LoginPayload::Accepted { token, refresh_token, user }) => {
                let cred = Credential {
                    access_token: token,
                    refresh_token,
                    expires_at: self.expiry_after(self.config.token_ttl_ms()),
                };
                credential::save_credential(self.store.as_ref(), &cred).await?;
                credential::save_user(
                    self.store.as_ref(),
                    &user,
                    self.expiry_after(self.config.user_cache_ttl_ms()),
                )
                .await?;
                Ok(user)
            }
            Some(LoginPayload::Rejected(message)) => Err(AuthError::InvalidCredentials(message)),
            None => Err(AuthError::InvalidResponse),
        }
    }

    /// Notify the server (best effort) and erase every persisted key.
    ///
    /// Only a failure to erase local storage is reported.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let tokens = credential::load_tokens(self.store.as_ref()).await.unwrap_or_else(|e| {
            tracing::warn!(err = %e, "failed to read credential before logout");
            Default::default()
        });

        if tokens.access_token.is_some() || tokens.refresh_token.is_some() {
            let csrf = self.held_csrf().await.unwrap_or_default();
            let headers = default_headers(tokens.access_token.as_deref(), csrf.as_deref());
            let body = json!({ "refreshToken": tokens.refresh_token });
            match self.backend.send(Method::POST, LOGOUT_PATH, headers, Some(&body)).await {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    tracing::debug!("server session invalidated");
                }
                Ok(resp) => {
                    tracing::debug!(status = resp.status, "server logout rejected, continuing");
                }
                Err(e) => {
                    tracing::warn!(err = %e, "server logout failed, continuing");
                }
            }
        }

        self.store.remove(keys::ALL).await?;
        tracing::info!("logged out");
        Ok(())
    }

    /// Current user: cached profile while fresh, otherwise `/auth/me`.
    /// Never fails; `None` covers "not logged in" and every error.
    pub async fn get_current_user(self: &Arc<Self>) -> Option<UserProfile> {
        match credential::load_cached_user(self.store.as_ref(), self.now_ms()).await {
            Ok(Some(user)) => return Some(user),
            Ok(None) => {}
            Err(e) => tracing::warn!(err = %e, "failed to read cached user"),
        }

        let tokens = match credential::load_tokens(self.store.as_ref()).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(err = %e, "failed to read stored credential");
                return None;
            }
        };
        tokens.access_token.as_ref()?;

        match self.fetch_with_auth(ME_PATH, RequestOptions::get()).await {
            Ok(value) => {
                let Some(user) = wire::parse_me(value) else {
                    tracing::warn!("malformed /auth/me response");
                    return None;
                };
                let expires_at = self.expiry_after(self.config.user_cache_ttl_ms());
                if let Err(e) = credential::save_user(self.store.as_ref(), &user, expires_at).await
                {
                    tracing::warn!(err = %e, "failed to cache user");
                }
                Some(user)
            }
            Err(AuthError::SessionExpired) => {
                if let Err(e) = self.logout().await {
                    tracing::warn!(err = %e, "logout after expired session failed");
                }
                None
            }
            Err(e) => {
                tracing::debug!(err = %e, "could not fetch current user");
                None
            }
        }
    }

    /// Ask the server whether the stored access token is still valid.
    pub async fn validate_token(&self) -> Result<bool, AuthError> {
        let tokens = credential::load_tokens(self.store.as_ref()).await?;
        let Some(access_token) = tokens.access_token else {
            return Ok(false);
        };
        let csrf = self.held_csrf().await?;
        let headers = default_headers(Some(&access_token), csrf.as_deref());
        let resp = self.backend.send(Method::POST, VALIDATE_PATH, headers, Some(&json!({}))).await?;
        match classify(resp.status, &resp.body) {
            Reply::Success(value) => wire::parse_validate(value).ok_or(AuthError::InvalidResponse),
            Reply::Unauthorized => Ok(false),
            Reply::Invalid { .. } => Err(AuthError::InvalidResponse),
            Reply::CsrfRejected { message } => Err(AuthError::ApiError { status: 403, message }),
            Reply::Failure { status, message } => Err(AuthError::ApiError { status, message }),
        }
    }
}
