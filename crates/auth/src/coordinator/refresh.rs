// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access token refresh.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::Method;
use serde_json::json;

use super::{AuthCoordinator, REFRESH_PATH};
use crate::credential::{self, Credential};
use crate::error::AuthError;
use crate::http::default_headers;
use crate::wire::{self, classify, RefreshPayload, Reply};

pub(crate) type RefreshOutcome = Result<Credential, AuthError>;
pub(crate) type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

impl AuthCoordinator {
    /// Exchange the stored refresh token for a new credential.
    ///
    /// Concurrent callers share one request: whoever finds a refresh in
    /// flight awaits that refresh's outcome instead of starting another.
    /// A failed refresh logs out before the failure reaches any caller.
    pub async fn refresh_token(self: &Arc<Self>) -> RefreshOutcome {
        let pending = {
            let mut slot = self.refresh.lock();
            match slot.as_ref() {
                Some(pending) => {
                    tracing::debug!("refresh in flight, waiting on it");
                    pending.clone()
                }
                None => {
                    let this = Arc::clone(self);
                    let attempt: BoxFuture<'static, RefreshOutcome> = async move {
                        let outcome = this.run_refresh().await;
                        // Cleared by the attempt itself so it happens even if
                        // the caller that started it has gone away.
                        this.refresh.lock().take();
                        outcome
                    }
                    .boxed();
                    let shared = attempt.shared();
                    *slot = Some(shared.clone());
                    shared
                }
            }
        };
        pending.await
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.refresh.lock().is_some()
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        match self.request_refresh().await {
            Ok(cred) => {
                tracing::info!(expires_at = cred.expires_at, "access token refreshed");
                Ok(cred)
            }
            Err(e) => {
                tracing::warn!(err = %e, "token refresh failed, logging out");
                if let Err(le) = self.logout().await {
                    tracing::warn!(err = %le, "logout after failed refresh failed");
                }
                Err(e)
            }
        }
    }

    async fn request_refresh(&self) -> RefreshOutcome {
        let tokens = credential::load_tokens(self.store.as_ref()).await?;
        let refresh_token = tokens.refresh_token.ok_or(AuthError::NoRefreshToken)?;
        let csrf = self.held_csrf().await?;

        let headers = default_headers(tokens.access_token.as_deref(), csrf.as_deref());
        let body = json!({ "refreshToken": refresh_token });
        let resp = self
            .backend
            .send(Method::POST, REFRESH_PATH, headers, Some(&body))
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let value = match classify(resp.status, &resp.body) {
            Reply::Success(value) => value,
            Reply::Invalid { status } => {
                return Err(AuthError::RefreshFailed(format!("non-JSON response ({status})")))
            }
            Reply::Unauthorized => {
                return Err(AuthError::RefreshFailed("refresh token rejected (401)".to_owned()))
            }
            Reply::CsrfRejected { message } | Reply::Failure { message, .. } => {
                return Err(AuthError::RefreshFailed(message))
            }
        };

        match wire::parse_refresh(value) {
            Some(RefreshPayload::Renewed { token, refresh_token }) => {
                let cred = Credential {
                    access_token: token,
                    refresh_token,
                    expires_at: self.expiry_after(self.config.token_ttl_ms()),
                };
                credential::save_credential(self.store.as_ref(), &cred).await?;
                Ok(cred)
            }
            Some(RefreshPayload::Rejected(message)) => Err(AuthError::RefreshFailed(message)),
            None => Err(AuthError::RefreshFailed("malformed refresh response".to_owned())),
        }
    }
}
