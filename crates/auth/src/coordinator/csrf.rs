// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use reqwest::Method;

use super::{AuthCoordinator, CSRF_PATH};
use crate::credential::{self, CsrfToken};
use crate::error::AuthError;
use crate::http::default_headers;
use crate::wire::{self, classify, Reply};

impl AuthCoordinator {
    /// The held CSRF token, fetching one if none is held or it has expired.
    pub async fn csrf_token(&self) -> Result<String, AuthError> {
        match self.held_csrf().await? {
            Some(token) => Ok(token),
            None => self.refresh_csrf_token().await,
        }
    }

    /// Fetch a new CSRF token unconditionally and persist it.
    pub async fn refresh_csrf_token(&self) -> Result<String, AuthError> {
        let resp =
            self.backend.send(Method::GET, CSRF_PATH, default_headers(None, None), None).await?;
        let value = match classify(resp.status, &resp.body) {
            Reply::Success(value) => value,
            Reply::Invalid { .. } => return Err(AuthError::InvalidResponse),
            Reply::Unauthorized => {
                return Err(AuthError::ApiError {
                    status: 401,
                    message: "csrf token request unauthorized".to_owned(),
                })
            }
            Reply::CsrfRejected { message } => {
                return Err(AuthError::ApiError { status: 403, message })
            }
            Reply::Failure { status, message } => {
                return Err(AuthError::ApiError { status, message })
            }
        };

        let value = wire::parse_csrf(value).ok_or(AuthError::InvalidResponse)?;
        let token =
            CsrfToken { value, expires_at: self.expiry_after(self.config.csrf_ttl_ms()) };
        credential::save_csrf(self.store.as_ref(), &token).await?;
        tracing::debug!("csrf token fetched");
        Ok(token.value)
    }

    /// The held CSRF token, if present and unexpired. No network.
    pub(crate) async fn held_csrf(&self) -> Result<Option<String>, AuthError> {
        let now = self.now_ms();
        Ok(credential::load_csrf(self.store.as_ref())
            .await?
            .filter(|t| now < t.expires_at)
            .map(|t| t.value))
    }
}
