// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated requests with bounded retry.

use std::sync::Arc;

use serde_json::Value;

use super::AuthCoordinator;
use crate::credential;
use crate::error::AuthError;
use crate::http::{default_headers, merge_headers, RequestOptions};
use crate::wire::{classify, Reply};

impl AuthCoordinator {
    /// Send an authenticated request and return its JSON body.
    ///
    /// A 401 gets one refresh and one retry; a CSRF rejection gets one CSRF
    /// refetch and one retry. The two budgets are independent, so a request
    /// is sent at most three times. An absolute `endpoint` off the backend's
    /// origin is rejected before anything is sent.
    pub async fn fetch_with_auth(
        self: &Arc<Self>,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Value, AuthError> {
        self.backend.url(endpoint)?;
        if !self.is_authenticated().await {
            return Err(AuthError::NotAuthenticated);
        }

        let mut refreshed = false;
        let mut csrf_renewed = false;
        loop {
            // Re-read every attempt; a refresh may have landed in between.
            let tokens = credential::load_tokens(self.store.as_ref()).await?;
            let csrf = self.held_csrf().await?;
            let headers = merge_headers(
                default_headers(tokens.access_token.as_deref(), csrf.as_deref()),
                &options.headers,
            );

            let resp = self
                .backend
                .send(options.method.clone(), endpoint, headers, options.body.as_ref())
                .await?;

            match classify(resp.status, &resp.body) {
                Reply::Success(value) => return Ok(value),
                Reply::Unauthorized if !refreshed => {
                    refreshed = true;
                    tracing::debug!(endpoint, "401, refreshing before retry");
                    if let Err(e) = self.refresh_token().await {
                        tracing::debug!(endpoint, err = %e, "refresh before retry failed");
                        return Err(AuthError::SessionExpired);
                    }
                }
                Reply::Unauthorized => return Err(AuthError::SessionExpired),
                Reply::CsrfRejected { .. } if !csrf_renewed => {
                    csrf_renewed = true;
                    tracing::debug!(endpoint, "csrf rejected, refetching before retry");
                    self.refresh_csrf_token().await?;
                }
                Reply::CsrfRejected { message } => {
                    return Err(AuthError::ApiError { status: 403, message })
                }
                Reply::Failure { status, message } => {
                    return Err(AuthError::ApiError { status, message })
                }
                Reply::Invalid { .. } => return Err(AuthError::InvalidResponse),
            }
        }
    }
}
