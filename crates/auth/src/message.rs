// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action-tagged messages from other extension surfaces.
//!
//! Each surface posts `{"action": "...", ...}` and gets back either
//! `{"success": true, ...}` or `{"success": false, "error": CODE, "message": ...}`.
//! Parsing and dispatch never fail; malformed input becomes an error reply.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::coordinator::AuthCoordinator;
use crate::error::{AuthError, ErrorCode};
use crate::http::RequestOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AuthMessage {
    IsAuthenticated,
    #[serde(rename_all = "camelCase")]
    Login {
        #[serde(default)]
        email: String,
        #[serde(default)]
        password: String,
    },
    Logout,
    GetCurrentUser,
    ValidateToken,
    #[serde(rename_all = "camelCase")]
    FetchWithAuth {
        endpoint: String,
        #[serde(default)]
        method: Option<String>,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: Option<Value>,
    },
}

/// Parse and dispatch a raw JSON message.
pub async fn handle(coordinator: &Arc<AuthCoordinator>, raw: Value) -> Value {
    match serde_json::from_value::<AuthMessage>(raw) {
        Ok(message) => dispatch(coordinator, message).await,
        Err(e) => {
            tracing::debug!(err = %e, "unrecognized message");
            error_reply(ErrorCode::InvalidInput, format!("unrecognized message: {e}"))
        }
    }
}

pub async fn dispatch(coordinator: &Arc<AuthCoordinator>, message: AuthMessage) -> Value {
    match message {
        AuthMessage::IsAuthenticated => {
            let authenticated = coordinator.is_authenticated().await;
            json!({ "success": true, "authenticated": authenticated })
        }
        AuthMessage::Login { email, password } => match coordinator.login(&email, &password).await
        {
            Ok(user) => json!({ "success": true, "user": user }),
            Err(e) => from_error(&e),
        },
        AuthMessage::Logout => match coordinator.logout().await {
            Ok(()) => json!({ "success": true }),
            Err(e) => from_error(&e),
        },
        AuthMessage::GetCurrentUser => {
            let user = coordinator.get_current_user().await;
            json!({ "success": true, "user": user })
        }
        AuthMessage::ValidateToken => match coordinator.validate_token().await {
            Ok(valid) => json!({ "success": true, "valid": valid }),
            Err(e) => from_error(&e),
        },
        AuthMessage::FetchWithAuth { endpoint, method, headers, body } => {
            let options = match request_options(method.as_deref(), &headers, body) {
                Ok(o) => o,
                Err(e) => return from_error(&e),
            };
            match coordinator.fetch_with_auth(&endpoint, options).await {
                Ok(data) => json!({ "success": true, "data": data }),
                Err(e) => from_error(&e),
            }
        }
    }
}

fn request_options(
    method: Option<&str>,
    headers: &HashMap<String, String>,
    body: Option<Value>,
) -> Result<RequestOptions, AuthError> {
    let method = match method {
        Some(m) => Method::from_bytes(m.to_uppercase().as_bytes())
            .map_err(|_| AuthError::InvalidInput(format!("bad method: {m}")))?,
        None => Method::GET,
    };
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| AuthError::InvalidInput(format!("bad header name: {name}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| AuthError::InvalidInput(format!("bad header value for {name}")))?;
        map.insert(name, value);
    }
    Ok(RequestOptions { method, headers: map, body })
}

fn from_error(e: &AuthError) -> Value {
    let mut reply = error_reply(e.code(), e.to_string());
    if let AuthError::ApiError { status, .. } = e {
        reply["status"] = json!(status);
    }
    reply
}

fn error_reply(code: ErrorCode, message: String) -> Value {
    json!({ "success": false, "error": code.as_str(), "message": message })
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
