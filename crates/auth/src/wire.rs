// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend response model, validated once at the HTTP boundary.
//!
//! [`classify`] turns a raw status + body into a [`Reply`]; the typed
//! payload parsers below turn a successful body into the shape each
//! endpoint promises. Nothing past this module inspects optional JSON
//! fields.

use serde::Deserialize;
use serde_json::Value;

use crate::credential::UserProfile;

/// Substring (case-insensitive) that marks a 403 as a CSRF rejection.
pub const CSRF_MARKER: &str = "csrf";

/// A backend response, classified by how the coordinator must react.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 2xx with a JSON body.
    Success(Value),
    /// 401, whatever the body.
    Unauthorized,
    /// 403 whose message names the CSRF token.
    CsrfRejected { message: String },
    /// Any other non-2xx with a JSON body.
    Failure { status: u16, message: String },
    /// Body is not JSON.
    Invalid { status: u16 },
}

/// Classify a response. 401 wins over everything; an unparseable body wins
/// over the remaining status checks.
pub fn classify(status: u16, body: &[u8]) -> Reply {
    if status == 401 {
        return Reply::Unauthorized;
    }
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return Reply::Invalid { status };
    };
    if (200..300).contains(&status) {
        return Reply::Success(value);
    }
    let message = error_message(&value)
        .unwrap_or_else(|| format!("request failed with status {status}"));
    if status == 403 && message.to_lowercase().contains(CSRF_MARKER) {
        return Reply::CsrfRejected { message };
    }
    Reply::Failure { status, message }
}

/// Pull a human-readable message out of an error body.
pub fn error_message(value: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::to_owned)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenPayload {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    message: Option<String>,
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginPayload {
    Accepted { token: String, refresh_token: String, user: UserProfile },
    Rejected(String),
}

/// `POST /auth/refresh-token` body.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshPayload {
    Renewed { token: String, refresh_token: String },
    Rejected(String),
}

fn parse_tokens(value: Value) -> Option<RawTokenPayload> {
    serde_json::from_value(value).ok()
}

pub fn parse_login(value: Value) -> Option<LoginPayload> {
    let raw = parse_tokens(value)?;
    if !raw.success {
        return Some(LoginPayload::Rejected(
            raw.message.unwrap_or_else(|| "login rejected".to_owned()),
        ));
    }
    match (raw.token, raw.refresh_token) {
        (Some(token), Some(refresh_token)) if !token.is_empty() && !refresh_token.is_empty() => {
            Some(LoginPayload::Accepted { token, refresh_token, user: raw.user.unwrap_or_default() })
        }
        _ => None,
    }
}

pub fn parse_refresh(value: Value) -> Option<RefreshPayload> {
    let raw = parse_tokens(value)?;
    if !raw.success {
        return Some(RefreshPayload::Rejected(
            raw.message.unwrap_or_else(|| "refresh rejected".to_owned()),
        ));
    }
    match (raw.token, raw.refresh_token) {
        (Some(token), Some(refresh_token)) if !token.is_empty() && !refresh_token.is_empty() => {
            Some(RefreshPayload::Renewed { token, refresh_token })
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct RawMe {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    user: Option<UserProfile>,
}

fn default_true() -> bool {
    true
}

/// `GET /auth/me` body: the profile, or `None` when the server says no.
pub fn parse_me(value: Value) -> Option<UserProfile> {
    let raw: RawMe = serde_json::from_value(value).ok()?;
    if raw.success {
        raw.user
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCsrf {
    csrf_token: String,
}

/// `GET /auth/csrf-token` body.
pub fn parse_csrf(value: Value) -> Option<String> {
    let raw: RawCsrf = serde_json::from_value(value).ok()?;
    (!raw.csrf_token.is_empty()).then_some(raw.csrf_token)
}

#[derive(Debug, Deserialize)]
struct RawValidate {
    valid: bool,
}

/// `POST /auth/validate` body.
pub fn parse_validate(value: Value) -> Option<bool> {
    serde_json::from_value::<RawValidate>(value).ok().map(|r| r.valid)
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
