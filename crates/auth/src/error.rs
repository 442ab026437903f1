// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Errors surfaced by the auth coordinator.
///
/// `Clone`: one refresh outcome is handed to every caller that attached to
/// it while it was in flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("api error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("invalid response from server")]
    InvalidResponse,
    #[error("network error: {0}")]
    Network(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Machine-readable code, stable across releases.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::InvalidCredentials(_) => ErrorCode::InvalidCredentials,
            Self::NoRefreshToken => ErrorCode::NoRefreshToken,
            Self::RefreshFailed(_) => ErrorCode::RefreshFailed,
            Self::SessionExpired => ErrorCode::SessionExpired,
            Self::NotAuthenticated => ErrorCode::NotAuthenticated,
            Self::ApiError { .. } => ErrorCode::ApiError,
            Self::InvalidResponse => ErrorCode::InvalidResponse,
            Self::Network(_) => ErrorCode::Network,
            Self::Storage(_) => ErrorCode::Storage,
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Error codes carried in message replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    InvalidCredentials,
    NoRefreshToken,
    RefreshFailed,
    SessionExpired,
    NotAuthenticated,
    ApiError,
    InvalidResponse,
    Network,
    Storage,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::NoRefreshToken => "NO_REFRESH_TOKEN",
            Self::RefreshFailed => "REFRESH_FAILED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::ApiError => "API_ERROR",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::Network => "NETWORK",
            Self::Storage => "STORAGE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
