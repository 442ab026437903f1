// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for every TTL setting.
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Configuration for the auth coordinator.
#[derive(Debug, Clone, clap::Args)]
pub struct AuthConfig {
    /// Backend base URL; endpoint paths are appended verbatim.
    #[arg(long, default_value = "http://localhost:3000/api/v1", env = "PURSUIT_API_URL")]
    pub api_url: String,

    /// Directory holding the persisted key-value store.
    #[arg(long, env = "PURSUIT_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Lifetime assigned to a freshly issued access token, in seconds.
    #[arg(long, default_value_t = 3600, env = "PURSUIT_TOKEN_TTL_SECS")]
    pub token_ttl_secs: u64,

    /// How long a fetched user profile is served from cache, in seconds.
    #[arg(long, default_value_t = 300, env = "PURSUIT_USER_CACHE_TTL_SECS")]
    pub user_cache_ttl_secs: u64,

    /// Lifetime assigned to a fetched CSRF token, in seconds.
    #[arg(long, default_value_t = 3600, env = "PURSUIT_CSRF_TTL_SECS")]
    pub csrf_ttl_secs: u64,

    /// Per-request HTTP timeout, in seconds.
    #[arg(long, default_value_t = 30, env = "PURSUIT_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: u64,
}

impl AuthConfig {
    /// Defaults for the given backend, without consulting argv or env.
    pub fn for_api(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            state_dir: None,
            token_ttl_secs: 3600,
            user_cache_ttl_secs: 300,
            csrf_ttl_secs: 3600,
            http_timeout_secs: 30,
        }
    }

    pub fn token_ttl_ms(&self) -> u64 {
        self.token_ttl_secs.saturating_mul(1000)
    }

    pub fn user_cache_ttl_ms(&self) -> u64 {
        self.user_cache_ttl_secs.saturating_mul(1000)
    }

    pub fn csrf_ttl_ms(&self) -> u64 {
        self.csrf_ttl_secs.saturating_mul(1000)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Resolve the state directory.
    ///
    /// Checks `--state-dir`, then `$XDG_STATE_HOME/pursuitpal`,
    /// then `$HOME/.local/state/pursuitpal`.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("pursuitpal");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/pursuitpal");
        }
        PathBuf::from(".pursuitpal")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("--api-url must be an http(s) URL, got {url:?}");
        }
        for (flag, secs) in [
            ("--token-ttl-secs", self.token_ttl_secs),
            ("--user-cache-ttl-secs", self.user_cache_ttl_secs),
            ("--csrf-ttl-secs", self.csrf_ttl_secs),
        ] {
            if secs == 0 {
                anyhow::bail!("{flag} must be greater than zero");
            }
            if secs > MAX_TTL_SECS {
                anyhow::bail!("{flag} must be at most {MAX_TTL_SECS} (one year), got {secs}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
