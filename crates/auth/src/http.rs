// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the PursuitPal backend.

use std::sync::Once;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde_json::Value;

use crate::error::AuthError;

pub const CSRF_HEADER: &str = "x-csrf-token";

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Only the first call has any effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Method, extra headers and JSON body for an outgoing request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    /// Applied last, so these replace any default header of the same name.
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self { method: Method::POST, headers: HeaderMap::new(), body: Some(body) }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Status and raw body of a backend response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

/// HTTP client bound to one backend base URL.
pub struct Backend {
    base_url: String,
    client: Client,
}

impl Backend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        ensure_crypto();
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), client }
    }

    /// Paths are joined to the base URL. Absolute URLs must share the base
    /// URL's origin.
    pub fn url(&self, endpoint: &str) -> Result<String, AuthError> {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            let target = Url::parse(endpoint)
                .map_err(|e| AuthError::InvalidInput(format!("bad endpoint {endpoint:?}: {e}")))?;
            let base = Url::parse(&self.base_url)
                .map_err(|e| AuthError::InvalidInput(format!("bad api url: {e}")))?;
            if target.origin() != base.origin() {
                return Err(AuthError::InvalidInput(format!(
                    "endpoint {endpoint:?} is outside {}",
                    base.origin().ascii_serialization()
                )));
            }
            return Ok(endpoint.to_owned());
        }
        if endpoint.starts_with('/') {
            Ok(format!("{}{}", self.base_url, endpoint))
        } else {
            Ok(format!("{}/{}", self.base_url, endpoint))
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request. Only transport failures are errors here; every
    /// status code comes back as a [`RawResponse`].
    pub async fn send(
        &self,
        method: Method,
        endpoint: &str,
        headers: HeaderMap,
        body: Option<&Value>,
    ) -> Result<RawResponse, AuthError> {
        let url = self.url(endpoint)?;
        let mut req = self.client.request(method.clone(), &url).headers(headers);
        if let Some(body) = body {
            req = req.body(body.to_string());
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        tracing::debug!(%method, %url, status, "backend response");
        Ok(RawResponse { status, body })
    }
}

/// Default headers: JSON content type plus whichever tokens are held.
pub fn default_headers(bearer: Option<&str>, csrf: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = bearer {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(reqwest::header::AUTHORIZATION, val);
        }
    }
    if let Some(csrf) = csrf {
        if let Ok(val) = HeaderValue::from_str(csrf) {
            headers.insert(HeaderName::from_static(CSRF_HEADER), val);
        }
    }
    headers
}

/// Overlay `overrides` onto `base`; an override replaces every value `base`
/// had under that name.
pub fn merge_headers(mut base: HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    for name in overrides.keys() {
        base.remove(name);
    }
    for (name, value) in overrides {
        base.append(name.clone(), value.clone());
    }
    base
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
