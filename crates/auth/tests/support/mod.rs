// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted backend for coordinator integration tests.
//!
//! An axum app on an ephemeral port answers every path from a per-path
//! script. The last scripted response repeats once the script runs out.
//! Every request is recorded so tests can count hits and inspect headers.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};

use pursuit_auth::clock::ManualClock;
use pursuit_auth::store::{keys, KeyValueStore, MemoryStore};
use pursuit_auth::{AuthConfig, AuthCoordinator};

/// Fixed "now" for tests that pin the clock.
pub const NOW: u64 = 1_700_000_000_000;
pub const HOUR_MS: u64 = 3_600_000;

/// One canned response.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub body: String,
}

impl Canned {
    pub fn json(status: u16, body: Value) -> Self {
        Self { status, body: body.to_string() }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self { status, body: body.to_owned() }
    }
}

/// A request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
    }
}

#[derive(Default)]
struct Route {
    script: VecDeque<Canned>,
    delay: Duration,
}

#[derive(Default)]
struct MockState {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<Recorded>>,
}

pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockBackend {
    /// Start with a working CSRF endpoint and everything else unscripted (404).
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let mock = Self { addr, state };
        mock.respond("/auth/csrf-token", vec![Canned::json(200, json!({ "csrfToken": "csrf-1" }))]);
        Ok(mock)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Replace the script for `path`.
    pub fn respond(&self, path: &str, script: Vec<Canned>) {
        let mut routes = self.state.routes.lock();
        let route = routes.entry(path.to_owned()).or_default();
        route.script = script.into();
    }

    /// Hold every response on `path` for `delay` before answering.
    pub fn delay(&self, path: &str, delay: Duration) {
        self.state.routes.lock().entry(path.to_owned()).or_default().delay = delay;
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.requests.lock().iter().filter(|r| r.path == path).count()
    }

    pub fn requests(&self, path: &str) -> Vec<Recorded> {
        self.state.requests.lock().iter().filter(|r| r.path == path).cloned().collect()
    }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let path = uri.path().to_owned();
    state.requests.lock().push(Recorded {
        path: path.clone(),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let (canned, delay) = {
        let mut routes = state.routes.lock();
        match routes.get_mut(&path) {
            Some(route) => {
                let canned = if route.script.len() > 1 {
                    route.script.pop_front()
                } else {
                    route.script.front().cloned()
                };
                (canned, route.delay)
            }
            None => (None, Duration::ZERO),
        }
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let canned =
        canned.unwrap_or_else(|| Canned::json(404, json!({ "message": format!("no route {path}") })));
    let status = StatusCode::from_u16(canned.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], canned.body)
}

/// Coordinator wired to `mock` with an in-memory store and a pinned clock.
pub fn coordinator(
    mock: &MockBackend,
    store: &Arc<MemoryStore>,
    clock: &Arc<ManualClock>,
) -> Arc<AuthCoordinator> {
    AuthCoordinator::with_clock(AuthConfig::for_api(mock.url()), store.clone(), clock.clone())
}

pub fn fixtures() -> (Arc<MemoryStore>, Arc<ManualClock>) {
    (Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(NOW)))
}

pub async fn seed_credential(
    store: &MemoryStore,
    access: &str,
    refresh: &str,
    expires_at: u64,
) -> anyhow::Result<()> {
    store
        .set(vec![
            (keys::TOKEN, json!(access)),
            (keys::REFRESH_TOKEN, json!(refresh)),
            (keys::TOKEN_EXPIRY, json!(expires_at)),
        ])
        .await?;
    Ok(())
}

pub async fn seed_csrf(store: &MemoryStore, value: &str, expires_at: u64) -> anyhow::Result<()> {
    store
        .set(vec![(keys::CSRF_TOKEN, json!(value)), (keys::CSRF_TOKEN_EXPIRY, json!(expires_at))])
        .await?;
    Ok(())
}

pub fn refresh_ok(token: &str, refresh: &str) -> Canned {
    Canned::json(200, json!({ "success": true, "token": token, "refreshToken": refresh }))
}
