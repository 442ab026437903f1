// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token refresh: single-flight, persistence, failure handling, expiry.

mod support;

use std::time::Duration;

use futures_util::future::join_all;
use serde_json::json;

use pursuit_auth::store::{keys, KeyValueStore};
use pursuit_auth::{AuthConfig, AuthCoordinator, AuthError};

use support::{
    coordinator, fixtures, refresh_ok, seed_credential, seed_csrf, Canned, MockBackend, HOUR_MS,
    NOW,
};

const REFRESH: &str = "/auth/refresh-token";
const LOGOUT: &str = "/auth/logout";

#[tokio::test]
async fn refresh_persists_new_pair_with_fresh_expiry() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    mock.respond(REFRESH, vec![refresh_ok("t2", "r2")]);
    let (store, clock) = fixtures();
    seed_credential(&store, "t1", "r1", NOW - 1).await?;
    let auth = coordinator(&mock, &store, &clock);

    let cred = auth.refresh_token().await?;

    assert_eq!(cred.access_token, "t2");
    assert_eq!(cred.refresh_token, "r2");
    assert_eq!(store.get(keys::TOKEN).await?, Some(json!("t2")));
    assert_eq!(store.get(keys::REFRESH_TOKEN).await?, Some(json!("r2")));
    assert_eq!(store.get(keys::TOKEN_EXPIRY).await?, Some(json!(NOW + HOUR_MS)));

    let sent = mock.requests(REFRESH);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, json!({ "refreshToken": "r1" }));
    Ok(())
}

#[tokio::test]
async fn refresh_sends_held_csrf_and_bearer() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    mock.respond(REFRESH, vec![refresh_ok("t2", "r2")]);
    let (store, clock) = fixtures();
    seed_credential(&store, "t1", "r1", NOW - 1).await?;
    seed_csrf(&store, "csrf-held", NOW + HOUR_MS).await?;
    let auth = coordinator(&mock, &store, &clock);

    auth.refresh_token().await?;

    let sent = mock.requests(REFRESH);
    assert_eq!(sent[0].header("x-csrf-token").as_deref(), Some("csrf-held"));
    assert_eq!(sent[0].header("authorization").as_deref(), Some("Bearer t1"));
    Ok(())
}

#[tokio::test]
async fn refresh_omits_expired_csrf_without_fetching_one() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    mock.respond(REFRESH, vec![refresh_ok("t2", "r2")]);
    let (store, clock) = fixtures();
    seed_credential(&store, "t1", "r1", NOW - 1).await?;
    seed_csrf(&store, "csrf-old", NOW).await?;
    let auth = coordinator(&mock, &store, &clock);

    auth.refresh_token().await?;

    assert_eq!(mock.requests(REFRESH)[0].header("x-csrf-token"), None);
    assert_eq!(mock.hits("/auth/csrf-token"), 0);
    Ok(())
}

#[tokio::test]
async fn oversized_ttl_pins_expiry_instead_of_overflowing() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    mock.respond(REFRESH, vec![refresh_ok("t2", "r2")]);
    let (store, clock) = fixtures();
    seed_credential(&store, "t1", "r1", NOW - 1).await?;
    let mut config = AuthConfig::for_api(mock.url());
    config.token_ttl_secs = u64::MAX;
    let auth = AuthCoordinator::with_clock(config, store.clone(), clock.clone());

    let cred = auth.refresh_token().await?;

    assert_eq!(cred.expires_at, u64::MAX);
    assert!(auth.is_authenticated().await);
    assert_eq!(mock.hits(REFRESH), 1);
    Ok(())
}

#[tokio::test]
async fn concurrent_refreshes_share_one_request() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    mock.respond(REFRESH, vec![refresh_ok("t2", "r2"), refresh_ok("t3", "r3")]);
    mock.delay(REFRESH, Duration::from_millis(150));
    let (store, clock) = fixtures();
    seed_credential(&store, "t1", "r1", NOW - 1).await?;
    let auth = coordinator(&mock, &store, &clock);

    let outcomes = join_all((0..8).map(|_| auth.refresh_token())).await;

    assert_eq!(mock.hits(REFRESH), 1);
    let first = outcomes[0].clone()?;
    assert_eq!(first.access_token, "t2");
    for outcome in &outcomes {
        assert_eq!(outcome.as_ref().ok(), Some(&first));
    }
    assert!(!auth.is_refreshing());
    Ok(())
}

#[tokio::test]
async fn concurrent_refreshes_across_tasks_share_one_request() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    mock.respond(REFRESH, vec![refresh_ok("t2", "r2")]);
    mock.delay(REFRESH, Duration::from_millis(150));
    let (store, clock) = fixtures();
    seed_credential(&store, "t1", "r1", NOW - 1).await?;
    let auth = coordinator(&mock, &store, &clock);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let auth = auth.clone();
            tokio::spawn(async move { auth.refresh_token().await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await?);
    }

    assert_eq!(mock.hits(REFRESH), 1);
    assert!(outcomes.iter().all(|o| o.as_ref().map(|c| c.access_token.as_str()) == Ok("t2")));
    Ok(())
}

#[tokio::test]
async fn failed_refresh_is_shared_and_logs_out_once() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    mock.respond(
        REFRESH,
        vec![Canned::json(401, json!({ "success": false, "message": "refresh token revoked" }))],
    );
    mock.respond(LOGOUT, vec![Canned::json(200, json!({ "success": true }))]);
    mock.delay(REFRESH, Duration::from_millis(100));
    let (store, clock) = fixtures();
    seed_credential(&store, "t1", "r1", NOW - 1).await?;
    let auth = coordinator(&mock, &store, &clock);

    let outcomes = join_all((0..5).map(|_| auth.refresh_token())).await;

    assert_eq!(mock.hits(REFRESH), 1);
    assert_eq!(mock.hits(LOGOUT), 1);
    let first = outcomes[0].clone();
    assert!(matches!(first, Err(AuthError::RefreshFailed(_))));
    assert!(outcomes.iter().all(|o| *o == first));
    for key in keys::ALL {
        assert_eq!(store.get(key).await?, None, "{key} should be cleared");
    }
    Ok(())
}

#[tokio::test]
async fn next_refresh_after_settle_makes_a_new_request() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    mock.respond(REFRESH, vec![refresh_ok("t2", "r2"), refresh_ok("t3", "r3")]);
    let (store, clock) = fixtures();
    seed_credential(&store, "t1", "r1", NOW - 1).await?;
    let auth = coordinator(&mock, &store, &clock);

    auth.refresh_token().await?;
    let second = auth.refresh_token().await?;

    assert_eq!(mock.hits(REFRESH), 2);
    assert_eq!(second.access_token, "t3");
    assert_eq!(mock.requests(REFRESH)[1].body, json!({ "refreshToken": "r2" }));
    Ok(())
}

#[tokio::test]
async fn missing_refresh_token_fails_fast() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    let (store, clock) = fixtures();
    store.set(vec![(keys::TOKEN, json!("t1"))]).await?;
    let auth = coordinator(&mock, &store, &clock);

    let outcome = auth.refresh_token().await;

    assert_eq!(outcome, Err(AuthError::NoRefreshToken));
    assert_eq!(mock.hits(REFRESH), 0);
    assert_eq!(store.get(keys::TOKEN).await?, None);
    Ok(())
}

#[tokio::test]
async fn non_json_and_unsuccessful_bodies_fail_refresh() -> anyhow::Result<()> {
    for canned in [
        Canned::raw(200, "<html>gateway</html>"),
        Canned::json(200, json!({ "success": false, "message": "nope" })),
        Canned::json(500, json!({ "message": "boom" })),
    ] {
        let mock = MockBackend::start().await?;
        mock.respond(REFRESH, vec![canned]);
        let (store, clock) = fixtures();
        seed_credential(&store, "t1", "r1", NOW - 1).await?;
        let auth = coordinator(&mock, &store, &clock);

        assert!(matches!(auth.refresh_token().await, Err(AuthError::RefreshFailed(_))));
        assert_eq!(store.get(keys::REFRESH_TOKEN).await?, None);
    }
    Ok(())
}

#[tokio::test]
async fn expiry_boundary_decides_refresh() -> anyhow::Result<()> {
    let expires_at = NOW;
    for (now, expect_refresh) in [(expires_at - 1, false), (expires_at, true), (expires_at + 1, true)]
    {
        let mock = MockBackend::start().await?;
        mock.respond(REFRESH, vec![refresh_ok("t2", "r2")]);
        let (store, clock) = fixtures();
        clock.set(now);
        seed_credential(&store, "t1", "r1", expires_at).await?;
        let auth = coordinator(&mock, &store, &clock);

        assert!(auth.is_authenticated().await, "now = expires_at {:+}", now as i64 - NOW as i64);
        assert_eq!(mock.hits(REFRESH), usize::from(expect_refresh));
    }
    Ok(())
}

#[tokio::test]
async fn expired_session_that_cannot_refresh_reads_as_logged_out() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    mock.respond(REFRESH, vec![Canned::json(400, json!({ "success": false }))]);
    mock.respond(LOGOUT, vec![Canned::json(200, json!({ "success": true }))]);
    let (store, clock) = fixtures();
    seed_credential(&store, "t1", "r1", NOW).await?;
    seed_csrf(&store, "csrf-held", NOW + HOUR_MS).await?;
    let auth = coordinator(&mock, &store, &clock);

    assert!(!auth.is_authenticated().await);
    assert_eq!(mock.hits(LOGOUT), 1);
    assert_eq!(mock.requests(LOGOUT)[0].body, json!({ "refreshToken": "r1" }));
    assert!(store.is_empty().await);
    assert_eq!(auth.stored_credential().await?, None);
    Ok(())
}

#[tokio::test]
async fn partial_credential_is_not_authenticated() -> anyhow::Result<()> {
    let mock = MockBackend::start().await?;
    let (store, clock) = fixtures();
    store.set(vec![(keys::REFRESH_TOKEN, json!("r1")), (keys::TOKEN_EXPIRY, json!(NOW + HOUR_MS))]).await?;
    let auth = coordinator(&mock, &store, &clock);

    assert!(!auth.is_authenticated().await);
    assert_eq!(mock.hits(REFRESH), 0);
    Ok(())
}
