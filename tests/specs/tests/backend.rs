// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contract checks for the fake backend itself, so session tests can lean
//! on it.

use std::time::Duration;

use portal_specs::{ensure_crypto, FakeBackend, EMAIL, PASSWORD, USER_ID};
use serde_json::{json, Value};

async fn login(client: &reqwest::Client, backend: &FakeBackend) -> anyhow::Result<Value> {
    let resp = client
        .post(format!("{}/auth/login", backend.api_url()))
        .json(&json!({ "email": EMAIL, "password": PASSWORD }))
        .send()
        .await?;
    anyhow::ensure!(resp.status() == 200, "login status {}", resp.status());
    Ok(resp.json().await?)
}

#[tokio::test]
async fn login_issues_tokens_and_user() -> anyhow::Result<()> {
    ensure_crypto();
    let backend = FakeBackend::start().await?;
    let client = reqwest::Client::new();

    let body = login(&client, &backend).await?;
    assert_eq!(body["access_token"].as_str(), backend.current_access_token().as_deref());
    assert_eq!(body["refresh_token"].as_str(), backend.current_refresh_token().as_deref());
    assert_eq!(body["user"]["id"], USER_ID);
    assert_eq!(backend.login_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_rejected() -> anyhow::Result<()> {
    ensure_crypto();
    let backend = FakeBackend::start().await?;
    let resp = reqwest::Client::new()
        .post(format!("{}/auth/login", backend.api_url()))
        .json(&json!({ "email": EMAIL, "password": "nope" }))
        .send()
        .await?;
    assert_eq!(resp.status(), 401);
    assert!(backend.current_access_token().is_none());
    Ok(())
}

#[tokio::test]
async fn expired_access_token_is_refused_until_refresh() -> anyhow::Result<()> {
    ensure_crypto();
    let backend = FakeBackend::start().await?;
    let client = reqwest::Client::new();
    let body = login(&client, &backend).await?;
    let access = body["access_token"].as_str().unwrap_or_default().to_owned();
    let refresh = body["refresh_token"].as_str().unwrap_or_default().to_owned();

    let articles = format!("{}/articles", backend.api_url());
    let resp = client.get(&articles).bearer_auth(&access).send().await?;
    assert_eq!(resp.status(), 200);

    backend.expire_access_token();
    let resp = client.get(&articles).bearer_auth(&access).send().await?;
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/auth/refresh", backend.api_url()))
        .json(&json!({ "refresh_token": refresh }))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await?;
    let fresh = body["data"]["access_token"].as_str().unwrap_or_default().to_owned();
    assert_ne!(fresh, access);
    assert_eq!(body["data"]["refresh_token"].as_str(), backend.current_refresh_token().as_deref());

    let resp = client.get(&articles).bearer_auth(&fresh).send().await?;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["served_with"], fresh);
    assert_eq!(backend.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn refresh_without_rotation_keeps_refresh_token() -> anyhow::Result<()> {
    ensure_crypto();
    let backend = FakeBackend::start().await?;
    backend.set_rotate_refresh(false);
    let client = reqwest::Client::new();
    let body = login(&client, &backend).await?;

    let resp = client
        .post(format!("{}/auth/refresh", backend.api_url()))
        .json(&json!({ "refresh_token": body["refresh_token"] }))
        .send()
        .await?;
    let refreshed: Value = resp.json().await?;
    assert!(refreshed["data"].get("refresh_token").is_none());
    assert_eq!(body["refresh_token"].as_str(), backend.current_refresh_token().as_deref());
    Ok(())
}

#[tokio::test]
async fn gate_releases_unauthorized_batch_together() -> anyhow::Result<()> {
    ensure_crypto();
    let backend = FakeBackend::start().await?;
    backend.gate_unauthorized(3);
    let client = reqwest::Client::new();
    let articles = format!("{}/articles", backend.api_url());

    let first = tokio::spawn({
        let client = client.clone();
        let url = articles.clone();
        async move { client.get(url).send().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!first.is_finished());

    let rest: Vec<_> = (0..2)
        .map(|_| {
            let client = client.clone();
            let url = articles.clone();
            tokio::spawn(async move { client.get(url).send().await })
        })
        .collect();

    assert_eq!(first.await??.status(), 401);
    for handle in rest {
        assert_eq!(handle.await??.status(), 401);
    }

    // Gate is spent: a lone 401 comes straight back.
    let resp = tokio::time::timeout(Duration::from_secs(5), client.get(&articles).send()).await??;
    assert_eq!(resp.status(), 401);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_everything() -> anyhow::Result<()> {
    ensure_crypto();
    let backend = FakeBackend::start().await?;
    let client = reqwest::Client::new();
    let body = login(&client, &backend).await?;

    let resp = client.post(format!("{}/auth/logout", backend.api_url())).send().await?;
    assert_eq!(resp.status(), 204);
    assert_eq!(backend.logout_calls(), 1);

    let resp = client
        .post(format!("{}/auth/refresh", backend.api_url()))
        .json(&json!({ "refresh_token": body["refresh_token"] }))
        .send()
        .await?;
    assert_eq!(resp.status(), 401);
    Ok(())
}
