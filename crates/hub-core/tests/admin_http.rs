// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the admin HTTP surface, exercising the full stack
//! in-process via a real TCP listener (`hub_core::test_support`).

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;

use hub_core::test_support::{spawn_http_server, test_state};

#[tokio::test]
async fn health_reports_zero_systems_on_a_fresh_hub() -> anyhow::Result<()> {
    let (addr, _server) = spawn_http_server(test_state()).await?;

    let resp: serde_json::Value = reqwest::get(format!("http://{addr}/api/health")).await?.json().await?;
    assert_eq!(resp["status"], "ok");
    assert_eq!(resp["system_count"], 0);

    Ok(())
}

#[tokio::test]
async fn getkey_returns_a_valid_base64_ed25519_public_key() -> anyhow::Result<()> {
    let (addr, _server) = spawn_http_server(test_state()).await?;

    let resp: serde_json::Value = reqwest::get(format!("http://{addr}/getkey")).await?.json().await?;
    let encoded = resp["public_key"].as_str().ok_or_else(|| anyhow::anyhow!("response missing public_key field"))?;
    let decoded = BASE64_STANDARD.decode(encoded)?;
    assert_eq!(decoded.len(), 32, "ed25519 public keys are 32 bytes");

    Ok(())
}

#[tokio::test]
async fn universal_token_mint_is_reused_while_active() -> anyhow::Result<()> {
    let (addr, _server) = spawn_http_server(test_state()).await?;
    let client = reqwest::Client::new();

    let first: serde_json::Value =
        client.get(format!("http://{addr}/universal-token?user_id=u1")).send().await?.json().await?;
    let second: serde_json::Value =
        client.get(format!("http://{addr}/universal-token?user_id=u1")).send().await?.json().await?;

    assert_eq!(first["active"], true);
    assert_eq!(first["token"], second["token"], "an active token must not be re-minted on every call");

    Ok(())
}

#[tokio::test]
async fn create_user_only_succeeds_while_the_user_table_is_empty() -> anyhow::Result<()> {
    let (addr, _server) = spawn_http_server(test_state()).await?;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("http://{addr}/create-user"))
        .json(&serde_json::json!({ "email": "admin@example.com" }))
        .send()
        .await?;
    assert_eq!(first.status().as_u16(), 200);

    let second = client
        .post(format!("http://{addr}/create-user"))
        .json(&serde_json::json!({ "email": "someone-else@example.com" }))
        .send()
        .await?;
    assert_eq!(second.status().as_u16(), 401, "first-run endpoint must close once a user exists");

    Ok(())
}

#[tokio::test]
async fn config_yaml_requires_the_admin_token_when_one_is_configured() -> anyhow::Result<()> {
    use hub_core::test_support::test_config;

    let mut config = test_config();
    config.admin_token = Some("s3cret".to_owned());
    let (addr, _server) = spawn_http_server(hub_core::test_support::test_state_with_config(config)).await?;
    let client = reqwest::Client::new();

    let unauthenticated = client.get(format!("http://{addr}/config-yaml")).send().await?;
    assert_eq!(unauthenticated.status().as_u16(), 401);

    let authenticated = client
        .get(format!("http://{addr}/config-yaml"))
        .header("authorization", "Bearer s3cret")
        .send()
        .await?;
    assert_eq!(authenticated.status().as_u16(), 200);
    let body = authenticated.text().await?;
    assert!(body.starts_with("systems:"));

    Ok(())
}
