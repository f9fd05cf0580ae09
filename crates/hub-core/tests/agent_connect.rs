// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end coverage of the persistent-channel handshake and the
//! universal-token self-registration flow (spec scenarios S1/S2), driven
//! over a real WebSocket against an in-process hub.

use std::time::Duration;

use hub_core::test_support::{generate_agent_pkcs8, spawn_http_server, test_state, FakeAgent};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn mint_universal_token(addr: std::net::SocketAddr, user_id: &str) -> anyhow::Result<String> {
    let resp: serde_json::Value = reqwest::Client::new()
        .get(format!("http://{addr}/universal-token?user_id={user_id}"))
        .send()
        .await?
        .json()
        .await?;
    Ok(resp["token"].as_str().ok_or_else(|| anyhow::anyhow!("response missing token field"))?.to_owned())
}

async fn system_count(addr: std::net::SocketAddr) -> anyhow::Result<u64> {
    let resp: serde_json::Value = reqwest::get(format!("http://{addr}/api/health")).await?.json().await?;
    Ok(resp["system_count"].as_u64().unwrap_or(0))
}

async fn wait_for_system_count(addr: std::net::SocketAddr, expected: u64) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if system_count(addr).await? == expected {
            return Ok(());
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("system_count never reached {expected}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn universal_token_connect_self_registers_a_new_system() -> anyhow::Result<()> {
    let (addr, _server) = spawn_http_server(test_state()).await?;
    let token = mint_universal_token(addr, "u1").await?;

    let _agent = FakeAgent::connect(addr, &token, "45876").await?;
    wait_for_system_count(addr, 1).await?;

    Ok(())
}

#[tokio::test]
async fn reconnecting_with_the_same_token_and_key_does_not_create_a_second_system() -> anyhow::Result<()> {
    let (addr, _server) = spawn_http_server(test_state()).await?;
    let token = mint_universal_token(addr, "u1").await?;
    let pkcs8 = generate_agent_pkcs8()?;

    let first = FakeAgent::connect_with_pkcs8(addr, &token, "45876", &pkcs8).await?;
    wait_for_system_count(addr, 1).await?;
    first.close().await?;

    let _second = FakeAgent::connect_with_pkcs8(addr, &token, "45876", &pkcs8).await?;
    wait_for_system_count(addr, 1).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(system_count(addr).await?, 1, "reconnecting as the same identity must not mint a second System");

    Ok(())
}

#[tokio::test]
async fn fingerprint_mismatch_on_a_known_token_is_rejected_without_mutating_state() -> anyhow::Result<()> {
    let (addr, _server) = spawn_http_server(test_state()).await?;
    let token = mint_universal_token(addr, "u1").await?;

    let first = FakeAgent::connect(addr, &token, "45876").await?;
    wait_for_system_count(addr, 1).await?;
    first.close().await?;

    // A second agent, presenting the same (now-bound) token but a distinct
    // identity, must be rejected rather than silently rebound.
    let second = FakeAgent::connect(addr, &token, "45876").await?;
    let outcome = second.serve_one_request(serde_json::json!({})).await;
    assert!(outcome.is_err(), "hub should have closed the socket instead of forwarding a request");

    assert_eq!(system_count(addr).await?, 1, "a rejected handshake must not register a second system");

    Ok(())
}
