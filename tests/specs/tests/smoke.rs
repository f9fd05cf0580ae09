// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Smoke tests that spawn the real `hubd` binary as a subprocess, as
//! opposed to `hub-core`'s own in-process integration tests — this is the
//! only coverage that exercises the actual compiled binary's CLI parsing,
//! logging setup, and TCP bind.

use std::time::Duration;

use hub_specs::HubProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn health_reports_zero_systems_on_a_fresh_hub() -> anyhow::Result<()> {
    let hub = HubProcess::start()?;
    hub.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value = reqwest::get(format!("{}/api/health", hub.base_url())).await?.json().await?;
    assert_eq!(resp["status"], "ok");
    assert_eq!(resp["system_count"], 0);

    Ok(())
}

#[tokio::test]
async fn getkey_returns_a_stable_base64_ed25519_public_key() -> anyhow::Result<()> {
    let hub = HubProcess::start()?;
    hub.wait_healthy(TIMEOUT).await?;

    let first: serde_json::Value = reqwest::get(format!("{}/getkey", hub.base_url())).await?.json().await?;
    let second: serde_json::Value = reqwest::get(format!("{}/getkey", hub.base_url())).await?.json().await?;
    assert_eq!(first["public_key"], second["public_key"], "the hub's identity must not rotate between requests");

    Ok(())
}

#[tokio::test]
async fn universal_token_mint_is_reused_while_active() -> anyhow::Result<()> {
    let hub = HubProcess::start()?;
    hub.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let first: serde_json::Value =
        client.get(format!("{}/universal-token?user_id=u1", hub.base_url())).send().await?.json().await?;
    let second: serde_json::Value =
        client.get(format!("{}/universal-token?user_id=u1", hub.base_url())).send().await?.json().await?;

    assert_eq!(first["token"], second["token"]);

    Ok(())
}

#[tokio::test]
async fn an_agent_can_self_register_against_the_real_binary() -> anyhow::Result<()> {
    let hub = HubProcess::start()?;
    hub.wait_healthy(TIMEOUT).await?;
    let client = reqwest::Client::new();

    let minted: serde_json::Value =
        client.get(format!("{}/universal-token?user_id=u1", hub.base_url())).send().await?.json().await?;
    let token = minted["token"].as_str().ok_or_else(|| anyhow::anyhow!("response missing token field"))?;

    let _agent = hub_core::test_support::FakeAgent::connect(hub.addr(), token, "45876").await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let resp: serde_json::Value = reqwest::get(format!("{}/api/health", hub.base_url())).await?.json().await?;
        if resp["system_count"] == 1 {
            return Ok(());
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("system_count never reached 1 against the real binary");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
