//! Guardian HTTP service entry point.
//!
//! # Purpose
//! Loads configuration and runs the service until Ctrl-C.
use anyhow::Context;
use guardian::config::GuardianConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GuardianConfig::from_env_or_yaml().context("load guardian config")?;
    guardian::run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
