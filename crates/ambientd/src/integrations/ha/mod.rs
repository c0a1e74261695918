mod client;
mod config;
#[allow(clippy::module_inception)]
mod ha;
mod websocket;

use anyhow::Context;
pub use client::RestClient;
pub use config::Config as HaConfig;
pub use ha::HaIntegration;
use linkme::distributed_slice;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_ha(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let ha_config = if let Some(c) = &ctx.config.integrations.ha {
        c
    } else {
        return Ok(None);
    };

    let client = RestClient::new(ha_config).context("Failed to create Home Assistant client")?;
    Ok(Some(Box::new(HaIntegration::new(client, ha_config))))
}
