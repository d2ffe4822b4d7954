//! `supportdesk serve`: Start the HTTP API server.

use super::{build_pipeline, load_config, open_store};
use std::path::Path;
use supportdesk_core::KnowledgeStore;
use supportdesk_gateway::GatewayState;

pub async fn run(
    explicit: Option<&Path>,
    port_override: Option<u16>,
    host_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(explicit)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    let store = open_store(&config).await?;
    let pipeline = build_pipeline(&config, store.clone()).await?;

    println!("SupportDesk Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store: {} ({})", store.name(), config.store.collection);
    println!("   Model: {}", config.generation.model);

    supportdesk_gateway::start(&config.gateway, GatewayState { pipeline, store }).await?;

    Ok(())
}
