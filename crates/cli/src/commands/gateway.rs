//! `wayfarer gateway` — Start the HTTP API server.

use std::path::Path;

pub async fn run(
    explicit: Option<&Path>,
    port_override: Option<u16>,
    host_override: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(explicit)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("🧭 Wayfarer Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:   {} ({})", config.provider.kind, config.provider.model);
    println!("   Stream:     POST /v1/chat/stream");

    wayfarer_gateway::start(config).await?;

    Ok(())
}
