//! `wayfarer status` — Show the effective configuration.

use std::path::Path;
use wayfarer_config::AppConfig;
use wayfarer_core::Provider;

pub async fn run(explicit: Option<&Path>, check: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(explicit)?;
    let config_path = super::config_path(explicit);

    let capabilities: Vec<String> = wayfarer_tools::default_invoker(&config.capabilities)
        .ids()
        .iter()
        .map(|id| id.to_string())
        .collect();

    println!("🧭 Wayfarer Status");
    println!("==================");
    println!("  Config file:   {}", config_path.display());
    println!("  Provider:      {}", config.provider.kind);
    println!("  Model:         {}", config.provider.model);
    println!(
        "  API key:       {}",
        if config.has_api_key() { "set" } else { "missing" }
    );
    println!(
        "  Temperatures:  decide {} / answer {}",
        config.provider.decision_temperature, config.provider.synthesis_temperature
    );
    println!("  Max steps:     {}", config.agent.max_steps);
    println!("  Retries:       {}", config.agent.decision_retries);
    println!("  Duplicates:    {:?}", config.agent.duplicate_detection);
    println!("  Capabilities:  {}", capabilities.join(", "));
    println!(
        "  Result cache:  {}",
        if config.capabilities.cache_ttl_secs > 0 {
            format!("{}s", config.capabilities.cache_ttl_secs)
        } else {
            "disabled".into()
        }
    );
    println!("  Gateway:       {}:{}", config.gateway.host, config.gateway.port);
    if check {
        println!("  Reachable:     {}", provider_check(&config).await);
    }

    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `wayfarer onboard` first");
    }

    Ok(())
}

/// Ask the configured provider whether it answers with our credentials.
pub async fn provider_check(config: &AppConfig) -> String {
    let provider = match wayfarer_providers::build_from_config(&config.provider) {
        Ok(provider) => provider,
        Err(e) => return format!("not checked ({e})"),
    };
    match provider.health_check().await {
        Ok(true) => "yes".into(),
        Ok(false) => "no, the provider rejected the request (check the API key)".into(),
        Err(e) => format!("no ({e})"),
    }
}
