//! `wayfarer onboard` — First-time setup.

use std::path::Path;
use wayfarer_config::AppConfig;

pub async fn run(explicit: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = super::config_path(explicit);

    println!("🧭 Wayfarer — First-Time Setup");
    println!("==============================\n");

    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        std::fs::create_dir_all(dir)?;
        println!("✅ Created config directory: {}", dir.display());
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set GEMINI_API_KEY (or add api_key under [provider])");
    println!("   2. Run: wayfarer ask \"What's the weather in Lisbon?\"");
    println!("   3. Or serve the HTTP API: wayfarer gateway\n");

    Ok(())
}
