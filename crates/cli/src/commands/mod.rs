//! Subcommand implementations.

pub mod init;
pub mod run;
pub mod serve;
pub mod tools;

use stepwise_config::AppConfig;

/// Load configuration, turning failures into a readable message.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// Print setup instructions when no API key is available.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    STEPWISE_API_KEY     (generic)");
    eprintln!("    OPENROUTER_API_KEY   (for OpenRouter)");
    eprintln!("    OPENAI_API_KEY       (for OpenAI direct)");
    eprintln!();
    eprintln!("  Or add `api_key` to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
