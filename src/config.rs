use anyhow::{Context, Result};

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the catalog service that supplies candidate tracks
    pub catalog_base_url: Option<String>,
    pub catalog_api_token: Option<String>,
    pub catalog_timeout_secs: u64,
}

const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 10;

/// Load configuration from `.env` and environment
pub fn load_config() -> Result<Config> {
    // Load `.env` file if present
    dotenv::dotenv().ok();

    let catalog_base_url = non_blank_var("CATALOG_BASE_URL");
    let catalog_api_token = non_blank_var("CATALOG_API_TOKEN");
    let catalog_timeout_secs = match non_blank_var("CATALOG_TIMEOUT_SECS") {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("CATALOG_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"))?,
        None => DEFAULT_CATALOG_TIMEOUT_SECS,
    };

    Ok(Config {
        catalog_base_url,
        catalog_api_token,
        catalog_timeout_secs,
    })
}

fn non_blank_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
