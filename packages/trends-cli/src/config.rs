use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Connection settings loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_token: String,
    pub identity_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            api_url: env::var("TRENDS_API_URL").context("TRENDS_API_URL must be set")?,
            api_token: env::var("TRENDS_API_TOKEN").context("TRENDS_API_TOKEN must be set")?,
            identity_token: env::var("TRENDS_IDENTITY_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
        })
    }
}
