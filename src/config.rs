use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Process configuration, read once from the environment at startup.
///
/// Only the database URL is required. When `WEBDRIVER_URL` is missing the
/// scraping capability stays off and the control surface runs in a degraded
/// read-only mode.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub webdriver_url: Option<String>,
    pub session_path: PathBuf,
    pub profile_base: String,
    pub metrics_url: String,
    pub webhook_url: Option<String>,
    pub log_path: PathBuf,
    pub screenshot_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        Ok(Self {
            database_url,
            webdriver_url: env::var("WEBDRIVER_URL").ok(),
            session_path: env::var("SESSION_STATE_PATH")
                .unwrap_or_else(|_| "./auth/local_cookies.json".to_string())
                .into(),
            profile_base: env::var("PROFILE_BASE_URL").unwrap_or_else(|_| {
                "https://www.streetfighter.com/6/buckler/ja-jp/profile".to_string()
            }),
            metrics_url: env::var("TUNNEL_METRICS_URL")
                .unwrap_or_else(|_| "http://sf6_tunnel:2000/metrics".to_string()),
            webhook_url: env::var("DISCORD_WEBHOOK_URL").ok(),
            log_path: env::var("LOG_FILE")
                .unwrap_or_else(|_| "scraper.log".to_string())
                .into(),
            screenshot_path: env::var("FULL_SCREENSHOT_PATH")
                .unwrap_or_else(|_| "./debug_full_screen.png".to_string())
                .into(),
        })
    }
}
