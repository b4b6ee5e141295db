use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    /// Key namespace shared by every component talking to the store.
    pub app_domain: String,
    pub port: u16,
    /// Length of one pacing segment, in seconds.
    pub pacing_segment_secs: i64,
    pub transaction_log_path: String,
    pub bid_log_path: String,
    /// Full JSON bid log lines when true, one-line summaries when false.
    pub bid_log_full: bool,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            redis_url: require_env("REDIS_URL")?,
            app_domain: std::env::var("APP_DOMAIN").unwrap_or_else(|_| "rtb".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            pacing_segment_secs: std::env::var("PACING_SEGMENT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse::<i64>()
                .context("PACING_SEGMENT_SECS must be a positive integer")?,
            transaction_log_path: std::env::var("TRANSACTION_LOG_PATH")
                .unwrap_or_else(|_| "transactions.log".to_string()),
            bid_log_path: std::env::var("BID_LOG_PATH")
                .unwrap_or_else(|_| "bids.log".to_string()),
            bid_log_full: std::env::var("BID_LOG_FULL")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<bool>()
                .context("BID_LOG_FULL must be true or false")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
