use serde::Deserialize;
use std::time::Duration;

use crate::services::aggregation::AggregationLimits;
use crate::services::providers::steam::ClientSettings;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Steam Web API key
    pub steam_api_key: String,

    /// 64-bit Steam id of the primary user
    pub steam_id: String,

    /// Steam Web API base URL
    #[serde(default = "default_steam_api_url")]
    pub steam_api_url: String,

    /// Storefront base URL used in rendered links
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Minimum delay between two Steam API requests (ms)
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay: u64,

    /// Extra attempts for a failed request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries (ms), multiplied by the attempt number
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Friends considered per run
    #[serde(default = "default_max_friends_to_process")]
    pub max_friends_to_process: usize,

    /// Per-friend failures tolerated before a run stops early
    #[serde(default = "default_max_failed_requests")]
    pub max_failed_requests: usize,

    /// Per-request timeout (ms)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Snapshot file used when no Redis URL is configured
    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    /// Snapshot lifetime in seconds
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age: u64,

    /// Redis connection URL; switches the cache store to Redis when set
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_steam_api_url() -> String {
    "https://api.steampowered.com".to_string()
}

fn default_store_url() -> String {
    "https://store.steampowered.com".to_string()
}

/// Upper bound for every millisecond setting (one hour)
const MAX_DELAY_MS: u64 = 3_600_000;

fn default_rate_limit_delay() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    5000
}

fn default_max_friends_to_process() -> usize {
    20
}

fn default_max_failed_requests() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    30000
}

fn default_cache_path() -> String {
    "cache.json".to_string()
}

fn default_cache_max_age() -> u64 {
    86400
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make a run meaningless
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.steam_api_key.trim().is_empty() {
            anyhow::bail!("STEAM_API_KEY must not be empty");
        }
        if self.steam_id.trim().is_empty() || self.steam_id.parse::<u64>().is_err() {
            anyhow::bail!("STEAM_ID must be a numeric 64-bit Steam id");
        }
        if self.max_friends_to_process == 0 {
            anyhow::bail!("MAX_FRIENDS_TO_PROCESS must be at least 1");
        }
        if self.request_timeout == 0 {
            anyhow::bail!("REQUEST_TIMEOUT must be greater than zero");
        }
        for (name, value) in [
            ("RATE_LIMIT_DELAY", self.rate_limit_delay),
            ("RETRY_DELAY", self.retry_delay),
            ("REQUEST_TIMEOUT", self.request_timeout),
        ] {
            if value > MAX_DELAY_MS {
                anyhow::bail!("{} must be at most {} ms", name, MAX_DELAY_MS);
            }
        }
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            api_key: self.steam_api_key.clone(),
            api_url: self.steam_api_url.trim_end_matches('/').to_string(),
            steam_id: self.steam_id.clone(),
            rate_limit_delay: Duration::from_millis(self.rate_limit_delay),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay),
            request_timeout: Duration::from_millis(self.request_timeout),
        }
    }

    pub fn aggregation_limits(&self) -> AggregationLimits {
        AggregationLimits {
            max_members: self.max_friends_to_process,
            max_failures: self.max_failed_requests,
            ..AggregationLimits::default()
        }
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age)
    }
}
