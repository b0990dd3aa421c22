//! API configuration

use serde::Deserialize;

/// API and scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Log level
    pub log_level: String,
    /// Seconds between scheduler ticks
    pub scheduler_interval_secs: u64,
    /// System-wide cap on concurrently running jobs
    pub max_running_jobs: usize,
    /// How many line-generation jobs a campaign is split into
    pub pool_jobs_per_campaign: usize,
    /// Callback retry budget
    pub callback_max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            scheduler_interval_secs: 60,
            max_running_jobs: 1,
            pool_jobs_per_campaign: 4,
            callback_max_retries: 42,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `BILLING_`-prefixed environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("BILLING"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.max_running_jobs, 1);
        assert_eq!(config.pool_jobs_per_campaign, 4);
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
    }
}
