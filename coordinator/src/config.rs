//! Coordinator configuration.

use std::time::Duration;

use innkeep_store::StoreConfig;

/// Caller-side retry configuration for transient errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

/// Main coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Store configuration.
    pub store: StoreConfig,
    /// Retry configuration used by callers of the coordinator.
    pub retry: RetryConfig,
    /// Log level.
    pub log_level: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            retry: RetryConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.store.database_url = url;
        }

        if let Ok(max) = std::env::var("INNKEEP_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                config.store.max_connections = max;
            }
        }

        if let Ok(ms) = std::env::var("INNKEEP_ACQUIRE_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.store.acquire_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(ms) = std::env::var("INNKEEP_LOCK_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.store.lock_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()?;

        if self.store.database_url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }

        if self.retry.max_attempts == 0 {
            return Err("Retry attempts cannot be 0".to_string());
        }

        if self.retry.base_delay > self.retry.max_delay {
            return Err("Base retry delay cannot exceed max delay".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = CoordinatorConfig::default();
        config.store.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.store.lock_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = CoordinatorConfig::default();
        config.retry.base_delay = Duration::from_secs(5);
        assert!(config.validate().is_err());
    }
}
