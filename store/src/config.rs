//! Store configuration.

use std::time::Duration;

const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Connection pool and locking configuration shared by both store
/// implementations.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database URL (PostgreSQL only).
    pub database_url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long `begin` may wait for a free connection.
    pub acquire_timeout: Duration,
    /// How long a unit of work may wait for a row lock.
    pub lock_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/innkeep".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("Max connections cannot be 0".to_string());
        }

        // Timeouts are applied at millisecond precision.
        if self.lock_timeout < MIN_TIMEOUT {
            return Err("Lock timeout must be at least 1ms".to_string());
        }

        if self.acquire_timeout < MIN_TIMEOUT {
            return Err("Acquire timeout must be at least 1ms".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(StoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sub_millisecond_timeouts_are_rejected() {
        let config = StoreConfig {
            lock_timeout: Duration::from_micros(500),
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            acquire_timeout: Duration::from_micros(999),
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            lock_timeout: Duration::from_millis(1),
            acquire_timeout: Duration::from_millis(1),
            ..StoreConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
