//! Registry configuration.

use std::time::Duration;

use rentescrow_common::time::constants;
use rentescrow_common::Identity;

/// Largest capacity a broadcast channel accepts.
pub const MAX_EVENT_CHANNEL_CAPACITY: usize = usize::MAX >> 1;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" | "text" => Some(LogFormat::Pretty),
            _ => None,
        }
    }
}

/// Main registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Admin identity, fixed for the lifetime of the registry.
    pub admin: Identity,
    /// Length of one rental day.
    pub day_unit: Duration,
    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,
    /// Record every event in the hash-chained audit trail.
    pub audit_enabled: bool,
    /// Log level.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            admin: Identity::new("admin"),
            day_unit: Duration::from_secs(constants::DAY_UNIT_SECS),
            event_channel_capacity: 1024,
            audit_enabled: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl RegistryConfig {
    /// Create a default configuration with the given admin.
    pub fn with_admin(admin: impl Into<Identity>) -> Self {
        Self {
            admin: admin.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(admin) = std::env::var("REGISTRY_ADMIN") {
            config.admin = Identity::new(admin);
        }

        if let Ok(secs) = std::env::var("REGISTRY_DAY_UNIT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.day_unit = Duration::from_secs(secs);
            }
        }

        if let Ok(capacity) = std::env::var("REGISTRY_EVENT_CAPACITY") {
            if let Ok(capacity) = capacity.parse() {
                config.event_channel_capacity = capacity;
            }
        }

        if let Ok(audit) = std::env::var("REGISTRY_AUDIT") {
            config.audit_enabled = !matches!(audit.as_str(), "0" | "false" | "off");
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = std::env::var("LOG_FORMAT") {
            if let Some(format) = LogFormat::parse(&format) {
                config.log_format = format;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.admin.is_valid() {
            return Err(format!("Invalid admin identity: {:?}", self.admin.as_str()));
        }

        if self.day_unit.as_secs() == 0 {
            return Err("Day unit must be at least one second".to_string());
        }

        // Rental days are counted in whole milliseconds.
        if self.day_unit.subsec_nanos() % 1_000_000 != 0 {
            return Err(format!(
                "Day unit must be a whole number of milliseconds: {:?}",
                self.day_unit
            ));
        }

        self.day_unit_chrono()?;

        if self.event_channel_capacity == 0 {
            return Err("Event channel capacity cannot be 0".to_string());
        }

        if self.event_channel_capacity > MAX_EVENT_CHANNEL_CAPACITY {
            return Err(format!(
                "Event channel capacity {} exceeds {}",
                self.event_channel_capacity, MAX_EVENT_CHANNEL_CAPACITY
            ));
        }

        Ok(())
    }

    /// Day unit as a chrono duration.
    pub fn day_unit_chrono(&self) -> Result<chrono::Duration, String> {
        chrono::Duration::from_std(self.day_unit)
            .map_err(|_| format!("Day unit {:?} is out of range", self.day_unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.day_unit_chrono(), Ok(chrono::Duration::days(1)));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = RegistryConfig::default();
        config.event_channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = RegistryConfig::default();
        config.day_unit = Duration::from_millis(10);
        assert!(config.validate().is_err());

        let config = RegistryConfig::with_admin("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut config = RegistryConfig::default();
        config.event_channel_capacity = usize::MAX;
        assert!(config.validate().is_err());

        config.event_channel_capacity = MAX_EVENT_CHANNEL_CAPACITY;
        assert!(config.validate().is_ok());

        let mut config = RegistryConfig::default();
        config.day_unit = Duration::from_secs(u64::MAX);
        assert!(config.validate().is_err());
        assert!(config.day_unit_chrono().is_err());

        let mut config = RegistryConfig::default();
        config.day_unit = Duration::new(60, 500);
        assert!(config.validate().is_err());

        config.day_unit = Duration::from_millis(60_250);
        assert!(config.validate().is_ok());
        assert_eq!(config.day_unit_chrono(), Ok(chrono::Duration::milliseconds(60_250)));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
