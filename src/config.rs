//! Application Configuration
//!
//! Features:
//! - Environment-based profiles (dev/staging/prod)
//! - Environment variable overrides
//! - Boundary limits on scenario size
//! - Configuration validation

use crate::error::{Error, Result};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(Error::ConfigError(format!("Invalid environment: {}", s))),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Environment type
    pub environment: Environment,

    /// Server configuration
    pub server: ServerConfig,

    /// Input size limits enforced at the API boundary
    pub limits: EngineLimits,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Number of worker threads (0 = auto)
    pub workers: usize,

    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Max request body size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,

    /// Enable compression
    pub enable_compression: bool,
}

/// Safety analysis is O(n^2 * m) and recovery repeats it up to n times,
/// so the boundary caps n and m.
#[derive(Debug, Clone, Serialize)]
pub struct EngineLimits {
    pub max_processes: usize,
    pub max_resources: usize,
    pub max_cores: usize,
}

impl EngineLimits {
    pub fn check(&self, processes: usize, resources: usize) -> Result<()> {
        if processes > self.max_processes {
            return Err(Error::InvalidInput(format!(
                "{} processes exceeds the limit of {}",
                processes, self.max_processes
            )));
        }
        if resources > self.max_resources {
            return Err(Error::InvalidInput(format!(
                "{} resources exceeds the limit of {}",
                resources, self.max_resources
            )));
        }
        Ok(())
    }

    pub fn check_cores(&self, cores: usize) -> Result<()> {
        if cores > self.max_cores {
            return Err(Error::InvalidInput(format!(
                "{} cores exceeds the limit of {}",
                cores, self.max_cores
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let env = std::env::var("DEADLOCK_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .parse()?;

        let mut config = match env {
            Environment::Development => Self::development(),
            Environment::Staging => Self::staging(),
            Environment::Production => Self::production(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Development configuration
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                workers: 0,
                request_timeout: 30,
                max_body_size: 1024 * 1024, // 1MB
                enable_cors: true,
                enable_compression: false,
            },
            limits: EngineLimits {
                max_processes: 64,
                max_resources: 32,
                max_cores: 16,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    /// Staging configuration
    pub fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.server.host = "0.0.0.0".to_string();
        config.logging.level = "info".to_string();
        config
    }

    /// Production configuration
    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: 0, // Auto-detect
                request_timeout: 10,
                max_body_size: 256 * 1024, // 256KB
                enable_cors: false,
                enable_compression: true,
            },
            limits: EngineLimits {
                max_processes: 32,
                max_resources: 16,
                max_cores: 8,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("DEADLOCK_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("DEADLOCK_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::ConfigError("Invalid DEADLOCK_PORT".to_string()))?;
        }
        if let Ok(max) = std::env::var("DEADLOCK_MAX_PROCESSES") {
            self.limits.max_processes = max
                .parse()
                .map_err(|_| Error::ConfigError("Invalid DEADLOCK_MAX_PROCESSES".to_string()))?;
        }
        if let Ok(max) = std::env::var("DEADLOCK_MAX_RESOURCES") {
            self.limits.max_resources = max
                .parse()
                .map_err(|_| Error::ConfigError("Invalid DEADLOCK_MAX_RESOURCES".to_string()))?;
        }
        if let Ok(level) = std::env::var("DEADLOCK_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_processes == 0
            || self.limits.max_resources == 0
            || self.limits.max_cores == 0
        {
            return Err(Error::ConfigError(
                "Engine limits must all be positive".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(Error::ConfigError(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(Error::ConfigError(format!(
                "Invalid log format: {}",
                self.logging.format
            )));
        }

        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| {
                Error::ConfigError(format!(
                    "Invalid bind address {}:{}",
                    self.server.host, self.server.port
                ))
            })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get request timeout as Duration
    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout)
    }
}

/// Configuration builder for programmatic setup
pub struct ConfigBuilder {
    config: AppConfig,
}

impl ConfigBuilder {
    pub fn new(env: Environment) -> Self {
        let config = match env {
            Environment::Development => AppConfig::development(),
            Environment::Staging => AppConfig::staging(),
            Environment::Production => AppConfig::production(),
        };

        Self { config }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_processes(mut self, max: usize) -> Self {
        self.config.limits.max_processes = max;
        self
    }

    pub fn with_max_resources(mut self, max: usize) -> Self {
        self.config.limits.max_resources = max;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Result<AppConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.server.port, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_config() {
        let config = AppConfig::production();
        assert!(config.is_production());
        assert!(config.server.enable_compression);
        assert!(config.limits.max_processes < AppConfig::development().limits.max_processes);
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Stage".parse::<Environment>().unwrap(), Environment::Staging);
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new(Environment::Development)
            .with_port(4000)
            .with_max_processes(10)
            .build()
            .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.limits.max_processes, 10);
        assert_eq!(config.bind_addr().unwrap().port(), 4000);
    }

    #[test]
    fn test_validation_rejects_zero_limits_and_bad_level() {
        assert!(ConfigBuilder::new(Environment::Development)
            .with_max_resources(0)
            .build()
            .is_err());
        assert!(ConfigBuilder::new(Environment::Development)
            .with_log_level("verbose")
            .build()
            .is_err());
    }

    #[test]
    fn test_config_serializes_for_startup_log() {
        let json = serde_json::to_value(AppConfig::production()).unwrap();

        assert_eq!(json["environment"], "production");
        assert_eq!(json["server"]["port"], 8080);
        assert_eq!(json["limits"]["max_processes"], 32);
        assert_eq!(json["logging"]["format"], "json");
    }

    #[test]
    fn test_limits() {
        let limits = AppConfig::development().limits;
        assert!(limits.check(64, 32).is_ok());
        assert!(matches!(limits.check(65, 1), Err(Error::InvalidInput(_))));
        assert!(matches!(limits.check(1, 33), Err(Error::InvalidInput(_))));
        assert!(limits.check_cores(17).is_err());
    }
}
