//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Server
//!
//! - `HOST` / `PORT`: Listen address (default: `localhost:3000`)
//! - `NODE_ENV`: Deployment environment; `development` enables debug file logging
//!
//! # Request Handling
//!
//! - `EXPRESS_JSON_LIMIT`: Maximum JSON body size (default: `10mb`)
//! - `EXPRESS_URLENCODED_LIMIT`: Maximum form body size (default: `10mb`)
//! - `REQUEST_TIMEOUT`: Request timeout in milliseconds (default: 30000)
//! - `SLOW_RESPONSE_THRESHOLD`: Slow response threshold in milliseconds (default: 1000)
//!
//! # Security
//!
//! - `CORS_ORIGINS`: Comma-separated list of allowed origins, `*` for any
//! - `SECURITY_COMPRESSION_THRESHOLD`: Minimum body size in bytes to compress (default: 1024)
//! - `SECURITY_MAX_HEADERS`: Header count above which a request is flagged (default: 50)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Environment name that enables debug-level file logging.
pub const DEVELOPMENT_ENV: &str = "development";

/// Default allowed CORS origins when `CORS_ORIGINS` is unset.
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "localhost")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    /// Deployment environment (default: "development")
    pub environment: String,

    // =========================================================================
    // Request Handling Configuration
    // =========================================================================
    /// Maximum JSON request body size in bytes (default: 10MB)
    pub json_limit: usize,

    /// Maximum URL-encoded request body size in bytes (default: 10MB)
    pub urlencoded_limit: usize,

    /// How long a request may take before a 408 is returned (default: 30s)
    pub request_timeout: Duration,

    /// Responses slower than this are logged as performance events (default: 1s)
    pub slow_response_threshold: Duration,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Allowed CORS origins. `"*"` allows any origin without credentials.
    pub cors_origins: Vec<String>,

    /// Responses smaller than this many bytes are not compressed (default: 1024)
    pub compression_threshold: u16,

    /// Requests with more distinct headers than this are flagged (default: 50)
    pub max_header_count: usize,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory served under `/upload` (default: "upload")
    pub upload_dir: PathBuf,

    /// Directory holding the daily log files (default: "logs")
    pub log_dir: PathBuf,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level filter for console output (e.g., "info", "debug")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any value cannot be parsed or the
    /// resulting configuration is inconsistent.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: Self::parse_env("PORT", 3000)?,
            environment: env::var("NODE_ENV").unwrap_or_else(|_| DEVELOPMENT_ENV.to_string()),

            // Request handling
            json_limit: Self::parse_size_env("EXPRESS_JSON_LIMIT", "10mb")?,
            urlencoded_limit: Self::parse_size_env("EXPRESS_URLENCODED_LIMIT", "10mb")?,
            request_timeout: Duration::from_millis(Self::parse_env("REQUEST_TIMEOUT", 30_000)?),
            slow_response_threshold: Duration::from_millis(Self::parse_env(
                "SLOW_RESPONSE_THRESHOLD",
                1000,
            )?),

            // Security
            cors_origins: Self::parse_cors_origins(),
            compression_threshold: Self::parse_env("SECURITY_COMPRESSION_THRESHOLD", 1024)?,
            max_header_count: Self::parse_env("SECURITY_MAX_HEADERS", 50)?,

            // Storage
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("upload")),
            log_dir: env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logs")),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 0)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    fn validate(&self) -> AppResult<()> {
        if self.request_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "REQUEST_TIMEOUT must be greater than 0".to_string(),
            ));
        }

        if self.json_limit == 0 {
            return Err(AppError::ConfigError(
                "EXPRESS_JSON_LIMIT must be greater than 0".to_string(),
            ));
        }

        if self.urlencoded_limit == 0 {
            return Err(AppError::ConfigError(
                "EXPRESS_URLENCODED_LIMIT must be greater than 0".to_string(),
            ));
        }

        if self.cors_origins.is_empty() {
            return Err(AppError::ConfigError(
                "CORS_ORIGINS must contain at least one origin".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether debug entries are written to the log files.
    pub fn is_development(&self) -> bool {
        self.environment == DEVELOPMENT_ENV
    }

    /// Largest request body accepted by any parser.
    pub fn max_body_size(&self) -> usize {
        self.json_limit.max(self.urlencoded_limit)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr + ToString,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a human-readable size variable such as `10mb`.
    fn parse_size_env(name: &str, default: &str) -> AppResult<usize> {
        let raw = env::var(name).unwrap_or_else(|_| default.to_string());
        parse_size(&raw).ok_or_else(|| AppError::ConfigError(format!("Invalid {name}: {raw}")))
    }

    /// Parse CORS allowed origins from environment variable.
    fn parse_cors_origins() -> Vec<String> {
        env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Parse a byte size with an optional `b`, `kb`, `mb` or `gb` suffix.
///
/// Units are 1024-based and case-insensitive. Returns `None` for anything
/// that is not a whole number followed by a known unit.
pub fn parse_size(input: &str) -> Option<usize> {
    let lower = input.trim().to_ascii_lowercase();
    let split = lower
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(lower.len());
    let (digits, unit) = lower.split_at(split);
    let value: usize = digits.parse().ok()?;

    let multiplier: usize = match unit.trim() {
        "" | "b" => 1,
        "kb" => 1024,
        "mb" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };

    value.checked_mul(multiplier)
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "localhost".to_string(),
            port: 3000,
            environment: DEVELOPMENT_ENV.to_string(),
            // Request handling
            json_limit: 10 * 1024 * 1024,       // 10MB
            urlencoded_limit: 10 * 1024 * 1024, // 10MB
            request_timeout: Duration::from_secs(30),
            slow_response_threshold: Duration::from_millis(1000),
            // Security
            cors_origins: DEFAULT_CORS_ORIGINS
                .split(',')
                .map(str::to_string)
                .collect(),
            compression_threshold: 1024,
            max_header_count: 50,
            // Storage
            upload_dir: PathBuf::from("upload"),
            log_dir: PathBuf::from("logs"),
            // Observability
            log_level: "info".to_string(),
            metrics_port: 0,
        }
    }
}
