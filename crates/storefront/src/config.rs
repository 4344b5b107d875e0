//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_TOKEN_PEPPER` - HMAC key for API token digests (min 32 chars, high entropy)
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (postgres storage only,
//!   falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_STORAGE` - `postgres` (default) or `memory`
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 4000)
//! - `STOREFRONT_ALLOWED_ORIGINS` - Comma-separated CORS origins (credentials allowed)
//! - `STOREFRONT_PRODUCT_CACHE_TTL_SECS` - Catalog cache TTL (default: 0, disabled).
//!   A cached product keeps its status until the entry expires, so only
//!   enable it when products are never deactivated outside this process.
//! - `STOREFRONT_RATE_LIMIT` - Per-IP rate limiting on the cart API (default: true)
//! - `STOREFRONT_SEED_FILE` - YAML product seed loaded by the memory backend
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_PEPPER_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
/// Catalog cache TTL when unset. Zero keeps availability checks live.
pub const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Where cart lines, products and tokens are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local storage for development and tests; lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Storage backend
    pub storage: StorageBackend,
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// HMAC key used to digest bearer tokens before lookup
    pub token_pepper: SecretString,
    /// Origins allowed to call the API with credentials
    pub allowed_origins: Vec<String>,
    /// How long catalog lookups are cached (zero disables the cache)
    pub product_cache_ttl: Duration,
    /// Whether the cart API is rate limited per client IP
    pub rate_limit: bool,
    /// Product seed file for the memory backend
    pub seed_file: Option<PathBuf>,
    /// Sentry error tracking configuration
    pub sentry: SentryConfig,
}

/// Sentry configuration.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let storage: StorageBackend = parse_env("STOREFRONT_STORAGE", "postgres")?;
        let database_url = match storage {
            StorageBackend::Postgres => Some(get_database_url("STOREFRONT_DATABASE_URL")?),
            StorageBackend::Memory => None,
        };
        let host: IpAddr = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port: u16 = parse_env("STOREFRONT_PORT", "4000")?;

        let token_pepper = get_validated_secret("STOREFRONT_TOKEN_PEPPER")?;
        validate_pepper_length(&token_pepper, "STOREFRONT_TOKEN_PEPPER")?;

        let allowed_origins = get_optional_env("STOREFRONT_ALLOWED_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();
        let cache_secs: u64 = parse_env(
            "STOREFRONT_PRODUCT_CACHE_TTL_SECS",
            &DEFAULT_PRODUCT_CACHE_TTL_SECS.to_string(),
        )?;
        let rate_limit: bool = parse_env("STOREFRONT_RATE_LIMIT", "true")?;
        let seed_file = get_optional_env("STOREFRONT_SEED_FILE").map(PathBuf::from);

        let sentry = SentryConfig {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        };

        Ok(Self {
            storage,
            database_url,
            host,
            port,
            token_pepper,
            allowed_origins,
            product_cache_ttl: Duration::from_secs(cache_secs),
            rate_limit,
            seed_file,
            sentry,
        })
    }

    /// Configuration for an in-memory storefront on an ephemeral port.
    ///
    /// No database, no catalog cache, no rate limiting. Used for local
    /// development and by the integration tests.
    #[must_use]
    pub fn in_memory(token_pepper: SecretString) -> Self {
        Self {
            storage: StorageBackend::Memory,
            database_url: None,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            token_pepper,
            allowed_origins: Vec::new(),
            product_cache_ttl: Duration::ZERO,
            rate_limit: false,
            seed_file: None,
            sentry: SentryConfig::default(),
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Load and validate only the token pepper, for tools that issue tokens.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the pepper is missing or fails validation.
    pub fn token_pepper_from_env() -> Result<SecretString, ConfigError> {
        let _ = dotenvy::dotenv();
        let token_pepper = get_validated_secret("STOREFRONT_TOKEN_PEPPER")?;
        validate_pepper_length(&token_pepper, "STOREFRONT_TOKEN_PEPPER")?;
        Ok(token_pepper)
    }

    /// Load only the database URL, for tools that talk to `PostgreSQL` directly.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if neither variable is set.
    pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
        let _ = dotenvy::dotenv();
        get_database_url("STOREFRONT_DATABASE_URL")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, using `default` when it is unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Validate that the token pepper meets minimum length requirements.
fn validate_pepper_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_PEPPER_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_PEPPER_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_rejects_placeholders() {
        let err = validate_secret_strength("changeme-pepper-value", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_pepper_length() {
        let short = SecretString::from("short");
        assert!(validate_pepper_length(&short, "TEST_PEPPER").is_err());
        let long = SecretString::from("a".repeat(32));
        assert!(validate_pepper_length(&long, "TEST_PEPPER").is_ok());
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!(
            "Postgres".parse::<StorageBackend>().unwrap(),
            StorageBackend::Postgres
        );
        assert_eq!(
            " memory ".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_split_list_drops_blanks() {
        assert_eq!(
            split_list("http://localhost:5173, ,https://shop.example"),
            vec!["http://localhost:5173", "https://shop.example"]
        );
    }

    #[test]
    fn test_in_memory_socket_addr() {
        let config = StorefrontConfig::in_memory(SecretString::from("x".repeat(32)));
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 0);
        assert!(!config.rate_limit);
    }
}
