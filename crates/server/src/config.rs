//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOCKROOM_JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOCKROOM_HOST` - Bind address (default: 127.0.0.1)
//! - `STOCKROOM_PORT` - Listen port (default: 3000)
//! - `STOCKROOM_SNAPSHOT_PATH` - Snapshot file (default: data/catalog.json)
//! - `STOCKROOM_TOKEN_TTL_SECS` - Token lifetime (default: 3600)
//! - `STOCKROOM_SEED_URL` - Seed catalog endpoint
//! - `STOCKROOM_SEED_TIMEOUT_SECS` - Seed fetch timeout (default: 10)
//! - `STOCKROOM_WRITE_POLICY` - `serialized` (default) or `interleaved`
//! - `STOCKROOM_LEGACY_DELETE` - Delete reports success without removing (default: false)
//! - `STOCKROOM_LEGACY_USER_APPEND` - Updating a user also appends it (default: false)
//! - `STOCKROOM_LEGACY_FILTER_DEFAULTS` - Missing filter bounds are zero (default: true)
//! - `STOCKROOM_ADMIN_USERNAMES` - Comma-separated usernames granted the admin role
//! - `STOCKROOM_EMPTY_ON_SHUTDOWN` - Empty the catalog on shutdown (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use stockroom_core::{FilterDefaults, Username};
use thiserror::Error;

use crate::store::{StoreOptions, WritePolicy};

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Default seed catalog endpoint.
pub const DEFAULT_SEED_URL: &str = "https://api.escuelajs.co/api/v1/products";

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

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Snapshot file backing the catalog store
    pub snapshot_path: PathBuf,
    /// Token configuration
    pub auth: AuthConfig,
    /// Seed catalog source
    pub seed: SeedConfig,
    /// Catalog store behaviour
    pub store: StoreOptions,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Bearer token configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC signing secret
    pub jwt_secret: SecretString,
    /// Token lifetime
    pub token_ttl: Duration,
    /// Accounts whose tokens carry the admin role
    pub admin_usernames: Vec<Username>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("admin_usernames", &self.admin_usernames)
            .finish()
    }
}

/// Seed catalog source configuration.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// Endpoint returning the seed product list
    pub url: String,
    /// Timeout for the single fetch attempt
    pub timeout: Duration,
}

impl ServerConfig {
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

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.parse_or_default::<IpAddr>("STOCKROOM_HOST", "127.0.0.1")?;
        let port = env.parse_or_default::<u16>("STOCKROOM_PORT", "3000")?;
        let snapshot_path = PathBuf::from(env.or_default("STOCKROOM_SNAPSHOT_PATH", "data/catalog.json"));

        let jwt_secret = env.validated_secret("STOCKROOM_JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "STOCKROOM_JWT_SECRET")?;
        let auth = AuthConfig {
            jwt_secret,
            token_ttl: Duration::from_secs(env.parse_or_default("STOCKROOM_TOKEN_TTL_SECS", "3600")?),
            admin_usernames: env.usernames("STOCKROOM_ADMIN_USERNAMES")?,
        };

        let seed = SeedConfig {
            url: env.or_default("STOCKROOM_SEED_URL", DEFAULT_SEED_URL),
            timeout: Duration::from_secs(env.parse_or_default("STOCKROOM_SEED_TIMEOUT_SECS", "10")?),
        };

        let store = StoreOptions {
            write_policy: env.write_policy("STOCKROOM_WRITE_POLICY")?,
            legacy_delete: env.flag("STOCKROOM_LEGACY_DELETE", false)?,
            legacy_user_append: env.flag("STOCKROOM_LEGACY_USER_APPEND", false)?,
            filter_defaults: if env.flag("STOCKROOM_LEGACY_FILTER_DEFAULTS", true)? {
                FilterDefaults::Zero
            } else {
                FilterDefaults::Unbounded
            },
            empty_on_shutdown: env.flag("STOCKROOM_EMPTY_ON_SHUTDOWN", false)?,
        };

        Ok(Self {
            host,
            port,
            snapshot_path,
            auth,
            seed,
            store,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or_default<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.optional(key) else {
            return Ok(default);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected a boolean, got '{other}'"),
            )),
        }
    }

    fn write_policy(&self, key: &str) -> Result<WritePolicy, ConfigError> {
        match self.or_default(key, "serialized").trim().to_ascii_lowercase().as_str() {
            "serialized" => Ok(WritePolicy::Serialized),
            "interleaved" => Ok(WritePolicy::Interleaved),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected 'serialized' or 'interleaved', got '{other}'"),
            )),
        }
    }

    fn usernames(&self, key: &str) -> Result<Vec<Username>, ConfigError> {
        self.optional(key)
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                Username::parse(s)
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .collect()
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Validate that the signing secret meets minimum length requirements.
fn validate_jwt_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
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

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STRONG: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("STOCKROOM_JWT_SECRET", STRONG)]).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.snapshot_path, PathBuf::from("data/catalog.json"));
        assert_eq!(config.auth.token_ttl, Duration::from_secs(3600));
        assert!(config.auth.admin_usernames.is_empty());
        assert_eq!(config.seed.url, DEFAULT_SEED_URL);
        assert_eq!(config.seed.timeout, Duration::from_secs(10));
        assert_eq!(config.store.write_policy, WritePolicy::Serialized);
        assert!(!config.store.legacy_delete);
        assert!(!config.store.legacy_user_append);
        assert_eq!(config.store.filter_defaults, FilterDefaults::Zero);
        assert!(!config.store.empty_on_shutdown);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_secret() {
        let result = load(&[]);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(k)) if k == "STOCKROOM_JWT_SECRET"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("STOCKROOM_JWT_SECRET", STRONG),
            ("STOCKROOM_HOST", "0.0.0.0"),
            ("STOCKROOM_PORT", "8080"),
            ("STOCKROOM_WRITE_POLICY", "Interleaved"),
            ("STOCKROOM_LEGACY_DELETE", "yes"),
            ("STOCKROOM_LEGACY_FILTER_DEFAULTS", "false"),
            ("STOCKROOM_ADMIN_USERNAMES", "root, ops ,"),
        ])
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.store.write_policy, WritePolicy::Interleaved);
        assert!(config.store.legacy_delete);
        assert_eq!(config.store.filter_defaults, FilterDefaults::Unbounded);
        let admins: Vec<_> = config
            .auth
            .admin_usernames
            .iter()
            .map(Username::as_str)
            .collect();
        assert_eq!(admins, ["root", "ops"]);
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("STOCKROOM_PORT", "eighty"),
            ("STOCKROOM_WRITE_POLICY", "yolo"),
            ("STOCKROOM_EMPTY_ON_SHUTDOWN", "maybe"),
        ] {
            let result = load(&[("STOCKROOM_JWT_SECRET", STRONG), (key, value)]);
            assert!(
                matches!(result, Err(ConfigError::InvalidEnvVar(ref k, _)) if k == key),
                "{key}"
            );
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = load(&[("STOCKROOM_JWT_SECRET", "aB3$xY9!mK2@")]);
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_auth_config_debug_redacts_secret() {
        let config = load(&[("STOCKROOM_JWT_SECRET", STRONG)]).unwrap();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(STRONG));
    }
}
