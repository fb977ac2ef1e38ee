//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOP_BASE_URL` - Public URL for the shop (http or https)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key (high entropy)
//! - `STRIPE_PUBLISHABLE_KEY` - Stripe publishable key, sent to the browser
//! - `STRIPE_WEBHOOK_SECRET` - Webhook signing secret (high entropy)
//!
//! ## Optional
//! - `SHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOP_PORT` - Listen port (default: 3000)
//! - `SHOP_CURRENCY` - ISO 4217 code for prices and charges (default: USD)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_WEBHOOK_TOLERANCE_SECS` - Webhook timestamp tolerance (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use threadline_core::CurrencyCode;

use crate::services::payments::webhook::DEFAULT_TOLERANCE_SECS;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without a trailing slash
    pub base_url: String,
    /// Currency for all prices and charges
    pub currency: CurrencyCode,
    /// Stripe API configuration
    pub stripe: StripeConfig,
    /// Sentry error tracking configuration
    pub sentry: SentryConfig,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (server-side only)
    pub secret_key: SecretString,
    /// Publishable key (safe to expose in browser)
    pub publishable_key: String,
    /// Webhook endpoint signing secret
    pub webhook_secret: SecretString,
    /// API base URL, overridable for a local mock
    pub api_base: String,
    /// Maximum webhook timestamp skew in seconds
    pub webhook_tolerance_secs: i64,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .finish()
    }
}

/// Sentry configuration.
#[derive(Debug, Clone, Default)]
pub struct SentryConfig {
    pub dsn: Option<String>,
    pub environment: Option<String>,
    pub sample_rate: f32,
    pub traces_sample_rate: f32,
}

impl ShopConfig {
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
        Self::from_source(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`ShopConfig::from_env`].
    pub fn from_source(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(env);

        let database_url = vars.database_url("SHOP_DATABASE_URL")?;
        let host = vars.parsed_or("SHOP_HOST", "127.0.0.1")?;
        let port = vars.parsed_or("SHOP_PORT", "3000")?;
        let base_url = vars.base_url("SHOP_BASE_URL")?;
        let currency = vars.parsed_or("SHOP_CURRENCY", CurrencyCode::default().code())?;

        let stripe = StripeConfig::from_vars(&vars)?;
        let sentry = SentryConfig::from_vars(&vars)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            currency,
            stripe,
            sentry,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL for a path on this shop.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl StripeConfig {
    fn from_vars(vars: &Vars<'_>) -> Result<Self, ConfigError> {
        let api_base = vars.or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE);
        Url::parse(&api_base)
            .map_err(|e| ConfigError::InvalidEnvVar("STRIPE_API_BASE".to_string(), e.to_string()))?;

        Ok(Self {
            secret_key: vars.validated_secret("STRIPE_SECRET_KEY")?,
            publishable_key: vars.required("STRIPE_PUBLISHABLE_KEY")?,
            webhook_secret: vars.validated_secret("STRIPE_WEBHOOK_SECRET")?,
            api_base: api_base.trim_end_matches('/').to_string(),
            webhook_tolerance_secs: vars.parsed_or(
                "STRIPE_WEBHOOK_TOLERANCE_SECS",
                &DEFAULT_TOLERANCE_SECS.to_string(),
            )?,
        })
    }
}

impl SentryConfig {
    fn from_vars(vars: &Vars<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: vars.optional("SENTRY_DSN"),
            environment: vars.optional("SENTRY_ENVIRONMENT"),
            sample_rate: vars.parsed_or("SENTRY_SAMPLE_RATE", "1.0")?,
            traces_sample_rate: vars.parsed_or("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup; empty values count as unset.
struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    /// Get an optional variable.
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

    /// Parse a variable, falling back to a default.
    fn parsed_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Get database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.optional(primary_key)
            .or_else(|| self.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }

    /// Get the public base URL, which must be absolute http(s).
    fn base_url(&self, key: &str) -> Result<String, ConfigError> {
        let raw = self.required(key)?;
        let parsed =
            Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }
        Ok(raw.trim_end_matches('/').to_string())
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
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
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the Stripe dashboard."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET_KEY: &str = "sk_test_51Nq8ZbK3vT9pLr2XyQ7mWc4D";
    const WEBHOOK_SECRET: &str = "whsec_H7fK2pQ9xL4mZ8tR1vB6nC3j";

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SHOP_DATABASE_URL", "postgres://localhost/threadline"),
            ("SHOP_BASE_URL", "https://shop.test/"),
            ("STRIPE_SECRET_KEY", SECRET_KEY),
            ("STRIPE_PUBLISHABLE_KEY", "pk_test_abc"),
            ("STRIPE_WEBHOOK_SECRET", WEBHOOK_SECRET),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<ShopConfig, ConfigError> {
        ShopConfig::from_source(&|key| env.get(key).map(ToString::to_string))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.base_url, "https://shop.test");
        assert_eq!(config.currency, CurrencyCode::USD);
        assert_eq!(config.stripe.api_base, DEFAULT_STRIPE_API_BASE);
        assert_eq!(config.stripe.webhook_tolerance_secs, 300);
        assert!(config.sentry.dsn.is_none());
        assert!((config.sentry.sample_rate - 1.0).abs() < f32::EPSILON);
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_database_url_fallback() {
        let mut env = base_env();
        env.remove("SHOP_DATABASE_URL");
        assert!(matches!(load(&env), Err(ConfigError::MissingEnvVar(k)) if k == "SHOP_DATABASE_URL"));

        env.insert("DATABASE_URL", "postgres://fly/threadline");
        assert!(load(&env).is_ok());
    }

    #[test]
    fn test_missing_stripe_key() {
        let mut env = base_env();
        env.remove("STRIPE_PUBLISHABLE_KEY");
        assert!(
            matches!(load(&env), Err(ConfigError::MissingEnvVar(k)) if k == "STRIPE_PUBLISHABLE_KEY")
        );
    }

    #[test]
    fn test_invalid_values() {
        let mut env = base_env();
        env.insert("SHOP_PORT", "eighty");
        assert!(matches!(load(&env), Err(ConfigError::InvalidEnvVar(k, _)) if k == "SHOP_PORT"));

        let mut env = base_env();
        env.insert("SHOP_CURRENCY", "XYZ");
        assert!(matches!(load(&env), Err(ConfigError::InvalidEnvVar(k, _)) if k == "SHOP_CURRENCY"));

        let mut env = base_env();
        env.insert("SHOP_BASE_URL", "ftp://shop.test");
        assert!(matches!(load(&env), Err(ConfigError::InvalidEnvVar(k, _)) if k == "SHOP_BASE_URL"));
    }

    #[test]
    fn test_placeholder_secret_rejected() {
        let mut env = base_env();
        env.insert("STRIPE_SECRET_KEY", "sk_test_your_key_here");
        assert!(matches!(load(&env), Err(ConfigError::InsecureSecret(k, _)) if k == "STRIPE_SECRET_KEY"));
    }

    #[test]
    fn test_absolute_url() {
        let config = load(&base_env()).unwrap();
        assert_eq!(
            config.absolute_url("/checkout/success"),
            "https://shop.test/checkout/success"
        );
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength(SECRET_KEY, "TEST_VAR").is_ok());
        assert!(validate_secret_strength(WEBHOOK_SECRET, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let config = load(&base_env()).unwrap();
        let debug_output = format!("{:?}", config.stripe);

        assert!(debug_output.contains("pk_test_abc"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(SECRET_KEY));
        assert!(!debug_output.contains(WEBHOOK_SECRET));
    }
}
