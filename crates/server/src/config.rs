//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `HAAT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `HAAT_BASE_URL` - Public URL of the API (used for cookies and upload URLs)
//! - `HAAT_SESSION_SECRET` - Session/OTP signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `HAAT_HOST` - Bind address (default: 127.0.0.1)
//! - `HAAT_PORT` - Listen port (default: 3000)
//! - `HAAT_UPLOAD_DIR` - Directory for uploaded images (default: uploads)
//! - `HAAT_MAX_UPLOAD_BYTES` - Maximum image size (default: 5 MiB)
//! - `OTP_TTL_SECONDS` - OTP validity (default: 300)
//! - `OTP_RESEND_COOLDOWN_SECONDS` - Minimum gap between codes (default: 30)
//! - `OTP_MAX_ATTEMPTS` - Wrong guesses before a code is burned (default: 5)
//! - `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` - Enable online payments
//! - `RAZORPAY_WEBHOOK_SECRET` - Enable the Razorpay webhook
//! - `SMS_API_URL` / `SMS_API_KEY` / `SMS_SENDER_ID` - SMS provider (logs codes when unset)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sentry sampling (0.0 - 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

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

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Session signing secret, also the OTP hashing key
    pub session_secret: SecretString,
    /// OTP login settings
    pub otp: OtpConfig,
    /// Image upload settings
    pub uploads: UploadConfig,
    /// Razorpay credentials (online payments disabled when absent)
    pub razorpay: Option<RazorpayConfig>,
    /// SMS provider (codes are logged when absent)
    pub sms: Option<SmsConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// OTP login settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpConfig {
    /// How long a code stays valid.
    pub ttl: Duration,
    /// Minimum time between two codes for the same phone.
    pub resend_cooldown: Duration,
    /// Wrong guesses allowed per code.
    pub max_attempts: i32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            resend_cooldown: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Image upload settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Directory files are written to and served from.
    pub dir: PathBuf,
    /// Maximum accepted file size.
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Razorpay API credentials.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Public key id (sent to the browser for checkout)
    pub key_id: String,
    /// API key secret (HTTP basic auth and payment signatures)
    pub key_secret: SecretString,
    /// Webhook signing secret
    pub webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// SMS provider settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct SmsConfig {
    /// Provider endpoint accepting `POST` JSON messages
    pub api_url: String,
    /// Provider API key
    pub api_key: SecretString,
    /// Registered sender id (DLT header)
    pub sender_id: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("sender_id", &self.sender_id)
            .finish()
    }
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

        let database_url = get_database_url("HAAT_DATABASE_URL")?;
        let host: IpAddr = parse_env_or_default("HAAT_HOST", "127.0.0.1")?;
        let port: u16 = parse_env_or_default("HAAT_PORT", "3000")?;
        let base_url = get_required_env("HAAT_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("HAAT_BASE_URL".to_string(), e.to_string()))?;
        let session_secret = get_validated_secret("HAAT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "HAAT_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_secret,
            otp: OtpConfig::from_env()?,
            uploads: UploadConfig::from_env()?,
            razorpay: RazorpayConfig::from_env()?,
            sms: SmsConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Configuration suitable for tests: no external integrations.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/haat_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("t3st-0nly-k3y-9fQ2#xLw7!pZr4@mNv8$bHs"),
            otp: OtpConfig::default(),
            uploads: UploadConfig::default(),
            razorpay: None,
            sms: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }
}

impl OtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            ttl: Duration::from_secs(parse_env_or_default(
                "OTP_TTL_SECONDS",
                &defaults.ttl.as_secs().to_string(),
            )?),
            resend_cooldown: Duration::from_secs(parse_env_or_default(
                "OTP_RESEND_COOLDOWN_SECONDS",
                &defaults.resend_cooldown.as_secs().to_string(),
            )?),
            max_attempts: parse_env_or_default(
                "OTP_MAX_ATTEMPTS",
                &defaults.max_attempts.to_string(),
            )?,
        })
    }
}

impl UploadConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            dir: get_optional_env("HAAT_UPLOAD_DIR").map_or(defaults.dir, PathBuf::from),
            max_bytes: parse_env_or_default(
                "HAAT_MAX_UPLOAD_BYTES",
                &defaults.max_bytes.to_string(),
            )?,
        })
    }
}

impl RazorpayConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(key_id) = get_optional_env("RAZORPAY_KEY_ID") else {
            return Ok(None);
        };
        Ok(Some(Self {
            key_id,
            key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
            webhook_secret: get_optional_env("RAZORPAY_WEBHOOK_SECRET").map(SecretString::from),
        }))
    }
}

impl SmsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_url) = get_optional_env("SMS_API_URL") else {
            return Ok(None);
        };
        url::Url::parse(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SMS_API_URL".to_string(), e.to_string()))?;
        Ok(Some(Self {
            api_url,
            api_key: get_validated_secret("SMS_API_KEY")?,
            sender_id: get_env_or_default("SMS_SENDER_ID", "HAATIN"),
        }))
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

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
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
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_rejects_placeholders() {
        for value in ["your-razorpay-secret", "changeme123", "rzp_test_xxx"] {
            let err = validate_secret_strength(value, "RAZORPAY_KEY_SECRET").unwrap_err();
            assert!(matches!(err, ConfigError::InsecureSecret(_, _)), "{value}");
        }
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("abababababababababababababababab", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        assert!(validate_session_secret(&SecretString::from("short"), "S").is_err());
        assert!(validate_session_secret(&SecretString::from("a".repeat(32)), "S").is_ok());
    }

    #[test]
    fn test_test_config_passes_validation() {
        let config = ServerConfig::for_tests();
        assert!(validate_secret_strength(config.session_secret.expose_secret(), "S").is_ok());
        assert!(validate_session_secret(&config.session_secret, "S").is_ok());
        assert!(!config.is_https());
        assert_eq!(config.socket_addr().port(), 3000);
    }

    #[test]
    fn test_razorpay_config_debug_redacts_secrets() {
        let config = RazorpayConfig {
            key_id: "rzp_live_Kq81".to_string(),
            key_secret: SecretString::from("super_private_key_secret"),
            webhook_secret: Some(SecretString::from("super_private_webhook")),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("rzp_live_Kq81"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_private"));
    }

    #[test]
    fn test_sms_config_debug_redacts_key() {
        let config = SmsConfig {
            api_url: "https://sms.provider.in/v1/send".to_string(),
            api_key: SecretString::from("sms_key_value_9a8b"),
            sender_id: "HAATIN".to_string(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("HAATIN"));
        assert!(!debug_output.contains("sms_key_value_9a8b"));
    }
}
