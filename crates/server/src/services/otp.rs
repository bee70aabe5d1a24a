//! Phone OTP login.
//!
//! Flow: generate a 6 digit code, store its HMAC with an expiry, text the code,
//! then verify what the customer types. Codes are single use, die after
//! `max_attempts` guesses, and a new code cannot be requested until the
//! resend cooldown has passed.

use askama::Template;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;
use sqlx::PgPool;
use thiserror::Error;

use haat_core::{OtpPurpose, Phone, PhoneError};

use crate::config::OtpConfig;
use crate::db::RepositoryError;
use crate::db::otp::OtpRepository;
use crate::db::users::UserRepository;
use crate::models::User;
use crate::services::sms::{OtpMessage, SmsError, SmsSender};

type HmacSha256 = Hmac<Sha256>;

/// Number of digits in a code.
pub const CODE_LENGTH: usize = 6;

/// Errors from the OTP flow.
#[derive(Debug, Error)]
pub enum OtpError {
    /// Phone number failed validation.
    #[error("invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),

    /// A code was sent too recently.
    #[error("please wait {retry_after_seconds} seconds before requesting a new code")]
    Cooldown { retry_after_seconds: u64 },

    /// Wrong code.
    #[error("incorrect code, {remaining_attempts} attempts left")]
    InvalidCode { remaining_attempts: i32 },

    /// No live code for this phone.
    #[error("code expired, please request a new one")]
    Expired,

    /// The code was guessed wrong too many times.
    #[error("too many incorrect attempts, please request a new code")]
    TooManyAttempts,

    /// The account exists but has been disabled.
    #[error("this account has been disabled")]
    AccountDisabled,

    /// SMS delivery failed.
    #[error("SMS error: {0}")]
    Sms(#[from] SmsError),

    /// Message template failed to render.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    /// HMAC key was rejected.
    #[error("invalid HMAC key")]
    Key(#[from] InvalidLength),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Response to a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OtpSent {
    pub expires_in_seconds: u64,
    pub resend_after_seconds: u64,
}

/// OTP login service.
pub struct OtpService<'a> {
    codes: OtpRepository<'a>,
    users: UserRepository<'a>,
    sms: &'a dyn SmsSender,
    config: OtpConfig,
    secret: &'a SecretString,
}

impl<'a> OtpService<'a> {
    /// Create a new OTP service. `secret` keys the code HMAC.
    #[must_use]
    pub fn new(
        pool: &'a PgPool,
        sms: &'a dyn SmsSender,
        config: OtpConfig,
        secret: &'a SecretString,
    ) -> Self {
        Self {
            codes: OtpRepository::new(pool),
            users: UserRepository::new(pool),
            sms,
            config,
            secret,
        }
    }

    /// Issue and text a login code.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::Cooldown` if a code was issued within the cooldown.
    /// Returns `OtpError::Sms` if the provider rejects the message.
    #[tracing::instrument(skip(self), fields(phone = %phone.masked()))]
    pub async fn send(&self, phone: &Phone) -> Result<OtpSent, OtpError> {
        let purpose = OtpPurpose::Login;
        let now = Utc::now();

        if let Some(last) = self.codes.last_issued_at(phone, purpose).await?
            && let Some(wait) = cooldown_remaining(last, now, self.config.resend_cooldown)
        {
            return Err(OtpError::Cooldown {
                retry_after_seconds: wait,
            });
        }

        let code = generate_code();
        let hash = code_hash(self.secret, phone, purpose, &code)?;
        let ttl = TimeDelta::from_std(self.config.ttl).unwrap_or_else(|_| TimeDelta::minutes(5));
        self.codes.create(phone, purpose, &hash, now + ttl).await?;

        let body = OtpMessage {
            code: &code,
            ttl_minutes: self.config.ttl.as_secs().div_ceil(60),
        }
        .render()?;
        self.sms.send(phone, &body).await?;

        tracing::info!("Login code sent");
        Ok(OtpSent {
            expires_in_seconds: self.config.ttl.as_secs(),
            resend_after_seconds: self.config.resend_cooldown.as_secs(),
        })
    }

    /// Check a code and return the customer it logs in, creating the account
    /// on first login.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::InvalidCode`, `OtpError::Expired` or
    /// `OtpError::TooManyAttempts` when the code is not accepted.
    #[tracing::instrument(skip(self, code), fields(phone = %phone.masked()))]
    pub async fn verify(&self, phone: &Phone, code: &str) -> Result<User, OtpError> {
        let purpose = OtpPurpose::Login;
        let max_attempts = self.config.max_attempts;

        let record = self
            .codes
            .latest_active(phone, purpose)
            .await?
            .ok_or(OtpError::Expired)?;

        // The guess is counted before it is checked
        let Some(attempts) = self.codes.take_attempt(record.id, max_attempts).await? else {
            return Err(OtpError::TooManyAttempts);
        };

        let code = code.trim();
        if !code_matches(self.secret, phone, purpose, code, &record.code_hash) {
            tracing::warn!(attempts, "Incorrect login code");
            return Err(wrong_code(attempts, max_attempts));
        }

        if !self.codes.consume(record.id, max_attempts).await? {
            return Err(OtpError::Expired);
        }

        let user = self.users.find_or_create_customer(phone).await?;
        if !user.is_active {
            return Err(OtpError::AccountDisabled);
        }
        Ok(user)
    }
}

/// Error for a wrong guess, given the attempts used so far.
fn wrong_code(attempts: i32, max_attempts: i32) -> OtpError {
    if attempts >= max_attempts {
        OtpError::TooManyAttempts
    } else {
        OtpError::InvalidCode {
            remaining_attempts: max_attempts - attempts,
        }
    }
}

/// Random zero-padded numeric code.
#[must_use]
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:0CODE_LENGTH$}")
}

/// Hex HMAC-SHA256 of `phone|purpose|code`.
///
/// # Errors
///
/// Returns `InvalidLength` if the key is rejected.
pub fn code_hash(
    secret: &SecretString,
    phone: &Phone,
    purpose: OtpPurpose,
    code: &str,
) -> Result<String, InvalidLength> {
    let mac = code_mac(secret, phone, purpose, code)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn code_mac(
    secret: &SecretString,
    phone: &Phone,
    purpose: OtpPurpose,
    code: &str,
) -> Result<HmacSha256, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())?;
    mac.update(phone.as_str().as_bytes());
    mac.update(b"|");
    mac.update(purpose.as_str().as_bytes());
    mac.update(b"|");
    mac.update(code.as_bytes());
    Ok(mac)
}

/// Constant-time comparison of a submitted code against the stored hash.
fn code_matches(
    secret: &SecretString,
    phone: &Phone,
    purpose: OtpPurpose,
    code: &str,
    stored_hex: &str,
) -> bool {
    if code.len() != CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(stored) = hex::decode(stored_hex) else {
        return false;
    };
    code_mac(secret, phone, purpose, code)
        .is_ok_and(|mac| mac.verify_slice(&stored).is_ok())
}

/// Seconds left before another code may be sent, if any.
fn cooldown_remaining(
    last_issued: DateTime<Utc>,
    now: DateTime<Utc>,
    cooldown: std::time::Duration,
) -> Option<u64> {
    let elapsed = (now - last_issued).to_std().unwrap_or_default();
    cooldown
        .checked_sub(elapsed)
        .filter(|left| !left.is_zero())
        .map(|left| left.as_secs() + u64::from(left.subsec_nanos() > 0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn secret() -> SecretString {
        SecretString::from("k9#Tq2vL!x8Wm4Zp7rB6nY1cF3hJ5sD0")
    }

    fn phone() -> Phone {
        Phone::parse("+91 98765 43210").unwrap()
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_code_hash_matches_only_same_inputs() {
        let hash = code_hash(&secret(), &phone(), OtpPurpose::Login, "123456").unwrap();
        assert!(code_matches(&secret(), &phone(), OtpPurpose::Login, "123456", &hash));
        assert!(!code_matches(&secret(), &phone(), OtpPurpose::Login, "654321", &hash));

        let other = Phone::parse("9123456780").unwrap();
        assert!(!code_matches(&secret(), &other, OtpPurpose::Login, "123456", &hash));

        let other_secret = SecretString::from("another-secret-value-for-tests-0001");
        assert!(!code_matches(&other_secret, &phone(), OtpPurpose::Login, "123456", &hash));
    }

    #[test]
    fn test_malformed_codes_never_match() {
        let hash = code_hash(&secret(), &phone(), OtpPurpose::Login, "012345").unwrap();
        assert!(!code_matches(&secret(), &phone(), OtpPurpose::Login, "12345", &hash));
        assert!(!code_matches(&secret(), &phone(), OtpPurpose::Login, "01234a", &hash));
        assert!(!code_matches(&secret(), &phone(), OtpPurpose::Login, "012345", "zz"));
    }

    #[test]
    fn test_wrong_code_counts_down_then_locks() {
        assert!(matches!(
            wrong_code(1, 5),
            OtpError::InvalidCode {
                remaining_attempts: 4
            }
        ));
        assert!(matches!(
            wrong_code(4, 5),
            OtpError::InvalidCode {
                remaining_attempts: 1
            }
        ));
        assert!(matches!(wrong_code(5, 5), OtpError::TooManyAttempts));
    }

    #[test]
    fn test_cooldown_remaining() {
        let now = Utc::now();
        let cooldown = Duration::from_secs(30);

        assert_eq!(
            cooldown_remaining(now - TimeDelta::seconds(10), now, cooldown),
            Some(20)
        );
        assert_eq!(
            cooldown_remaining(now - TimeDelta::milliseconds(29_500), now, cooldown),
            Some(1)
        );
        assert_eq!(cooldown_remaining(now - TimeDelta::seconds(30), now, cooldown), None);
        assert_eq!(cooldown_remaining(now - TimeDelta::minutes(5), now, cooldown), None);
    }
}
