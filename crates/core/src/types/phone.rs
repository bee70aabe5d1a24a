//! Indian mobile phone numbers used for OTP login.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains characters other than digits, spaces, dashes or a leading +.
    #[error("phone number contains invalid characters")]
    InvalidCharacters,
    /// Wrong number of digits after removing the country code.
    #[error("phone number must have 10 digits")]
    InvalidLength,
    /// Indian mobile numbers start with 6, 7, 8 or 9.
    #[error("phone number is not a valid mobile number")]
    NotMobile,
}

/// A mobile number in E.164 form (`+91XXXXXXXXXX`).
///
/// Accepts the common ways users type a number: bare 10 digits, with a
/// leading `0`, with `91` or `+91`, and with spaces or dashes.
///
/// ```
/// use haat_core::Phone;
///
/// let phone = Phone::parse("098765 43210").unwrap();
/// assert_eq!(phone.as_str(), "+919876543210");
/// assert_eq!(phone.masked(), "+91******3210");
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    const COUNTRY_CODE: &'static str = "91";
    const NATIONAL_DIGITS: usize = 10;

    /// Parse and normalize a mobile number.
    ///
    /// # Errors
    ///
    /// Returns a [`PhoneError`] if the input is not a valid Indian mobile number.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        let body = s.strip_prefix('+').unwrap_or(s);
        if !body
            .chars()
            .all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
        {
            return Err(PhoneError::InvalidCharacters);
        }

        let digits: String = body.chars().filter(char::is_ascii_digit).collect();
        let national = match digits.len() {
            10 => digits.as_str(),
            11 => digits.strip_prefix('0').ok_or(PhoneError::InvalidLength)?,
            12 => digits
                .strip_prefix(Self::COUNTRY_CODE)
                .ok_or(PhoneError::InvalidLength)?,
            _ => return Err(PhoneError::InvalidLength),
        };

        if national.len() != Self::NATIONAL_DIGITS {
            return Err(PhoneError::InvalidLength);
        }
        if !matches!(national.chars().next(), Some('6'..='9')) {
            return Err(PhoneError::NotMobile);
        }

        Ok(Self(format!("+{}{national}", Self::COUNTRY_CODE)))
    }

    /// Returns the E.164 representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number with all but the last four digits hidden, for logs.
    #[must_use]
    pub fn masked(&self) -> String {
        let visible = self.0.len().saturating_sub(4);
        let tail = self.0.get(visible..).unwrap_or_default();
        format!("+{}{}{tail}", Self::COUNTRY_CODE, "*".repeat(6))
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Phone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Phone {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Phone {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Phone {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_common_formats() {
        for input in [
            "9876543210",
            "09876543210",
            "919876543210",
            "+91 98765 43210",
            "+91-98765-43210",
        ] {
            assert_eq!(Phone::parse(input).unwrap().as_str(), "+919876543210", "{input}");
        }
    }

    #[test]
    fn test_parse_rejects_invalid_numbers() {
        assert_eq!(Phone::parse(""), Err(PhoneError::Empty));
        assert_eq!(Phone::parse("98765abc10"), Err(PhoneError::InvalidCharacters));
        assert_eq!(Phone::parse("98765"), Err(PhoneError::InvalidLength));
        assert_eq!(Phone::parse("449876543210"), Err(PhoneError::InvalidLength));
        assert_eq!(Phone::parse("1234567890"), Err(PhoneError::NotMobile));
    }

    #[test]
    fn test_masked_keeps_last_four_digits() {
        let phone = Phone::parse("7012345678").unwrap();
        assert_eq!(phone.masked(), "+91******5678");
    }
}
