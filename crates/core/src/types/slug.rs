//! URL slugs for products, categories, blog posts and careers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// Nothing usable was left after normalization.
    #[error("slug cannot be empty")]
    Empty,
    /// The slug exceeds the maximum length.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The slug contains characters outside `[a-z0-9-]` or misplaced dashes.
    #[error("slug may only contain lowercase letters, digits and single dashes")]
    InvalidCharacters,
}

/// A lowercase, dash-separated URL segment.
///
/// ```
/// use haat_core::Slug;
///
/// let slug = Slug::from_title("Organic Mango Pickle (500g)").unwrap();
/// assert_eq!(slug.as_str(), "organic-mango-pickle-500g");
/// assert_eq!(slug.with_suffix(2).as_str(), "organic-mango-pickle-500g-2");
/// ```
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length.
    pub const MAX_LENGTH: usize = 120;

    /// Derive a slug from free text such as a title.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the text has no ASCII alphanumerics.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_dash = false;

        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }

        if out.is_empty() {
            return Err(SlugError::Empty);
        }

        if out.len() > Self::MAX_LENGTH {
            out.truncate(Self::MAX_LENGTH);
            while out.ends_with('-') {
                out.pop();
            }
        }

        Ok(Self(out))
    }

    /// Validate an already-formed slug supplied by a client.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] if the value is not a canonical slug.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        let valid_chars = s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !valid_chars || s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::InvalidCharacters);
        }
        Ok(Self(s.to_owned()))
    }

    /// Append a numeric suffix, used to de-duplicate colliding slugs.
    ///
    /// The base is shortened as needed so the result stays within
    /// [`Self::MAX_LENGTH`].
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        let suffix = format!("-{n}");
        let keep = Self::MAX_LENGTH.saturating_sub(suffix.len()).min(self.0.len());
        let base = self.0.get(..keep).unwrap_or(&self.0).trim_end_matches('-');
        Self(format!("{base}{suffix}"))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Slug {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Slug {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Slug {
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
    fn test_from_title_collapses_separators() {
        let slug = Slug::from_title("  Summer -- Sale: 50% off!! ").unwrap();
        assert_eq!(slug.as_str(), "summer-sale-50-off");
    }

    #[test]
    fn test_from_title_without_alphanumerics() {
        assert_eq!(Slug::from_title("!!! ---"), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_title_truncates_without_trailing_dash() {
        let title = format!("{} tail", "a".repeat(Slug::MAX_LENGTH));
        let slug = Slug::from_title(&title).unwrap();
        assert_eq!(slug.as_str().len(), Slug::MAX_LENGTH);
        assert!(!slug.as_str().ends_with('-'));
    }

    #[test]
    fn test_suffix_keeps_full_length_slug_valid() {
        let slug = Slug::from_title(&"a".repeat(200)).unwrap();
        let dup = slug.with_suffix(2);
        assert_eq!(dup.as_str().len(), Slug::MAX_LENGTH);
        assert!(dup.as_str().ends_with("aa-2"));
        assert_eq!(Slug::parse(dup.as_str()), Ok(dup));
    }

    #[test]
    fn test_suffix_drops_dash_left_by_shortening() {
        // 116 letters, a dash and "b": cutting to 117 leaves a trailing dash
        let title = format!("{} b", "a".repeat(Slug::MAX_LENGTH - 4));
        let slug = Slug::from_title(&title).unwrap();
        assert_eq!(
            slug.with_suffix(12).as_str(),
            format!("{}-12", "a".repeat(Slug::MAX_LENGTH - 4))
        );
        assert_eq!(Slug::parse("kettle").unwrap().with_suffix(3).as_str(), "kettle-3");
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        assert!(Slug::parse("kitchen-essentials").is_ok());
        assert_eq!(Slug::parse("Kitchen"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("-kitchen"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse("kitchen--tools"), Err(SlugError::InvalidCharacters));
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
    }
}
