//! URL slugs for categories, subcategories and products.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug cannot be empty")]
    Empty,
    #[error("slug must be at most {max} characters")]
    TooLong { max: usize },
    #[error("slug may only contain lowercase letters, digits and single hyphens: {0:?}")]
    InvalidCharacters(String),
}

/// A URL path segment identifying a catalog record.
///
/// Slugs are lowercase ASCII letters and digits separated by single hyphens,
/// with no leading or trailing hyphen.
///
/// ```
/// use threadline_core::Slug;
///
/// assert_eq!(Slug::from_name("Men's T-Shirts & Tops").unwrap().as_str(), "mens-t-shirts-tops");
/// assert!(Slug::parse("Bad Slug").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length, matching the `VARCHAR(255)` columns.
    pub const MAX_LENGTH: usize = 255;

    /// Parse an already-formed slug.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError`] if the slug is empty, too long, or malformed.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let well_formed = s.split('-').all(|seg| {
            !seg.is_empty()
                && seg
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        });
        if !well_formed {
            return Err(SlugError::InvalidCharacters(s.to_owned()));
        }

        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a display name.
    ///
    /// Apostrophes are dropped, every other run of non-alphanumeric
    /// characters becomes one hyphen.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if the name has no ASCII alphanumerics.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        let mut pending_hyphen = false;

        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else if c != '\'' && c != '\u{2019}' {
                pending_hyphen = true;
            }
        }

        out.truncate(Self::MAX_LENGTH);
        while out.ends_with('-') {
            out.pop();
        }
        Self::parse(&out)
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

impl std::str::FromStr for Slug {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Slug::parse("shirts").is_ok());
        assert!(Slug::parse("slim-fit-32").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert!(Slug::parse("Shirts").is_err());
        assert!(Slug::parse("-shirts").is_err());
        assert!(Slug::parse("shirts-").is_err());
        assert!(Slug::parse("slim--fit").is_err());
        assert!(Slug::parse("slim_fit").is_err());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Slug::from_name("Summer Dresses").unwrap().as_str(), "summer-dresses");
        assert_eq!(Slug::from_name("  Kids' Wear!! ").unwrap().as_str(), "kids-wear");
        assert_eq!(Slug::from_name("Size 32/34").unwrap().as_str(), "size-32-34");
    }

    #[test]
    fn test_from_name_without_alphanumerics() {
        assert_eq!(Slug::from_name("!!!"), Err(SlugError::Empty));
    }
}
