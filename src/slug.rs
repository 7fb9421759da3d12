//! Site identifier ("slug") normalization and validation.
//!
//! A slug is a single DNS label: 1 to 63 characters drawn from `[a-z0-9-]`,
//! starting and ending with an alphanumeric character.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PublishError, Result};

/// Maximum length of a DNS label.
pub const MAX_LEN: usize = 63;

static SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("slug pattern is valid")
});

/// A validated, lowercase site identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slug(String);

impl Slug {
    /// Trim and lowercase `raw`, then validate it.
    ///
    /// ```
    /// use site_publisher::Slug;
    ///
    /// assert_eq!(Slug::normalize("  Acme-Studio ").unwrap().as_str(), "acme-studio");
    /// assert!(Slug::normalize("-acme").is_err());
    /// ```
    pub fn normalize(raw: &str) -> Result<Self> {
        let folded = raw.trim().to_lowercase();
        check(&folded)?;
        Ok(Self(folded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns `true` if `label` is already a valid slug, without case folding.
pub fn is_valid(label: &str) -> bool {
    check(label).is_ok()
}

fn check(label: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(PublishError::InvalidIdentifier {
            slug: label.to_string(),
            reason: reason.into(),
        })
    };

    if label.is_empty() {
        return reject("must not be empty");
    }
    if label.len() > MAX_LEN {
        return reject("must be at most 63 characters");
    }
    if label.starts_with('-') || label.ends_with('-') {
        return reject("must not start or end with '-'");
    }
    if !SLUG.is_match(label) {
        return reject("only lowercase letters, digits and '-' are allowed");
    }
    Ok(())
}
