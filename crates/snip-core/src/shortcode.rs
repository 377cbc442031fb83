use crate::error::ShortenerError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Opaque identifier that a long URL is published under.
///
/// Codes minted by a generator are trusted and built with
/// [`ShortCode::new_unchecked`]. Codes arriving from callers go through
/// [`ShortCode::new`], which checks length and character set.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortCode(String);

const MIN_LENGTH: usize = 3;
const MAX_LENGTH: usize = 64;

impl ShortCode {
    /// Creates a new `ShortCode` after validating the input.
    ///
    /// Valid codes are 3-64 characters and contain only `[a-zA-Z0-9_-]`,
    /// so UUID ids carried over from older logs still resolve.
    pub fn new(code: impl Into<String>) -> std::result::Result<Self, ShortenerError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (generators, rows read back from storage).
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> std::result::Result<(), ShortenerError> {
        if code.len() < MIN_LENGTH || code.len() > MAX_LENGTH {
            return Err(ShortenerError::InvalidShortCode(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH,
                MAX_LENGTH,
                code.len()
            )));
        }

        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ShortenerError::InvalidShortCode(format!(
                "must contain only alphanumeric characters, hyphens, or underscores: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
