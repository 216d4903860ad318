//! Object identifier parsing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::THUMBNAIL_EXTENSION;

/// Result type for object name parsing.
pub type NameResult<T> = Result<T, NameError>;

/// Errors raised while parsing an object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("malformed object name {0:?}: expected <base>.<extension> with exactly one '.'")]
    Malformed(String),
}

/// Identifier of a stored video, of the form `<base>.<ext>`.
///
/// The base name doubles as the per-invocation working-folder name and
/// as the thumbnail's base name, so the single-`.` shape is enforced
/// here rather than trusted downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectName {
    base: String,
    extension: String,
}

impl ObjectName {
    /// Parse an identifier, rejecting names without exactly one `.`
    /// separating a non-empty base and a non-empty extension.
    pub fn parse(name: &str) -> NameResult<Self> {
        let mut parts = name.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(extension), None) if !base.is_empty() && !extension.is_empty() => {
                Ok(Self {
                    base: base.to_string(),
                    extension: extension.to_string(),
                })
            }
            _ => Err(NameError::Malformed(name.to_string())),
        }
    }

    /// Base name, used for the working folder and the thumbnail.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Source file extension.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Key of the source video in the remote store.
    pub fn key(&self) -> String {
        format!("{}.{}", self.base, self.extension)
    }

    /// Key of the published thumbnail. The extension is fixed to jpg
    /// regardless of the source extension.
    pub fn thumbnail_key(&self) -> String {
        format!("{}.{}", self.base, THUMBNAIL_EXTENSION)
    }
}

impl FromStr for ObjectName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.base, self.extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_name() {
        let name = ObjectName::parse("IMG_1.mp4").unwrap();
        assert_eq!(name.base(), "IMG_1");
        assert_eq!(name.extension(), "mp4");
        assert_eq!(name.key(), "IMG_1.mp4");
        assert_eq!(name.thumbnail_key(), "IMG_1.jpg");
    }

    #[test]
    fn test_parse_rejects_missing_extension() {
        assert!(matches!(
            ObjectName::parse("noext"),
            Err(NameError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_multiple_dots() {
        assert!(ObjectName::parse("a.b.c").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(ObjectName::parse("").is_err());
        assert!(ObjectName::parse(".mp4").is_err());
        assert!(ObjectName::parse("clip.").is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let name: ObjectName = "holiday.webm".parse().unwrap();
        assert_eq!(name.to_string(), "holiday.webm");
    }
}
