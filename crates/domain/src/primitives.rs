//! Domain primitives with validated constructors.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracker_indexer_shared::{ErrorCode, ErrorEnvelope};

/// Maximum accepted length of a project key, in bytes.
pub const MAX_PROJECT_KEY_LEN: usize = 255;

/// Validation failures for domain primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// `ProjectKey` is empty after trimming.
    EmptyProjectKey {
        /// Length of the raw input before trimming.
        input_length: usize,
    },
    /// `ProjectKey` contains whitespace or a list separator.
    InvalidProjectKey {
        /// Trimmed key that failed validation.
        input: String,
    },
    /// `ProjectKey` exceeds [`MAX_PROJECT_KEY_LEN`].
    ProjectKeyTooLong {
        /// Length of the trimmed input.
        length: usize,
    },
}

impl PrimitiveError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyProjectKey { .. }
            | Self::InvalidProjectKey { .. }
            | Self::ProjectKeyTooLong { .. } => ErrorCode::new("domain", "invalid_project_key"),
        }
    }
}

impl fmt::Display for PrimitiveError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyProjectKey { .. } => formatter.write_str("ProjectKey must be non-empty"),
            Self::InvalidProjectKey { .. } => {
                formatter.write_str("ProjectKey must not contain whitespace or ','")
            },
            Self::ProjectKeyTooLong { .. } => write!(
                formatter,
                "ProjectKey must be at most {MAX_PROJECT_KEY_LEN} bytes"
            ),
        }
    }
}

impl std::error::Error for PrimitiveError {}

impl From<PrimitiveError> for ErrorEnvelope {
    fn from(error: PrimitiveError) -> Self {
        let envelope = Self::expected(error.error_code(), error.to_string());
        match error {
            PrimitiveError::EmptyProjectKey { input_length } => {
                envelope.with_metadata("input_length", input_length.to_string())
            },
            PrimitiveError::InvalidProjectKey { input } => envelope.with_metadata("input", input),
            PrimitiveError::ProjectKeyTooLong { length } => {
                envelope.with_metadata("length", length.to_string())
            },
        }
    }
}

/// Identifier of a tracked project, compared by value everywhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectKey(Box<str>);

impl ProjectKey {
    /// Parse a `ProjectKey` from user input.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PrimitiveError> {
        let raw = input.as_ref();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PrimitiveError::EmptyProjectKey {
                input_length: raw.len(),
            });
        }
        if trimmed.len() > MAX_PROJECT_KEY_LEN {
            return Err(PrimitiveError::ProjectKeyTooLong {
                length: trimmed.len(),
            });
        }
        if trimmed.chars().any(|ch| ch.is_whitespace() || ch == ',') {
            return Err(PrimitiveError::InvalidProjectKey {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned().into_boxed_str()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the underlying string.
    #[must_use]
    pub fn into_inner(self) -> Box<str> {
        self.0
    }
}

impl AsRef<str> for ProjectKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ProjectKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<String> for ProjectKey {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ProjectKey> for String {
    fn from(value: ProjectKey) -> Self {
        value.into_inner().into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_key_trims_and_compares_by_value() -> Result<(), PrimitiveError> {
        let left = ProjectKey::parse(" ORG ")?;
        let right = ProjectKey::parse("ORG")?;
        assert_eq!(left, right);
        assert_eq!(left.as_str(), "ORG");
        Ok(())
    }

    #[test]
    fn project_key_rejects_separators() {
        assert_eq!(
            ProjectKey::parse("A,B"),
            Err(PrimitiveError::InvalidProjectKey {
                input: "A,B".to_owned()
            })
        );
        assert!(matches!(
            ProjectKey::parse("A B"),
            Err(PrimitiveError::InvalidProjectKey { .. })
        ));
        assert!(matches!(
            ProjectKey::parse("K".repeat(MAX_PROJECT_KEY_LEN + 1)),
            Err(PrimitiveError::ProjectKeyTooLong { .. })
        ));
    }

    #[test]
    fn project_key_deserialization_validates() {
        let parsed: Result<ProjectKey, _> = serde_json::from_str("\"  \"");
        assert!(parsed.is_err());
        let parsed: Result<ProjectKey, _> = serde_json::from_str("\"JBESB\"");
        assert_eq!(parsed.ok().map(ProjectKey::into_inner).as_deref(), Some("JBESB"));
    }
}
