use std::fmt;
use tracker_indexer_shared::{ErrorCode, ErrorEnvelope, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    InvalidInput = 2,
    Io = 3,
    Internal = 1,
}

impl ExitCode {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug)]
pub enum CliError {
    InvalidInput(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Indexer(ErrorEnvelope),
}

impl CliError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::Io(_) => ExitCode::Io,
            Self::Serialization(_) => ExitCode::Internal,
            Self::Indexer(error) => envelope_exit_code(error),
        }
    }
}

/// Exit code for an error surfaced by the coordinator or its adapters.
#[must_use]
pub fn envelope_exit_code(error: &ErrorEnvelope) -> ExitCode {
    if error.kind == ErrorKind::Expected {
        ExitCode::InvalidInput
    } else if error.code == ErrorCode::io() {
        ExitCode::Io
    } else {
        ExitCode::Internal
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(formatter, "invalid input: {message}"),
            Self::Io(error) => write!(formatter, "io error: {error}"),
            Self::Serialization(error) => write!(formatter, "serialization error: {error}"),
            Self::Indexer(error) => write!(formatter, "{}: {}", error.code, error.message),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error)
    }
}

impl From<ErrorEnvelope> for CliError {
    fn from(error: ErrorEnvelope) -> Self {
        Self::Indexer(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_indexer_shared::ErrorClass;

    #[test]
    fn envelope_kinds_map_to_exit_codes() {
        let expected = ErrorEnvelope::expected(ErrorCode::invalid_input(), "bad");
        let io = ErrorEnvelope::unexpected(ErrorCode::io(), "disk", ErrorClass::Retriable);
        let internal = ErrorEnvelope::invariant(ErrorCode::internal(), "broken");

        assert_eq!(envelope_exit_code(&expected), ExitCode::InvalidInput);
        assert_eq!(envelope_exit_code(&io), ExitCode::Io);
        assert_eq!(envelope_exit_code(&internal), ExitCode::Internal);
        assert_eq!(CliError::from(io).exit_code(), ExitCode::Io);
    }
}
