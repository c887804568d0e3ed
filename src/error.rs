use std::{fmt, io};

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum SitegateError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Duplicate node with the same key: {0}")]
    DuplicateKey(String),
    #[error("Index {index} is out of range for a collection of {len} node(s)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Role permission provider failure: {0}")]
    ProviderFailure(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("File System error: {0}")]
    Io(String),
}

impl SitegateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SitegateError::InvalidArgument(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SitegateError::NotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SitegateError::DuplicateKey(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SitegateError::IndexOutOfRange { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            SitegateError::ProviderFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            SitegateError::PermissionDenied => StatusCode::UNAUTHORIZED,
            SitegateError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SitegateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Configuration errors abort startup wiring or an admin mutation; they are never shown to
    /// end users as an authorization outcome.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            SitegateError::InvalidArgument(_)
                | SitegateError::NotFound(_)
                | SitegateError::DuplicateKey(_)
                | SitegateError::IndexOutOfRange { .. }
        )
    }
}

impl From<toml::de::Error> for SitegateError {
    fn from(src: toml::de::Error) -> SitegateError {
        SitegateError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for SitegateError {
    fn from(src: toml::ser::Error) -> SitegateError {
        SitegateError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for SitegateError {
    fn from(src: JsonError) -> SitegateError {
        SitegateError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for SitegateError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => SitegateError::NotFound(format!("{x}")),
            _ => SitegateError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for SitegateError {
    fn from(x: fmt::Error) -> Self {
        SitegateError::Serialization(format!("{x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_keep_their_meaning() {
        let missing = SitegateError::from(io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(missing, SitegateError::NotFound(_)));

        // A file the process may not read is a server-side failure, not a denied caller.
        let unreadable = SitegateError::from(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "security.toml",
        ));
        assert!(matches!(unreadable, SitegateError::Io(_)));
        assert_ne!(unreadable.status_code(), StatusCode::UNAUTHORIZED);
    }
}
