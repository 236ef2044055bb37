//! Serializer and registry client errors

use crate::types::{SchemaId, SchemaVersion, Subject};
use thiserror::Error;

/// Confluent-compatible error codes reported by the registry service
pub mod error_codes {
    pub const SUBJECT_NOT_FOUND: u32 = 40401;
    pub const VERSION_NOT_FOUND: u32 = 40402;
    pub const SCHEMA_NOT_FOUND: u32 = 40403;

    pub const INVALID_SCHEMA: u32 = 42201;
    pub const INVALID_VERSION: u32 = 42202;

    pub const INTERNAL_ERROR: u32 = 50001;
}

/// Errors raised by a [`RegistryClient`](crate::client::RegistryClient)
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Non-2xx response carrying a structured `{"error_code", "message"}` body
    #[error("{message} ({error_code})")]
    Remote {
        status: u16,
        error_code: u32,
        message: String,
    },

    /// Non-2xx response whose body could not be parsed
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    /// Confluent error code, if the registry reported one
    pub fn error_code(&self) -> Option<u32> {
        match self {
            RegistryError::Remote { error_code, .. } => Some(*error_code),
            _ => None,
        }
    }

    /// Whether the registry reported the requested subject, version or schema as missing
    pub fn is_not_found(&self) -> bool {
        match self {
            RegistryError::Remote { error_code, .. } => matches!(
                *error_code,
                error_codes::SUBJECT_NOT_FOUND
                    | error_codes::VERSION_NOT_FOUND
                    | error_codes::SCHEMA_NOT_FOUND
            ),
            RegistryError::Http { status, .. } => *status == 404,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        RegistryError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Serialization(err.to_string())
    }
}

/// Errors raised by the registry facade and the wire codec
#[derive(Debug, Error)]
pub enum SerdeError {
    #[error("Cannot register subject {subject} at version {version}: {source}")]
    Registration {
        subject: Subject,
        version: SchemaVersion,
        #[source]
        source: RegistryError,
    },

    #[error("Cannot look up subject {subject} at version {version}: {source}")]
    Lookup {
        subject: Subject,
        version: SchemaVersion,
        #[source]
        source: RegistryError,
    },

    #[error("Subject {0} already registered")]
    DuplicateSubject(Subject),

    #[error("Unregistered subject {0}")]
    UnknownSubject(Subject),

    #[error("Schema id {0} does not exist in the local registry")]
    SchemaNotFound(SchemaId),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Schema compile error: {0}")]
    SchemaCompile(String),

    #[error("Value does not conform to schema: {0}")]
    SchemaMismatch(String),

    #[error("Payload decode error: {0}")]
    PayloadDecode(String),

    #[error("Schema id {0} does not have a registered decoder")]
    UnregisteredDecoder(SchemaId),

    #[error("Cannot fetch schema id {id} from remote registry: {source}")]
    RemoteFetch {
        id: SchemaId,
        #[source]
        source: RegistryError,
    },

    #[error("Cannot check compatibility for {subject}[{version}]: {source}")]
    CompatibilityCheck {
        subject: Subject,
        version: SchemaVersion,
        #[source]
        source: RegistryError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode hook failed: {0}")]
    Hook(#[source] anyhow::Error),
}

impl SerdeError {
    /// Failures scoped to a single message; the registry stays usable.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            SerdeError::MalformedMessage(_)
                | SerdeError::SchemaCompile(_)
                | SerdeError::SchemaMismatch(_)
                | SerdeError::PayloadDecode(_)
                | SerdeError::UnregisteredDecoder(_)
                | SerdeError::RemoteFetch { .. }
                | SerdeError::Json(_)
                | SerdeError::Hook(_)
        )
    }
}

/// Result type for serializer operations
pub type SerdeResult<T> = Result<T, SerdeError>;

/// Result type for registry client operations
pub type RegistryResult<T> = Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = RegistryError::Remote {
            status: 404,
            error_code: error_codes::SUBJECT_NOT_FOUND,
            message: "Subject not found".to_string(),
        };
        assert_eq!(err.to_string(), "Subject not found (40401)");
        assert_eq!(err.error_code(), Some(40401));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_not_found_from_plain_http() {
        let err = RegistryError::Http {
            status: 404,
            body: "gone".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), None);
        assert!(!RegistryError::Network("refused".into()).is_not_found());
    }

    #[test]
    fn test_per_message_classification() {
        assert!(SerdeError::MalformedMessage("short".into()).is_per_message());
        assert!(SerdeError::UnregisteredDecoder(SchemaId(3)).is_per_message());
        assert!(!SerdeError::UnknownSubject(Subject::new("x")).is_per_message());
        assert!(!SerdeError::DuplicateSubject(Subject::new("x")).is_per_message());
    }

    #[test]
    fn test_registration_error_source() {
        let err = SerdeError::Registration {
            subject: Subject::new("users-value"),
            version: SchemaVersion::new(3),
            source: RegistryError::Network("connection refused".into()),
        };
        assert!(err.to_string().contains("users-value"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
