//! Error types for Cadence

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CadenceError>;

#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Content generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl CadenceError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CadenceError::InvalidInput(_) | CadenceError::NotFound(_) => 3,
            CadenceError::Config(_) => 2,
            CadenceError::Platform(PlatformError::Authentication(_)) => 2,
            CadenceError::Platform(_) => 1,
            CadenceError::Generation(_) => 1,
            CadenceError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

/// Failure of a single platform publish attempt.
///
/// `Api` carries the remote status code and the opaque response body; the
/// processor stores its display form as the history error message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("{phase} returned HTTP {status}: {body}")]
    Api {
        phase: &'static str,
        status: u16,
        body: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Posting failed: {0}")]
    Posting(String),
}

impl PlatformError {
    /// HTTP status code of the remote response, when there was one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            PlatformError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generator API key is not configured (set {0})")]
    MissingApiKey(String),

    #[error("Generator request failed: {0}")]
    Request(String),

    #[error("Generator returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Generator returned no content")]
    EmptyResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = CadenceError::InvalidInput("interval must be positive".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_not_found() {
        let error = CadenceError::NotFound("schedule abc".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_config_error() {
        let error = CadenceError::Config(ConfigError::MissingField("database.path".to_string()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_platform_errors() {
        let auth = CadenceError::Platform(PlatformError::Authentication("no token".to_string()));
        assert_eq!(auth.exit_code(), 2);

        let api = CadenceError::Platform(PlatformError::Api {
            phase: "publish",
            status: 500,
            body: "oops".to_string(),
        });
        assert_eq!(api.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_database_error() {
        let db_error = DbError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));
        assert_eq!(CadenceError::Database(db_error).exit_code(), 1);
    }

    #[test]
    fn test_api_error_formatting_keeps_body() {
        let error = PlatformError::Api {
            phase: "Threads container creation",
            status: 400,
            body: r#"{"error":{"message":"Invalid token"}}"#.to_string(),
        };
        let message = error.to_string();
        assert!(message.starts_with("Threads container creation returned HTTP 400"));
        assert!(message.contains("Invalid token"));
        assert_eq!(error.status_code(), Some(400));
    }

    #[test]
    fn test_status_code_absent_for_network_errors() {
        let error = PlatformError::Network("connection refused".to_string());
        assert_eq!(error.status_code(), None);
    }

    #[test]
    fn test_error_message_formatting_wrapped() {
        let error: CadenceError = PlatformError::Posting("empty id".to_string()).into();
        assert_eq!(error.to_string(), "Platform error: Posting failed: empty id");

        let error: CadenceError = GenerationError::EmptyResponse.into();
        assert_eq!(
            error.to_string(),
            "Content generation error: Generator returned no content"
        );
    }

    #[test]
    fn test_error_conversion_from_db_error() {
        let db_error = DbError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        let error: CadenceError = db_error.into();
        assert!(matches!(error, CadenceError::Database(_)));
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        assert_eq!(original.clone(), original);
    }
}
