use super::{ErrorCode, ErrorContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Severity levels for errors, independent of HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    System,
    Database,
    Network,
    Security,
    Validation,
    Resource,
}

/// The engine's unified error type.
#[derive(Debug, ThisError, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    pub context: ErrorContext,
    pub severity: ErrorSeverity,
    pub cause: Option<Box<Error>>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            context: ErrorContext::new(),
            severity: Self::default_severity_for_code(code),
            cause: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_cause(mut self, cause: Error) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn add_trace(mut self, trace: impl Into<String>) -> Self {
        self.context = self.context.add_trace(trace.into());
        self
    }

    pub fn add_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.add_metadata(key.into(), value);
        self
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    pub fn category(&self) -> ErrorCategory {
        match self.code.category() {
            "system" => ErrorCategory::System,
            "database" => ErrorCategory::Database,
            "network" => ErrorCategory::Network,
            "security" => ErrorCategory::Security,
            "validation" => ErrorCategory::Validation,
            "resource" => ErrorCategory::Resource,
            _ => ErrorCategory::System,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn should_log_as_error(&self) -> bool {
        self.code.should_log_as_error() || matches!(self.severity, ErrorSeverity::High | ErrorSeverity::Critical)
    }

    pub fn to_api_response(&self) -> serde_json::Value {
        self.to_api_response_with_environment("development")
    }

    pub fn to_api_response_with_environment(&self, environment: &str) -> serde_json::Value {
        let is_production = environment == "production";

        let (message, details) = if is_production {
            self.sanitize_for_production()
        } else {
            (self.message.clone(), self.details.clone())
        };

        serde_json::json!({
            "error": {
                "code": self.code,
                "message": message,
                "details": if is_production { None } else { details },
                "error_id": self.context.error_id,
                "request_id": self.context.request_id,
                "timestamp": self.context.timestamp
            }
        })
    }

    /// Full debug dump, for internal logging only — never for API responses.
    pub fn to_debug_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
                "context": self.context,
                "severity": self.severity,
                "cause": self.cause.as_ref().map(|c| c.to_debug_json())
            }
        })
    }

    fn sanitize_for_production(&self) -> (String, Option<String>) {
        let sanitized_message = match self.code {
            ErrorCode::Unauthorized => "Authentication failed".to_string(),
            ErrorCode::InvalidArgument => "Invalid input provided".to_string(),
            ErrorCode::NotFound => "Resource not found".to_string(),
            ErrorCode::StateConflict => "The requested change conflicts with current state".to_string(),
            ErrorCode::CollaboratorFailure
            | ErrorCode::DataIntegrityError
            | ErrorCode::Transient
            | ErrorCode::InternalServerError => {
                "An internal error occurred. Please try again later".to_string()
            }
        };

        (sanitized_message, None)
    }

    fn default_severity_for_code(code: ErrorCode) -> ErrorSeverity {
        match code {
            ErrorCode::NotFound | ErrorCode::InvalidArgument => ErrorSeverity::Low,
            ErrorCode::StateConflict | ErrorCode::Unauthorized => ErrorSeverity::Medium,
            ErrorCode::Transient | ErrorCode::CollaboratorFailure => ErrorSeverity::High,
            ErrorCode::DataIntegrityError | ErrorCode::InternalServerError => ErrorSeverity::Critical,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct ErrorSer {
            code: ErrorCode,
            message: String,
            details: Option<String>,
            context: ErrorContext,
            severity: ErrorSeverity,
        }

        let error_ser = ErrorSer {
            code: self.code,
            message: self.message.clone(),
            details: self.details.clone(),
            context: self.context.clone(),
            severity: self.severity,
        };

        error_ser.serialize(serializer)
    }
}

// Convenience constructors matching the taxonomy in SPEC_FULL.md §2.2.
impl Error {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, message)
    }

    pub fn collaborator_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CollaboratorFailure, message)
    }

    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DataIntegrityError, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Transient, message)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    ErrorCode::StateConflict
                } else if db_err.is_foreign_key_violation() || db_err.is_check_violation() {
                    ErrorCode::DataIntegrityError
                } else {
                    ErrorCode::InternalServerError
                }
            }
            sqlx::Error::PoolTimedOut => ErrorCode::Transient,
            sqlx::Error::Io(_) => ErrorCode::Transient,
            sqlx::Error::RowNotFound => ErrorCode::NotFound,
            _ => ErrorCode::InternalServerError,
        };

        Self::new(code, err.to_string()).add_trace("sqlx::Error conversion")
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        let code = match err.kind() {
            redis::ErrorKind::IoError => ErrorCode::Transient,
            _ => ErrorCode::InternalServerError,
        };

        Self::new(code, err.to_string()).add_trace("redis::RedisError conversion")
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::InternalServerError, err.to_string())
            .add_trace("serde_json::Error conversion")
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::new(ErrorCode::InternalServerError, err.to_string())
            .add_trace("config::ConfigError conversion")
    }
}
