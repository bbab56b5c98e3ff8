//! Standardized error taxonomy shared by all Gravity services.
//!
//! Every error carries a [`ErrorKind`], a human readable message and optional
//! structured details. The HTTP status code is derived from the kind alone,
//! so hosting services can translate errors into transport responses without
//! any per-call bookkeeping.

use serde_json::{Map, Value};
use thiserror::Error;

/// Structured error details attached to a [`GravityError`].
pub type ErrorDetails = Map<String, Value>;

/// Convenience result alias used throughout the crate.
pub type Result<T, E = GravityError> = std::result::Result<T, E>;

/// Category of a [`GravityError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Requested resource does not exist
    NotFound,
    /// Malformed or unacceptable request
    BadRequest,
    /// Missing or invalid credentials
    Unauthorized,
    /// Authenticated but not permitted
    Forbidden,
    /// Conflicts with existing state (e.g. duplicate resource)
    Conflict,
    /// Input failed validation
    Validation,
    /// A dependency is temporarily unavailable
    ServiceUnavailable,
    /// Relational store failure
    Database,
    /// Upstream service or cache failure
    ExternalService,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::NotFound,
        Self::BadRequest,
        Self::Unauthorized,
        Self::Forbidden,
        Self::Conflict,
        Self::Validation,
        Self::ServiceUnavailable,
        Self::Database,
        Self::ExternalService,
    ];

    /// HTTP status code for this kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use gravity_common::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::NotFound.status_code(), 404);
    /// assert_eq!(ErrorKind::ExternalService.status_code(), 502);
    /// ```
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::Conflict => 409,
            Self::Validation => 422,
            Self::ServiceUnavailable => 503,
            Self::Database => 500,
            Self::ExternalService => 502,
        }
    }

    /// Stable machine-readable code, used as `error_code` in error responses.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::Validation => "VALIDATION_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Database => "DATABASE_ERROR",
            Self::ExternalService => "EXTERNAL_SERVICE_ERROR",
        }
    }

    /// Message used when the caller does not supply one.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::NotFound => "Resource not found",
            Self::BadRequest => "Bad request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::Conflict => "Conflict",
            Self::Validation => "Validation error",
            Self::ServiceUnavailable => "Service unavailable",
            Self::Database => "Database error",
            Self::ExternalService => "External service error",
        }
    }

    /// Whether the failure is transient and a caller may reasonably retry.
    ///
    /// The library itself never retries; this is a hint for hosting services.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable | Self::Database | Self::ExternalService
        )
    }
}

/// Common error type for Gravity services.
///
/// Immutable once constructed: there are accessors but no setters.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct GravityError {
    kind: ErrorKind,
    message: String,
    details: Option<ErrorDetails>,
}

impl GravityError {
    /// Create an error of the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Create an error carrying structured details.
    #[must_use]
    pub fn with_details(kind: ErrorKind, message: impl Into<String>, details: ErrorDetails) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Create an error with the kind's default message.
    #[must_use]
    pub fn default_for(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }

    /// Create an unauthorized error.
    #[must_use]
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, msg)
    }

    /// Create a forbidden error.
    #[must_use]
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }

    /// Create a conflict error.
    #[must_use]
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }

    /// Create a service unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, msg)
    }

    /// Create a database error.
    #[must_use]
    pub fn database(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, msg)
    }

    /// Create an external service error.
    #[must_use]
    pub fn external(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, msg)
    }

    /// Error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status code, fixed by [`ErrorKind::status_code`].
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// Structured details, if any were attached.
    #[must_use]
    pub const fn details(&self) -> Option<&ErrorDetails> {
        self.details.as_ref()
    }
}

impl From<sqlx::Error> for GravityError {
    fn from(err: sqlx::Error) -> Self {
        Self::database(err.to_string())
    }
}

impl From<deadpool_redis::redis::RedisError> for GravityError {
    fn from(err: deadpool_redis::redis::RedisError) -> Self {
        Self::external(format!("Cache error: {err}"))
    }
}

impl From<deadpool_redis::PoolError> for GravityError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::external(format!("Cache pool error: {err}"))
    }
}

impl From<deadpool_redis::CreatePoolError> for GravityError {
    fn from(err: deadpool_redis::CreatePoolError) -> Self {
        Self::external(format!("Cache pool configuration error: {err}"))
    }
}

impl From<serde_json::Error> for GravityError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("Serialization error: {err}"))
    }
}

impl From<bcrypt::BcryptError> for GravityError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::bad_request(format!("Password hash error: {err}"))
    }
}
