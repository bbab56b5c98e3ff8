//! Shared library for Gravity backend services.
//!
//! This crate provides:
//! - A standardized error taxonomy with fixed HTTP status codes
//! - Response, pagination, health and error schemas
//! - Password hashing and signed-token helpers
//! - Lazily connected Postgres and Redis clients sharing one lifecycle
//! - An explicit schema registry for table creation
//! - Structured logging setup
//! - Small string / hashing utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod security;
pub mod pool;
pub mod cache_client;
pub mod database;
pub mod schema;
pub mod tracing_config;
pub mod utils;

pub use error::{ErrorDetails, ErrorKind, GravityError, Result};
pub use models::{
    ApiResponse, ErrorResponse, HealthCheckResponse, IdField, PaginatedResponse,
    PaginationParams, TimestampFields,
};
pub use security::{
    create_access_token, create_refresh_token, decode_access_token, decode_token,
    hash_password, validate_token_type, verify_password, Claims, TokenSettings,
};
pub use pool::{ConnectionState, Connector, PooledResource};
pub use cache_client::{CacheClient, CacheConfig, CacheValue, KeyValueStore, MemoryConnector, RedisConnector};
pub use database::{Database, DatabaseConfig};
pub use schema::{SchemaRegistry, TableSchema};
pub use tracing_config::{get_logger, setup_logging, Logger, LoggingConfig};

/// Re-exported so callers can name signing algorithms without a direct
/// `jsonwebtoken` dependency.
pub use jsonwebtoken::Algorithm;
