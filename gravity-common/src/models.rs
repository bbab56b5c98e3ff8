//! Common response and pagination schemas.
//!
//! These shapes keep the wire format consistent across services while each
//! service stays free to define its own payload types.

use crate::error::{ErrorDetails, GravityError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Largest page size accepted by [`PaginationParams`].
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when the caller does not provide one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Integer primary key embedded in persisted models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdField {
    /// Row identifier
    pub id: i64,
}

impl From<i64> for IdField {
    fn from(id: i64) -> Self {
        Self { id }
    }
}

/// Creation / modification timestamps embedded in persisted models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampFields {
    /// Creation time
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last modification time
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for TimestampFields {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

impl TimestampFields {
    /// Record a modification at the current time.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// Generic API response wrapper.
///
/// Serializes as
/// `{"success","data","message","errors","metadata","timestamp"}`, with absent
/// optionals rendered as `null`.
///
/// # Examples
///
/// ```
/// use gravity_common::ApiResponse;
///
/// let resp = ApiResponse::ok_with_message(42, "answer found");
/// assert!(resp.success);
/// assert_eq!(resp.data, Some(42));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Request success status
    pub success: bool,
    /// Response payload
    pub data: Option<T>,
    /// Response message
    #[serde(default)]
    pub message: String,
    /// Error messages
    pub errors: Option<Vec<String>>,
    /// Additional metadata
    pub metadata: Option<Map<String, Value>>,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: String::new(),
            errors: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    /// Successful response carrying `data` and a message.
    #[must_use]
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self::ok(data).with_message(message)
    }

    /// Failed response without payload.
    #[must_use]
    pub fn error(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
            errors: Some(errors),
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    /// Replace the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

impl<T> From<&GravityError> for ApiResponse<T> {
    fn from(err: &GravityError) -> Self {
        Self::error(err.message(), vec![err.kind().code().to_string()])
    }
}

/// Pagination parameters accepted by list endpoints.
///
/// Construction, including deserialization, rejects `page < 1` and page sizes
/// outside `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPaginationParams")]
pub struct PaginationParams {
    page: u32,
    page_size: u32,
}

#[derive(Deserialize)]
struct RawPaginationParams {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size")]
    page_size: i64,
}

const fn default_page() -> i64 {
    1
}

const fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE as i64
}

impl TryFrom<RawPaginationParams> for PaginationParams {
    type Error = GravityError;

    fn try_from(raw: RawPaginationParams) -> Result<Self> {
        let (page, page_size) = narrow_page(raw.page, raw.page_size)?;
        Self::new(page, page_size)
    }
}

/// Narrow wire integers before range validation.
fn narrow_page(page: i64, page_size: i64) -> Result<(u32, u32)> {
    let page = u32::try_from(page)
        .map_err(|_| GravityError::validation(format!("page must be >= 1, got {page}")))?;
    let page_size = u32::try_from(page_size).map_err(|_| {
        GravityError::validation(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
        ))
    })?;
    Ok((page, page_size))
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginationParams {
    /// Validate and build pagination parameters.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `page` is 0 or `page_size` is outside
    /// `1..=100`.
    pub fn new(page: u32, page_size: u32) -> Result<Self> {
        validate_page(page, page_size)?;
        Ok(Self { page, page_size })
    }

    /// Current page, starting at 1.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Row offset for database queries.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    /// Row limit for database queries.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.page_size as u64
    }
}

fn validate_page(page: u32, page_size: u32) -> Result<()> {
    if page < 1 {
        return Err(GravityError::validation(format!("page must be >= 1, got {page}")));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(GravityError::validation(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
        )));
    }
    Ok(())
}

/// Paginated list response.
///
/// Deserialization validates `page` and `page_size` and recomputes the
/// derived fields instead of trusting the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "RawPaginatedResponse<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct PaginatedResponse<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: u64,
    /// Current page number
    pub page: u32,
    /// Items per page
    pub page_size: u32,
    /// Total number of pages
    pub total_pages: u64,
    /// Whether there is a next page
    pub has_next: bool,
    /// Whether there is a previous page
    pub has_previous: bool,
}

#[derive(Deserialize)]
struct RawPaginatedResponse<T> {
    items: Vec<T>,
    total: u64,
    page: i64,
    page_size: i64,
}

impl<T> TryFrom<RawPaginatedResponse<T>> for PaginatedResponse<T> {
    type Error = GravityError;

    fn try_from(raw: RawPaginatedResponse<T>) -> Result<Self> {
        let (page, page_size) = narrow_page(raw.page, raw.page_size)?;
        Self::new(raw.items, raw.total, page, page_size)
    }
}

impl<T> PaginatedResponse<T> {
    /// Build a page, deriving `total_pages`, `has_next` and `has_previous`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for `page < 1` or a page size outside
    /// `1..=100`.
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Result<Self> {
        validate_page(page, page_size)?;
        let total_pages = total.div_ceil(u64::from(page_size));

        Ok(Self {
            items,
            total,
            page,
            page_size,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_previous: page > 1,
        })
    }

    /// Build a page from already validated parameters.
    #[must_use]
    pub fn from_params(items: Vec<T>, total: u64, params: &PaginationParams) -> Self {
        let total_pages = total.div_ceil(u64::from(params.page_size));
        Self {
            items,
            total,
            page: params.page,
            page_size: params.page_size,
            total_pages,
            has_next: u64::from(params.page) < total_pages,
            has_previous: params.page > 1,
        }
    }

    /// Convert the items while keeping the pagination envelope.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Standard health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Service status (`healthy` / `unhealthy`)
    pub status: String,
    /// Name of the service
    pub service_name: String,
    /// Service version
    pub version: String,
    /// Probe time
    pub timestamp: DateTime<Utc>,
    /// Status of each dependency
    pub dependencies: Option<BTreeMap<String, String>>,
}

impl HealthCheckResponse {
    fn with_status(status: &str, service_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            service_name: service_name.into(),
            version: version.into(),
            timestamp: Utc::now(),
            dependencies: None,
        }
    }

    /// Healthy service.
    #[must_use]
    pub fn healthy(service_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_status("healthy", service_name, version)
    }

    /// Unhealthy service.
    #[must_use]
    pub fn unhealthy(service_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::with_status("unhealthy", service_name, version)
    }

    /// Record a dependency's probe result.
    ///
    /// A failed dependency marks the whole service unhealthy.
    #[must_use]
    pub fn with_dependency(mut self, name: impl Into<String>, healthy: bool) -> Self {
        let status = if healthy { "healthy" } else { "unhealthy" };
        self.dependencies
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), status.to_string());
        if !healthy {
            self.status = "unhealthy".to_string();
        }
        self
    }

    /// Whether the service reports itself healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Standard error response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`
    pub success: bool,
    /// Error message
    pub error: String,
    /// Machine-readable error code
    pub error_code: Option<String>,
    /// Error details
    pub details: Option<ErrorDetails>,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    /// Error response with only a message.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            error_code: None,
            details: None,
            timestamp: Utc::now(),
        }
    }
}

impl From<&GravityError> for ErrorResponse {
    fn from(err: &GravityError) -> Self {
        Self {
            success: false,
            error: err.message().to_string(),
            error_code: Some(err.kind().code().to_string()),
            details: err.details().cloned(),
            timestamp: Utc::now(),
        }
    }
}
