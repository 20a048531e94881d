//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError         - Domain outcomes (404 / 403 / 409 / 422)       │
//! │  ├── ValidationError   - One failed field rule                         │
//! │  └── ValidationErrors  - Every failed rule of one request              │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError           - Database operation failures                   │
//! │                                                                         │
//! │  tally-api errors                                                      │
//! │  └── ApiError          - What the HTTP client sees                     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → JSON body              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Not Found vs Forbidden
//! A row owned by another tenant is reported as [`CoreError::NotFound`],
//! exactly like a row that does not exist. Only capability denials on
//! resources the actor is allowed to know about become
//! [`CoreError::Forbidden`].

use std::collections::BTreeMap;

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Resource absent, or owned by someone else.
    #[error("{entity} not found")]
    NotFound { entity: String, id: String },

    /// Actor lacks the capability for this operation.
    #[error("This action is unauthorized: {capability}")]
    Forbidden { capability: String },

    /// One or more requested products are not owned by the actor (or do not
    /// exist). Raised before anything is written.
    #[error("You can only sell your own products ({owned} of {requested} requested products are yours)")]
    OwnershipViolation { requested: usize, owned: usize },

    /// Unique value collided and retries were exhausted.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Input validation failed.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(err: ValidationError) -> Self {
        CoreError::Validation(ValidationErrors::from(err))
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// `field` uses dotted paths for nested input, e.g. `products.1.quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Amount above the largest one the ledger accepts.
    #[error("{field} may not be greater than {max}")]
    TooLarge { field: String, max: Money },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two fields that cannot be combined.
    #[error("{field} cannot be combined with {other}")]
    Conflicting { field: String, other: String },

    /// Any other rule, with its own message.
    #[error("{message}")]
    Rule { field: String, message: String },
}

impl ValidationError {
    /// Returns the (dotted) field this error is keyed under.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::TooLarge { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::MustNotBeNegative { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::Conflicting { field, .. }
            | ValidationError::Rule { field, .. } => field,
        }
    }
}

/// Every validation failure of one request, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors::default()
    }

    pub fn push(&mut self, err: ValidationError) {
        self.errors.push(err);
    }

    /// Records the error of a `Result`, if any.
    pub fn check<T>(&mut self, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    /// Moves every error of `other` into `self`.
    pub fn append(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing failed, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Field-keyed messages, the shape of a 422 response body.
    pub fn to_field_map(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for err in &self.errors {
            map.entry(err.field().to_string())
                .or_default()
                .push(err.to_string());
        }
        map
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        ValidationErrors { errors: vec![err] }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.errors.first() {
            None => write!(f, "The given data was invalid"),
            Some(first) if self.errors.len() == 1 => write!(f, "{}", first),
            Some(first) => write!(f, "{} (and {} more errors)", first, self.errors.len() - 1),
        }
    }
}

impl std::error::Error for ValidationErrors {}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
