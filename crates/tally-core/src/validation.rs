//! # Validation Module
//!
//! Input validation utilities for Tally.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (axum)                                        │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Services                                                     │
//! │  └── THIS MODULE: business rule validation, BEFORE any write           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE (transaction_id, line_no)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every validator takes the field name it reports under, so nested input
//! can use dotted paths (`products.2.quantity`).

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT, MAX_ITEM_QUANTITY, MAX_TRANSACTION_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required, bounded text field and returns it trimmed.
pub fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a product name (1-200 characters).
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Espresso Beans 1kg").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    validate_required_text("name", name, 200)
}

/// Validates an optional brand. Blank becomes `None`.
pub fn validate_brand(brand: Option<&str>) -> ValidationResult<Option<String>> {
    match brand.map(str::trim) {
        None | Some("") => Ok(None),
        Some(b) if b.chars().count() > 100 => Err(ValidationError::TooLong {
            field: "brand".to_string(),
            max: 100,
        }),
        Some(b) => Ok(Some(b.to_string())),
    }
}

/// Validates a user display name (1-100 characters).
pub fn validate_display_name(name: &str) -> ValidationResult<String> {
    validate_required_text("display_name", name, 100)
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (no filter)
/// - Maximum 100 characters
pub fn validate_search_query(query: &str) -> ValidationResult<Option<String>> {
    let query = query.trim();

    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "search".to_string(),
            max: 100,
        });
    }

    Ok((!query.is_empty()).then(|| query.to_string()))
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a non-negative amount (zero allowed: free items, free samples)
/// no larger than [`MAX_AMOUNT`].
///
/// ## Example
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::validation::validate_amount;
///
/// assert!(validate_amount("price", Money::from_cents(2999)).is_ok());
/// assert!(validate_amount("price", Money::zero()).is_ok());
/// assert!(validate_amount("price", Money::from_cents(-1)).is_err());
/// assert!(validate_amount("price", Money::from_cents(i64::MAX)).is_err());
/// ```
pub fn validate_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    if amount > MAX_AMOUNT {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max: MAX_AMOUNT,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in one transaction request.
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "products".to_string(),
        });
    }

    if count > MAX_TRANSACTION_LINES {
        return Err(ValidationError::OutOfRange {
            field: "products".to_string(),
            min: 1,
            max: MAX_TRANSACTION_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Identifier & Date Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_uuid;
///
/// assert!(validate_uuid("product_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("product_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn validate_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be a date in YYYY-MM-DD format".to_string(),
        }
    })
}

/// Checks that an inclusive date range is not inverted.
pub fn validate_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> ValidationResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(ValidationError::Rule {
            field: "end_date".to_string(),
            message: "end_date must be a date after or equal to start_date".to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_name() {
        assert_eq!(validate_product_name("  Mug ").unwrap(), "Mug");
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_brand() {
        assert_eq!(validate_brand(None).unwrap(), None);
        assert_eq!(validate_brand(Some("  ")).unwrap(), None);
        assert_eq!(validate_brand(Some("Acme")).unwrap().as_deref(), Some("Acme"));
        assert!(validate_brand(Some(&"B".repeat(101))).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity("quantity", 1).is_ok());
        assert!(validate_quantity("quantity", 999).is_ok());

        assert!(validate_quantity("quantity", 0).is_err());
        assert!(validate_quantity("quantity", -1).is_err());
        let err = validate_quantity("products.3.quantity", 1000).unwrap_err();
        assert_eq!(err.field(), "products.3.quantity");
    }

    #[test]
    fn test_validate_amount_bounds() {
        assert!(validate_amount("price", Money::zero()).is_ok());
        assert!(validate_amount("price", MAX_AMOUNT).is_ok());

        let err = validate_amount("price", "92233720368547758.07".parse().unwrap()).unwrap_err();
        assert_eq!(err.field(), "price");
        assert_eq!(err.to_string(), "price may not be greater than 999999999.99");
        assert!(validate_amount("unit_cost", Money::from_cents(MAX_AMOUNT.cents() + 1)).is_err());
    }

    #[test]
    fn test_validate_line_count() {
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(1).is_ok());
        assert!(validate_line_count(MAX_TRANSACTION_LINES).is_ok());
        assert!(validate_line_count(MAX_TRANSACTION_LINES + 1).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  ").unwrap(), None);
        assert_eq!(validate_search_query(" mug ").unwrap().as_deref(), Some("mug"));
        assert!(validate_search_query(&"q".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_dates() {
        let start = validate_date("start_date", "2026-10-01").unwrap();
        let end = validate_date("end_date", "2026-10-16").unwrap();
        assert!(validate_date_range(Some(start), Some(end)).is_ok());
        assert!(validate_date_range(Some(end), Some(start)).is_err());
        assert!(validate_date_range(Some(start), None).is_ok());
        assert!(validate_date("start_date", "16/10/2026").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "123").is_err());
    }
}
