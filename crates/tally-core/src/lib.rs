//! # tally-core: Pure Business Logic for Tally
//!
//! Everything the sales ledger *decides* lives here: money arithmetic,
//! validation, authorization, transaction aggregation and pagination.
//! Nothing in this crate touches a socket, a file or a database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tally-api (axum)                             │   │
//! │  │    /sales ──► /products ──► /admin/users ──► /health            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │  policy   │  │   │
//! │  │   │  Product  │  │   Money   │  │ grouping  │  │ ownership │  │   │
//! │  │   │ SaleLine  │  │  parsing  │  │ summaries │  │   roles   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (User, Product, SaleLine, Role, Actor)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//! - [`policy`] - Capability checks
//! - [`ledger`] - Line pricing and transaction grouping
//! - [`pagination`] - Cursor and page modes over grouped results
//! - [`transaction_id`] - Transaction identifier generation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::ledger::price_line;
//!
//! let price: Money = "29.99".parse().unwrap();
//! let cost: Money = "15.00".parse().unwrap();
//!
//! let line = price_line("quantity", price, Some(cost), 2).unwrap();
//! assert_eq!(line.total.to_string(), "59.98");
//! assert_eq!(line.utility.to_string(), "29.98");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod pagination;
pub mod policy;
pub mod transaction_id;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError, ValidationErrors};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items in one sale transaction.
pub const MAX_TRANSACTION_LINES: usize = 100;

/// Maximum quantity on a single line.
///
/// Catches typos like 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest price or cost a product may carry (999,999,999.99).
///
/// Keeps `price × MAX_ITEM_QUANTITY × MAX_TRANSACTION_LINES` inside `i64`
/// cents.
pub const MAX_AMOUNT: Money = Money::from_cents(99_999_999_999);

/// Attempts at picking an unused transaction id before giving up with a
/// conflict.
pub const MAX_TRANSACTION_ID_ATTEMPTS: u32 = 5;
