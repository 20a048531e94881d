//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │    Product      │   │    SaleLine     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  owner_user_id  │   │  user_id        │       │
//! │  │  display_name   │   │  name, brand    │◄──│  product_id     │       │
//! │  │  role           │   │  price          │   │  transaction_id │       │
//! │  └─────────────────┘   │  unit_cost      │   │  unit_price     │       │
//! │                        └─────────────────┘   │  total, utility │       │
//! │  ┌─────────────────┐                         └─────────────────┘       │
//! │  │      Role       │   A "transaction" is never stored: it is the      │
//! │  │  Regular        │   set of SaleLines sharing one transaction_id     │
//! │  │  Moderator      │   (see `ledger::TransactionView`).                │
//! │  │  Admin          │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Role
// =============================================================================

/// Role of a user. Administrative capabilities hang off this, never off
/// ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A tenant: owns a catalog and a ledger.
    Regular,
    /// Can moderate shared content.
    Moderator,
    /// Manages users and roles.
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Regular
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(Role::Regular),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::InvalidFormat {
                field: "role".to_string(),
                reason: format!("unknown role '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Actor
// =============================================================================

/// The authenticated caller of an operation: the resolved identity context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Actor {
            id: id.into(),
            role,
        }
    }
}

// =============================================================================
// User
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A product in one tenant's private catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning tenant. Never changes after creation.
    pub owner_user_id: String,

    /// Display name.
    pub name: String,

    pub brand: Option<String>,

    /// Selling price per unit; snapshotted onto each sale line.
    #[ts(type = "string")]
    pub price: Money,

    /// Purchase cost per unit, used for utility.
    #[ts(type = "string | null")]
    pub unit_cost: Option<Money>,

    /// Purchase cost per bulk package (informational).
    #[ts(type = "string | null")]
    pub bulk_cost: Option<Money>,

    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,

    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Unit cost, treating a missing cost as zero.
    #[inline]
    pub fn unit_cost_or_zero(&self) -> Money {
        self.unit_cost.unwrap_or_default()
    }
}

// =============================================================================
// Sale Line
// =============================================================================

/// One persisted line item of a sale transaction.
///
/// Uses the snapshot pattern: `unit_price` and `unit_cost` are frozen at the
/// time of sale, so later product edits never rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    /// Creator, and owner of the product at creation time.
    pub user_id: String,
    /// Grouping key shared by every line of one checkout.
    pub transaction_id: String,
    /// 0-based position of this line in its transaction.
    pub line_no: i64,
    pub product_id: String,
    pub quantity: i64,
    #[ts(type = "string")]
    pub unit_price: Money,
    #[ts(type = "string")]
    pub unit_cost: Money,
    /// `unit_price × quantity`.
    #[ts(type = "string")]
    pub total: Money,
    /// `total − unit_cost × quantity`.
    #[ts(type = "string")]
    pub utility: Money,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
