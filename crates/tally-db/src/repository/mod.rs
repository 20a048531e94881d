//! # Repository Module
//!
//! Database repository implementations for Tally.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Service (tally-api)                                                   │
//! │       │                                                                 │
//! │       │  db.products().find_owned(&actor.id, &ids)                     │
//! │       ▼                                                                 │
//! │  ProductRepository / SaleRepository / UserRepository                   │
//! │       │                                                                 │
//! │       │  SQL, always carrying the owner/user id                        │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Per-owner catalog
//! - [`SaleRepository`](sale::SaleRepository) - Sale lines and atomic transactions
//! - [`UserRepository`](user::UserRepository) - User directory and roles

pub mod product;
pub mod sale;
pub mod user;
