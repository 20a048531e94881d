//! Service layer.
//!
//! Each service borrows the shared [`AppState`](crate::AppState) and turns
//! one HTTP-independent operation into core checks plus repository calls.

pub mod catalog;
pub mod health;
pub mod ledger;
pub mod sales;
pub mod users;
