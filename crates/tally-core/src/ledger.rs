//! # Ledger Module
//!
//! Line pricing, transaction summaries and the grouping that turns flat sale
//! lines back into transactions.
//!
//! ## Line Math
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total   = unit_price × quantity                                        │
//! │  cost    = unit_cost  × quantity      (missing unit_cost counts as 0)   │
//! │  utility = total − cost                                                 │
//! │                                                                         │
//! │  Example: price 29.99, cost 15.00, qty 2                                │
//! │           total 59.98, cost 30.00, utility 29.98                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Grouping
//! ```text
//!   rows (any order)                   TransactionView (date desc)
//!   ┌──────────────┬─────────┐         ┌─────────────────────────────────┐
//!   │ TXN-…-b  #0  │ 10:00:01│ ──┐     │ TXN-…-b  2 lines  10:00:01      │
//!   │ TXN-…-a  #0  │ 10:00:01│   ├──►  │ TXN-…-a  1 line   10:00:01      │
//!   │ TXN-…-b  #1  │ 10:00:01│ ──┘     └─────────────────────────────────┘
//!   └──────────────┴─────────┘
//! ```
//! Lines are grouped by `transaction_id` only, so two checkouts in the same
//! second never merge.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError, ValidationErrors};
use crate::money::Money;
use crate::types::{Actor, Product, SaleLine};
use crate::validation::{validate_line_count, validate_quantity, validate_uuid, ValidationResult};
use crate::{MAX_AMOUNT, MAX_ITEM_QUANTITY};

// =============================================================================
// Requests
// =============================================================================

/// One requested line of a new sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Validates every line of a create request, collecting all failures under
/// `products.N.<field>` keys.
pub fn validate_line_requests(lines: &[LineRequest]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    errors.check(validate_line_count(lines.len()));
    for (i, line) in lines.iter().enumerate() {
        errors.check(validate_uuid(&format!("products.{i}.product_id"), &line.product_id));
        errors.check(validate_quantity(&format!("products.{i}.quantity"), line.quantity));
    }

    errors.into_result()
}

/// Distinct requested product ids, sorted.
pub fn distinct_product_ids(lines: &[LineRequest]) -> Vec<String> {
    lines
        .iter()
        .map(|l| l.product_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// All-or-nothing ownership gate: every distinct requested id must be among
/// the actor's products.
pub fn ensure_all_owned(requested: &[String], owned: &[Product]) -> CoreResult<()> {
    let owned_ids: BTreeSet<&str> = owned.iter().map(|p| p.id.as_str()).collect();
    let matched = requested
        .iter()
        .filter(|id| owned_ids.contains(id.as_str()))
        .count();

    if matched == requested.len() {
        Ok(())
    } else {
        Err(CoreError::OwnershipViolation {
            requested: requested.len(),
            owned: matched,
        })
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Computed amounts of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePricing {
    pub unit_price: Money,
    pub unit_cost: Money,
    pub total: Money,
    pub utility: Money,
}

/// Largest total (or cost) one line may carry. A hundred of these still fit
/// in `i64` cents, so transaction sums need no overflow checks.
pub const MAX_LINE_AMOUNT: Money = Money::from_cents(MAX_AMOUNT.cents() * MAX_ITEM_QUANTITY);

fn line_amount(field: &str, unit: Money, quantity: i64) -> ValidationResult<Money> {
    unit.checked_mul_quantity(quantity)
        .filter(|amount| amount.cents().unsigned_abs() <= MAX_LINE_AMOUNT.cents().unsigned_abs())
        .ok_or_else(|| ValidationError::Rule {
            field: field.to_string(),
            message: format!("{field} puts the line amount above {MAX_LINE_AMOUNT}"),
        })
}

/// Prices a new line from the product's current price and cost.
///
/// `field` names the quantity in the error when the line amount would leave
/// the supported range.
pub fn price_line(
    field: &str,
    unit_price: Money,
    unit_cost: Option<Money>,
    quantity: i64,
) -> ValidationResult<LinePricing> {
    let unit_cost = unit_cost.unwrap_or_default();
    let total = line_amount(field, unit_price, quantity)?;
    let cost = line_amount(field, unit_cost, quantity)?;

    Ok(LinePricing {
        unit_price,
        unit_cost,
        total,
        utility: total - cost,
    })
}

/// Reprices an existing line for a new quantity.
///
/// `unit_price` stays the snapshotted one. Cost comes from the product's
/// *current* `unit_cost` when the product still exists, else from the line's
/// own snapshot.
pub fn reprice_line(
    line: &SaleLine,
    product: Option<&Product>,
    quantity: i64,
) -> ValidationResult<LinePricing> {
    let unit_cost = match product {
        Some(p) => p.unit_cost_or_zero(),
        None => line.unit_cost,
    };
    price_line("quantity", line.unit_price, Some(unit_cost), quantity)
}

/// Builds the sale lines of a new transaction, in request order.
///
/// Callers must have passed [`ensure_all_owned`]; a product missing from
/// `owned` here is reported as not found.
pub fn build_sale_lines(
    actor: &Actor,
    transaction_id: &str,
    requests: &[LineRequest],
    owned: &[Product],
    now: DateTime<Utc>,
) -> CoreResult<Vec<SaleLine>> {
    let by_id: HashMap<&str, &Product> = owned.iter().map(|p| (p.id.as_str(), p)).collect();

    requests
        .iter()
        .enumerate()
        .map(|(line_no, req)| -> CoreResult<SaleLine> {
            let product = by_id
                .get(req.product_id.as_str())
                .ok_or_else(|| CoreError::not_found("Product", &req.product_id))?;
            let pricing = price_line(
                &format!("products.{line_no}.quantity"),
                product.price,
                product.unit_cost,
                req.quantity,
            )?;

            Ok(SaleLine {
                id: Uuid::new_v4().to_string(),
                user_id: actor.id.clone(),
                transaction_id: transaction_id.to_string(),
                line_no: line_no as i64,
                product_id: product.id.clone(),
                quantity: req.quantity,
                unit_price: pricing.unit_price,
                unit_cost: pricing.unit_cost,
                total: pricing.total,
                utility: pricing.utility,
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}

// =============================================================================
// Summaries
// =============================================================================

/// Totals of a freshly created transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionSummary {
    #[ts(type = "string")]
    pub total_income: Money,
    #[ts(type = "string")]
    pub total_cost: Money,
    #[ts(type = "string")]
    pub total_utility: Money,
    /// Number of lines.
    pub items_count: usize,
}

impl TransactionSummary {
    pub fn from_lines(lines: &[SaleLine]) -> Self {
        let total_income: Money = lines.iter().map(|l| l.total).sum();
        let total_utility: Money = lines.iter().map(|l| l.utility).sum();

        TransactionSummary {
            total_income,
            total_cost: total_income - total_utility,
            total_utility,
            items_count: lines.len(),
        }
    }
}

// =============================================================================
// Views
// =============================================================================

/// A sale line joined with its (possibly deleted) product and its creator.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LedgerRow {
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub line: SaleLine,
    pub product_name: Option<String>,
    pub product_brand: Option<String>,
    pub user_name: Option<String>,
}

/// One line as shown inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionProduct {
    pub sale_id: String,
    pub product_id: String,
    /// `None` once the product has been deleted.
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub quantity: i64,
    #[ts(type = "string")]
    pub unit_price: Money,
    #[ts(type = "string")]
    pub total: Money,
    #[ts(type = "string")]
    pub utility: Money,
}

/// Read-only projection of every line sharing one `transaction_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionView {
    pub transaction_id: String,
    /// Earliest `created_at` among the lines.
    #[ts(type = "string")]
    pub transaction_date: DateTime<Utc>,
    #[ts(type = "string")]
    pub total_amount: Money,
    #[ts(type = "string")]
    pub total_utility: Money,
    /// Sum of quantities.
    pub total_items: i64,
    /// Number of lines.
    pub products_count: usize,
    pub products: Vec<TransactionProduct>,
    pub user_name: Option<String>,
}

impl TransactionView {
    /// Builds the view of one group. Returns `None` for an empty group.
    pub fn from_rows(mut rows: Vec<LedgerRow>) -> Option<Self> {
        rows.sort_by_key(|r| r.line.line_no);

        let first = rows.first()?;
        let transaction_id = first.line.transaction_id.clone();
        let user_name = first.user_name.clone();
        let transaction_date = rows.iter().map(|r| r.line.created_at).min()?;

        let total_amount: Money = rows.iter().map(|r| r.line.total).sum();
        let total_utility: Money = rows.iter().map(|r| r.line.utility).sum();
        let total_items: i64 = rows.iter().map(|r| r.line.quantity).sum();

        let products: Vec<TransactionProduct> = rows
            .into_iter()
            .map(|r| TransactionProduct {
                sale_id: r.line.id,
                product_id: r.line.product_id,
                product_name: r.product_name,
                brand: r.product_brand,
                quantity: r.line.quantity,
                unit_price: r.line.unit_price,
                total: r.line.total,
                utility: r.line.utility,
            })
            .collect();

        Some(TransactionView {
            transaction_id,
            transaction_date,
            total_amount,
            total_utility,
            total_items,
            products_count: products.len(),
            products,
            user_name,
        })
    }

    /// `total_amount − total_utility`.
    pub fn total_cost(&self) -> Money {
        self.total_amount - self.total_utility
    }
}

/// Groups rows by `transaction_id` and orders the groups newest first,
/// ties broken by `transaction_id` descending.
pub fn group_transactions(rows: Vec<LedgerRow>) -> Vec<TransactionView> {
    let mut groups: HashMap<String, Vec<LedgerRow>> = HashMap::new();
    for row in rows {
        groups
            .entry(row.line.transaction_id.clone())
            .or_default()
            .push(row);
    }

    let mut views: Vec<TransactionView> = groups
        .into_values()
        .filter_map(TransactionView::from_rows)
        .collect();

    views.sort_by(|a, b| {
        b.transaction_date
            .cmp(&a.transaction_date)
            .then_with(|| b.transaction_id.cmp(&a.transaction_id))
    });
    views
}

/// What a delete reports about the transaction it removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeletedTransaction {
    pub transaction_id: String,
    #[ts(type = "string")]
    pub total_amount: Money,
    pub total_items: i64,
    pub products_count: usize,
    #[ts(type = "string")]
    pub deleted_at: DateTime<Utc>,
}

impl DeletedTransaction {
    pub fn from_view(view: &TransactionView, deleted_at: DateTime<Utc>) -> Self {
        DeletedTransaction {
            transaction_id: view.transaction_id.clone(),
            total_amount: view.total_amount,
            total_items: view.total_items,
            products_count: view.products_count,
            deleted_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use chrono::TimeZone;

    const P1: &str = "11111111-1111-4111-8111-111111111111";
    const P2: &str = "22222222-2222-4222-8222-222222222222";

    fn money(s: &str) -> Money {
        s.parse().unwrap()
    }

    fn product(id: &str, price: &str, cost: Option<&str>) -> Product {
        let now = Utc::now();
        Product {
            id: id.into(),
            owner_user_id: "u1".into(),
            name: format!("Product {id}"),
            brand: Some("Acme".into()),
            price: money(price),
            unit_cost: cost.map(money),
            bulk_cost: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn row(txn: &str, line_no: i64, at: DateTime<Utc>, total: &str, utility: &str, qty: i64) -> LedgerRow {
        LedgerRow {
            line: SaleLine {
                id: format!("{txn}-{line_no}"),
                user_id: "u1".into(),
                transaction_id: txn.into(),
                line_no,
                product_id: P1.into(),
                quantity: qty,
                unit_price: money(total),
                unit_cost: Money::zero(),
                total: money(total),
                utility: money(utility),
                created_at: at,
                updated_at: at,
            },
            product_name: Some("Widget".into()),
            product_brand: None,
            user_name: Some("Ursula".into()),
        }
    }

    #[test]
    fn test_price_line_worked_example() {
        let pricing = price_line("quantity", money("29.99"), Some(money("15.00")), 2).unwrap();
        assert_eq!(pricing.total, money("59.98"));
        assert_eq!(pricing.utility, money("29.98"));
        assert_eq!(pricing.total - pricing.utility, money("30.00"));
    }

    #[test]
    fn test_price_line_without_cost() {
        let pricing = price_line("quantity", money("19.99"), None, 1).unwrap();
        assert_eq!(pricing.utility, pricing.total);
        assert!(pricing.unit_cost.is_zero());
    }

    #[test]
    fn test_build_lines_and_summary() {
        let actor = Actor::new("u1", Role::Regular);
        let owned = vec![product(P1, "29.99", Some("15.00"))];
        let requests = vec![LineRequest {
            product_id: P1.into(),
            quantity: 2,
        }];

        let lines = build_sale_lines(&actor, "TXN-1", &requests, &owned, Utc::now()).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_no, 0);
        assert_eq!(lines[0].unit_price, money("29.99"));

        let summary = TransactionSummary::from_lines(&lines);
        assert_eq!(summary.total_income, money("59.98"));
        assert_eq!(summary.total_cost, money("30.00"));
        assert_eq!(summary.total_utility, money("29.98"));
        assert_eq!(summary.items_count, 1);
    }

    #[test]
    fn test_reprice_uses_current_cost_then_snapshot() {
        let actor = Actor::new("u1", Role::Regular);
        let owned = vec![product(P1, "29.99", Some("15.00"))];
        let requests = vec![LineRequest {
            product_id: P1.into(),
            quantity: 2,
        }];
        let line = build_sale_lines(&actor, "TXN-1", &requests, &owned, Utc::now())
            .unwrap()
            .remove(0);

        let repriced = reprice_line(&line, Some(&owned[0]), 3).unwrap();
        assert_eq!(repriced.total, money("89.97"));
        assert_eq!(repriced.utility, money("44.97"));

        let mut cheaper = owned[0].clone();
        cheaper.unit_cost = Some(money("10.00"));
        assert_eq!(reprice_line(&line, Some(&cheaper), 3).unwrap().utility, money("59.97"));

        // Product deleted: the snapshot keeps the cost.
        assert_eq!(reprice_line(&line, None, 3).unwrap().utility, money("44.97"));
    }

    #[test]
    fn test_price_line_rejects_amounts_out_of_range() {
        let huge = money("92233720368547758.07");
        let err = price_line("products.0.quantity", huge, None, 2).unwrap_err();
        assert_eq!(err.field(), "products.0.quantity");

        // Above the line ceiling even without multiplying.
        assert!(price_line("quantity", huge, None, 1).is_err());
        assert!(price_line("quantity", money("1.00"), Some(huge), 1).is_err());

        let top = price_line("quantity", MAX_AMOUNT, Some(MAX_AMOUNT), MAX_ITEM_QUANTITY).unwrap();
        assert_eq!(top.total, MAX_LINE_AMOUNT);
        assert!(top.utility.is_zero());
    }

    #[test]
    fn test_build_lines_rejects_overflowing_product() {
        let actor = Actor::new("u1", Role::Regular);
        let owned = vec![product(P1, "92233720368547758.07", None)];
        let requests = vec![LineRequest {
            product_id: P1.into(),
            quantity: 2,
        }];

        let err = build_sale_lines(&actor, "TXN-1", &requests, &owned, Utc::now()).unwrap_err();
        match err {
            CoreError::Validation(errors) => {
                assert!(errors.to_field_map().contains_key("products.0.quantity"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_line_requests_keys_by_position() {
        let lines = vec![
            LineRequest {
                product_id: P1.into(),
                quantity: 1,
            },
            LineRequest {
                product_id: "nope".into(),
                quantity: 0,
            },
        ];
        let errors = validate_line_requests(&lines).unwrap_err();
        let map = errors.to_field_map();
        assert!(map.contains_key("products.1.product_id"));
        assert!(map.contains_key("products.1.quantity"));
        assert!(!map.contains_key("products.0.quantity"));

        assert!(validate_line_requests(&[]).is_err());
    }

    #[test]
    fn test_ownership_gate_counts_distinct_ids() {
        let lines = vec![
            LineRequest {
                product_id: P1.into(),
                quantity: 1,
            },
            LineRequest {
                product_id: P1.into(),
                quantity: 4,
            },
        ];
        let ids = distinct_product_ids(&lines);
        assert_eq!(ids, vec![P1.to_string()]);
        assert!(ensure_all_owned(&ids, &[product(P1, "1.00", None)]).is_ok());

        let ids = vec![P1.to_string(), P2.to_string()];
        let err = ensure_all_owned(&ids, &[product(P1, "1.00", None)]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::OwnershipViolation {
                requested: 2,
                owned: 1
            }
        ));
    }

    #[test]
    fn test_same_second_transactions_stay_separate() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 1).unwrap();
        let rows = vec![
            row("TXN-b", 0, at, "10.00", "4.00", 1),
            row("TXN-a", 0, at, "5.00", "1.00", 2),
            row("TXN-b", 1, at, "20.00", "6.00", 3),
        ];

        let views = group_transactions(rows);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].transaction_id, "TXN-b");
        assert_eq!(views[0].products_count, 2);
        assert_eq!(views[0].total_amount, money("30.00"));
        assert_eq!(views[0].total_utility, money("10.00"));
        assert_eq!(views[0].total_items, 4);
        assert_eq!(views[0].total_cost(), money("20.00"));
        assert_eq!(views[1].transaction_id, "TXN-a");
    }

    #[test]
    fn test_groups_sorted_newest_first() {
        let early = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 10, 2, 9, 0, 0).unwrap();
        let rows = vec![
            row("TXN-z", 0, early, "1.00", "1.00", 1),
            row("TXN-a", 0, late, "1.00", "1.00", 1),
        ];

        let views = group_transactions(rows);
        assert_eq!(views[0].transaction_id, "TXN-a");
        assert_eq!(views[0].transaction_date, late);
    }

    #[test]
    fn test_deleted_transaction_summary() {
        let at = Utc::now();
        let view = TransactionView::from_rows(vec![
            row("TXN-1", 0, at, "59.98", "29.98", 2),
            row("TXN-1", 1, at, "19.99", "9.99", 1),
        ])
        .unwrap();

        let deleted = DeletedTransaction::from_view(&view, at);
        assert_eq!(deleted.total_amount, money("79.97"));
        assert_eq!(deleted.total_items, 3);
        assert_eq!(deleted.products_count, 2);
    }
}
