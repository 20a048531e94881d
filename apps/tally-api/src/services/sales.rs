//! Transaction engine: creating, amending and deleting sale transactions.
//!
//! ## create_transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. validate lines          → 422, nothing written                      │
//! │  2. create-sale capability  → 403                                       │
//! │  3. bulk ownership check    → 403 ownership_violation, nothing written  │
//! │  4. pick transaction id     ┐                                           │
//! │  5. price lines             │ up to 5 attempts; a taken id (pre-check   │
//! │  6. insert atomically       ┘ or UNIQUE violation) starts over          │
//! │  7. exhausted               → 409                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tally_core::ledger::{
    build_sale_lines, distinct_product_ids, ensure_all_owned, reprice_line, validate_line_requests,
    DeletedTransaction, LineRequest, TransactionSummary, TransactionView,
};
use tally_core::policy::{authorize, authorize_sale, Ability, Capability};
use tally_core::transaction_id::generate_transaction_id;
use tally_core::validation::{validate_quantity, validate_uuid};
use tally_core::{Actor, CoreError, SaleLine, ValidationErrors, MAX_TRANSACTION_ID_ATTEMPTS};
use tally_db::DbError;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Produces a candidate transaction id for an actor at an instant.
pub type IdGenerator = fn(&str, DateTime<Utc>) -> String;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSaleRequest {
    pub products: Vec<LineRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Result of a successful create.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTransaction {
    pub transaction_id: String,
    pub sales: Vec<SaleLine>,
    pub summary: TransactionSummary,
}

/// Transaction engine.
pub struct TransactionEngine {
    state: AppState,
    id_generator: IdGenerator,
}

impl TransactionEngine {
    /// Create a new engine.
    pub fn new(state: AppState) -> Self {
        TransactionEngine {
            state,
            id_generator: generate_transaction_id,
        }
    }

    /// Replaces the transaction id source.
    pub fn with_id_generator(mut self, id_generator: IdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// Records a multi-line sale as one atomic transaction.
    pub async fn create_transaction(
        &self,
        actor: &Actor,
        requests: &[LineRequest],
    ) -> ApiResult<CreatedTransaction> {
        validate_line_requests(requests)?;
        authorize(actor, Capability::CreateSale)?;

        let ids = distinct_product_ids(requests);
        let owned = self.state.db.products().find_owned(&actor.id, &ids).await?;
        if let Err(e) = ensure_all_owned(&ids, &owned) {
            warn!(user_id = %actor.id, error = %e, "Sale rejected by ownership check");
            return Err(e.into());
        }

        let sales = self.state.db.sales();

        for attempt in 1..=MAX_TRANSACTION_ID_ATTEMPTS {
            let now = Utc::now();
            let transaction_id = (self.id_generator)(&actor.id, now);

            if sales.transaction_id_exists(&transaction_id).await? {
                warn!(attempt, transaction_id = %transaction_id, "Transaction id already in use");
                continue;
            }

            let lines = build_sale_lines(actor, &transaction_id, requests, &owned, now)?;

            match sales.insert_transaction(&lines).await {
                Ok(()) => {
                    let summary = TransactionSummary::from_lines(&lines);
                    info!(
                        user_id = %actor.id,
                        transaction_id = %transaction_id,
                        lines = lines.len(),
                        total = %summary.total_income,
                        "Transaction created"
                    );
                    return Ok(CreatedTransaction {
                        transaction_id,
                        sales: lines,
                        summary,
                    });
                }
                Err(DbError::UniqueViolation { .. }) => {
                    warn!(attempt, transaction_id = %transaction_id, "Transaction id collided on insert");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::Conflict(format!(
            "could not allocate a unique transaction id after {MAX_TRANSACTION_ID_ATTEMPTS} attempts"
        ))
        .into())
    }

    /// Changes the quantity of one product line and returns the refreshed
    /// transaction.
    pub async fn update_line(
        &self,
        actor: &Actor,
        transaction_id: &str,
        request: &UpdateLineRequest,
    ) -> ApiResult<TransactionView> {
        let mut errors = ValidationErrors::new();
        errors.check(validate_uuid("product_id", &request.product_id));
        errors.check(validate_quantity("quantity", request.quantity));
        errors.into_result()?;

        let sales = self.state.db.sales();
        let mut line = sales
            .find_line(&actor.id, transaction_id, &request.product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", transaction_id))?;

        authorize_sale(actor, Ability::Update, &line)?;

        let product = self
            .state
            .db
            .products()
            .get_owned(&actor.id, &line.product_id)
            .await?;
        let pricing = reprice_line(&line, product.as_ref(), request.quantity).map_err(CoreError::from)?;

        line.quantity = request.quantity;
        line.unit_cost = pricing.unit_cost;
        line.total = pricing.total;
        line.utility = pricing.utility;
        line.updated_at = Utc::now();
        sales.update_line(&line).await?;

        info!(
            user_id = %actor.id,
            transaction_id = %transaction_id,
            product_id = %line.product_id,
            quantity = line.quantity,
            "Sale line updated"
        );

        let rows = sales.transaction_rows(&actor.id, transaction_id).await?;
        TransactionView::from_rows(rows).ok_or_else(|| CoreError::not_found("Transaction", transaction_id).into())
    }

    /// Deletes every line of a transaction and reports what was removed.
    ///
    /// The reported totals come from the same SQL transaction as the delete.
    pub async fn delete_transaction(&self, actor: &Actor, transaction_id: &str) -> ApiResult<DeletedTransaction> {
        let rows = self
            .state
            .db
            .sales()
            .take_transaction(&actor.id, transaction_id, |rows| {
                for row in rows {
                    authorize_sale(actor, Ability::Delete, &row.line)?;
                }
                Ok::<_, ApiError>(())
            })
            .await?;

        let view = TransactionView::from_rows(rows)
            .ok_or_else(|| ApiError::from(CoreError::not_found("Transaction", transaction_id)))?;
        info!(
            user_id = %actor.id,
            transaction_id = %transaction_id,
            lines = view.products_count,
            total = %view.total_amount,
            "Transaction deleted"
        );

        Ok(DeletedTransaction::from_view(&view, Utc::now()))
    }
}
