//! Ledger query service: transaction listings and single-transaction reads.
//!
//! Listings are always scoped to the caller, grouped by transaction id,
//! paginated over the grouped list, and cached as serialized JSON.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tally_core::ledger::{group_transactions, TransactionView};
use tally_core::pagination::{paginate, PageInfo, PageRequest};
use tally_core::policy::{authorize, authorize_sale, Ability, Capability};
use tally_core::validation::{validate_date, validate_date_range, validate_uuid};
use tally_core::{Actor, CoreError, ValidationErrors};
use tally_db::SaleFilter;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query string of `GET /sales`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListSalesQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub product_id: Option<String>,
    pub per_page: Option<i64>,
    pub cursor: Option<String>,
    pub page: Option<i64>,
}

/// Body of `GET /sales`.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionList {
    pub transactions: Vec<TransactionView>,
    /// Transactions on this page.
    pub count: usize,
    #[serde(flatten)]
    pub page: PageInfo,
}

/// Validated form of [`ListSalesQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct LedgerQuery {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    product_id: Option<String>,
    page: PageRequest,
}

impl LedgerQuery {
    fn parse(query: &ListSalesQuery) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let start = non_blank(&query.start_date).and_then(|d| errors.check(validate_date("start_date", d)));
        let end = non_blank(&query.end_date).and_then(|d| errors.check(validate_date("end_date", d)));
        errors.check(validate_date_range(start, end));

        let product_id = non_blank(&query.product_id).map(str::to_string);
        if let Some(id) = product_id.as_deref() {
            errors.check(validate_uuid("product_id", id));
        }

        let page = PageRequest::from_params(query.cursor.as_deref(), query.page, query.per_page);
        if let Err(page_errors) = &page {
            errors.append(page_errors.clone());
        }

        errors.into_result()?;
        Ok(LedgerQuery {
            start,
            end,
            product_id,
            page: page?,
        })
    }

    /// Inclusive calendar dates to a half-open UTC instant range.
    fn filter(&self) -> SaleFilter {
        SaleFilter {
            from: self.start.map(start_of_day),
            until: self.end.and_then(|end| end.succ_opt()).map(start_of_day),
            product_id: self.product_id.clone(),
        }
    }

    fn cache_key(&self, actor: &Actor) -> String {
        format!(
            "sales:{}:start={}:end={}:product={}:{}",
            actor.id,
            self.start.map(|d| d.to_string()).unwrap_or_default(),
            self.end.map(|d| d.to_string()).unwrap_or_default(),
            self.product_id.as_deref().unwrap_or_default(),
            self.page.cache_key()
        )
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Ledger query service.
pub struct LedgerQueryService {
    state: AppState,
}

impl LedgerQueryService {
    pub fn new(state: AppState) -> Self {
        LedgerQueryService { state }
    }

    /// Lists the caller's transactions as a serialized [`TransactionList`].
    ///
    /// Repeated calls with the same arguments within the cache TTL return
    /// byte-identical JSON.
    pub async fn list_transactions(&self, actor: &Actor, query: &ListSalesQuery) -> ApiResult<String> {
        authorize(actor, Capability::ViewAnySale)?;
        let query = LedgerQuery::parse(query)?;
        let key = query.cache_key(actor);

        self.state
            .cache
            .get_or_compute(&key, || async {
                let rows = self
                    .state
                    .db
                    .sales()
                    .ledger_rows(&actor.id, &query.filter())
                    .await?;
                let transactions = group_transactions(rows);
                let (transactions, page) = paginate(transactions, &query.page);

                debug!(user_id = %actor.id, count = transactions.len(), "Ledger page computed");
                Ok::<_, ApiError>(TransactionList {
                    count: transactions.len(),
                    transactions,
                    page,
                })
            })
            .await
    }

    /// One of the caller's transactions, with every line.
    pub async fn get_transaction(&self, actor: &Actor, transaction_id: &str) -> ApiResult<TransactionView> {
        let rows = self
            .state
            .db
            .sales()
            .transaction_rows(&actor.id, transaction_id)
            .await?;

        let first = rows
            .first()
            .ok_or_else(|| CoreError::not_found("Transaction", transaction_id))?;
        authorize_sale(actor, Ability::View, &first.line)?;

        Ok(TransactionView::from_rows(rows).ok_or_else(|| CoreError::not_found("Transaction", transaction_id))?)
    }
}
