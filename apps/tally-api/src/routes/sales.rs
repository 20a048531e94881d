use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::CurrentActor;
use crate::error::ApiResult;
use crate::routes::{ApiJson, ApiQuery, RawJson};
use crate::services::ledger::{LedgerQueryService, ListSalesQuery};
use crate::services::sales::{CreateSaleRequest, CreatedTransaction, TransactionEngine, UpdateLineRequest};
use crate::AppState;

pub async fn create(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<CreateSaleRequest>,
) -> ApiResult<(StatusCode, Json<CreatedTransaction>)> {
    let created = TransactionEngine::new(state)
        .create_transaction(&actor, &request.products)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<ListSalesQuery>,
) -> ApiResult<RawJson> {
    let json = LedgerQueryService::new(state)
        .list_transactions(&actor, &query)
        .await?;
    Ok(RawJson(json))
}

pub async fn show(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(transaction_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let transaction = LedgerQueryService::new(state)
        .get_transaction(&actor, &transaction_id)
        .await?;
    Ok(Json(json!({ "transaction": transaction })))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(transaction_id): Path<String>,
    ApiJson(request): ApiJson<UpdateLineRequest>,
) -> ApiResult<Json<Value>> {
    let transaction = TransactionEngine::new(state)
        .update_line(&actor, &transaction_id, &request)
        .await?;
    Ok(Json(json!({
        "message": "Sale updated successfully",
        "transaction": transaction,
    })))
}

pub async fn destroy(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(transaction_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let deleted = TransactionEngine::new(state)
        .delete_transaction(&actor, &transaction_id)
        .await?;
    Ok(Json(json!({ "deleted_transaction": deleted })))
}
