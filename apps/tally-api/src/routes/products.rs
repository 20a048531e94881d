use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::CurrentActor;
use crate::error::ApiResult;
use crate::routes::{ApiJson, ApiQuery, RawJson};
use crate::services::catalog::{CatalogService, CreateProductRequest, ListProductsQuery, UpdateProductRequest};
use crate::AppState;

pub async fn create(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let product = CatalogService::new(state).create_product(&actor, &request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "product": product }))))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<ListProductsQuery>,
) -> ApiResult<RawJson> {
    let json = CatalogService::new(state).list_products(&actor, &query).await?;
    Ok(RawJson(json))
}

pub async fn show(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let product = CatalogService::new(state).get_product(&actor, &id).await?;
    Ok(Json(json!({ "product": product })))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> ApiResult<Json<Value>> {
    let product = CatalogService::new(state)
        .update_product(&actor, &id, &request)
        .await?;
    Ok(Json(json!({ "product": product })))
}

pub async fn destroy(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    CatalogService::new(state).delete_product(&actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
