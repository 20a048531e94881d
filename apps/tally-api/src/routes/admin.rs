use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::CurrentActor;
use crate::error::ApiResult;
use crate::routes::ApiJson;
use crate::services::users::{ChangeRoleRequest, CreateUserRequest, UserAdminService};
use crate::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Json<Value>> {
    let users = UserAdminService::new(state).list_users(&actor).await?;
    Ok(Json(json!({ "count": users.len(), "users": users })))
}

pub async fn create_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let user = UserAdminService::new(state).create_user(&actor, &request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

pub async fn change_role(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ChangeRoleRequest>,
) -> ApiResult<Json<Value>> {
    let user = UserAdminService::new(state)
        .change_role(&actor, &id, request.role)
        .await?;
    Ok(Json(json!({ "user": user })))
}
