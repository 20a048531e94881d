//! HTTP surface.
//!
//! ```text
//! ┌────────────────────────────────────┬──────────────────────────────────────┐
//! │ Route                              │ Service                              │
//! ├────────────────────────────────────┼──────────────────────────────────────┤
//! │ POST   /sales                      │ TransactionEngine::create_transaction│
//! │ GET    /sales                      │ LedgerQueryService (cached)          │
//! │ GET    /sales/{transaction_id}     │ LedgerQueryService::get_transaction  │
//! │ PUT    /sales/{transaction_id}     │ TransactionEngine::update_line       │
//! │ DELETE /sales/{transaction_id}     │ TransactionEngine::delete_transaction│
//! │ *      /products[/{id}]            │ CatalogService                       │
//! │ *      /admin/users[/{id}/role]    │ UserAdminService                     │
//! │ GET    /health                     │ HealthService (no auth)              │
//! └────────────────────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! Handlers stay thin: extract, call one service method, shape the body.

mod admin;
mod health;
mod products;
mod sales;

use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::AppState;

/// JSON body extractor whose rejection is a 422 [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejection is a 422 [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// A response body that is already serialized JSON.
pub struct RawJson(pub String);

impl IntoResponse for RawJson {
    fn into_response(self) -> Response {
        ([(CONTENT_TYPE, "application/json")], self.0).into_response()
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sales", get(sales::list).post(sales::create))
        .route(
            "/sales/{transaction_id}",
            get(sales::show).put(sales::update).delete(sales::destroy),
        )
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            get(products::show).put(products::update).delete(products::destroy),
        )
        .route("/admin/users", get(admin::list_users).post(admin::create_user))
        .route("/admin/users/{id}/role", put(admin::change_role))
        .route("/health", get(health::check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tally_core::Role;
    use tower::ServiceExt;

    use crate::testing::{bearer, seed_product, test_state};

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn parse(body: &str) -> Value {
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let app = router(test_state().await);

        let (status, body) = call(&app, Method::GET, "/sales", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(parse(&body)["code"], "unauthenticated");

        let (status, _) = call(&app, Method::GET, "/sales", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = router(test_state().await);

        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse(&body)["status"], "serving");
    }

    #[tokio::test]
    async fn test_create_sale_worked_example() {
        let state = test_state().await;
        let p1 = seed_product(&state, "u1", "P1", "29.99", Some("15.00")).await;
        let token = bearer(&state, "u1", Role::Regular);
        let app = router(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/sales",
            Some(&token),
            Some(json!({ "products": [{ "product_id": p1.id, "quantity": 2 }] })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let body = parse(&body);
        assert!(body["transaction_id"].as_str().unwrap().starts_with("TXN-"));
        assert_eq!(body["summary"]["total_income"], "59.98");
        assert_eq!(body["summary"]["total_cost"], "30.00");
        assert_eq!(body["summary"]["total_utility"], "29.98");
        assert_eq!(body["summary"]["items_count"], 1);
        assert_eq!(body["sales"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_sale_validation_and_ownership() {
        let state = test_state().await;
        let foreign = seed_product(&state, "u2", "P2", "5.00", None).await;
        let token = bearer(&state, "u1", Role::Regular);
        let app = router(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/sales",
            Some(&token),
            Some(json!({ "products": [{ "product_id": foreign.id, "quantity": 0 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(parse(&body)["errors"]["products.0.quantity"].is_array());

        let (status, body) = call(
            &app,
            Method::POST,
            "/sales",
            Some(&token),
            Some(json!({ "products": [{ "product_id": foreign.id, "quantity": 1 }] })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(parse(&body)["code"], "ownership_violation");

        let (status, _) = call(&app, Method::POST, "/sales", Some(&token), Some(json!({ "products": "x" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_list_modes_and_cache() {
        let state = test_state().await;
        let p1 = seed_product(&state, "u1", "P1", "10.00", None).await;
        let token = bearer(&state, "u1", Role::Regular);
        let app = router(state);

        for _ in 0..3 {
            let (status, _) = call(
                &app,
                Method::POST,
                "/sales",
                Some(&token),
                Some(json!({ "products": [{ "product_id": p1.id, "quantity": 1 }] })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, first) = call(&app, Method::GET, "/sales?per_page=2", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let page = parse(&first);
        assert_eq!(page["count"], 2);
        assert_eq!(page["has_more"], true);
        assert!(page["prev_cursor"].is_null());

        let cursor = page["next_cursor"].as_str().unwrap().to_string();
        let (_, next) = call(
            &app,
            Method::GET,
            &format!("/sales?per_page=2&cursor={cursor}"),
            Some(&token),
            None,
        )
        .await;
        let next = parse(&next);
        assert_eq!(next["count"], 1);
        assert_eq!(next["has_more"], false);

        let (_, paged) = call(&app, Method::GET, "/sales?page=1&per_page=2", Some(&token), None).await;
        assert_eq!(parse(&paged)["pagination"]["last_page"], 2);

        let (status, _) = call(&app, Method::GET, "/sales?page=1&cursor=abc", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, again) = call(&app, Method::GET, "/sales?per_page=2", Some(&token), None).await;
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_transaction_lifecycle_and_isolation() {
        let state = test_state().await;
        let p1 = seed_product(&state, "u1", "P1", "29.99", Some("15.00")).await;
        let owner = bearer(&state, "u1", Role::Regular);
        let stranger = bearer(&state, "u2", Role::Admin);
        let app = router(state);

        let (_, created) = call(
            &app,
            Method::POST,
            "/sales",
            Some(&owner),
            Some(json!({ "products": [{ "product_id": p1.id, "quantity": 2 }] })),
        )
        .await;
        let txid = parse(&created)["transaction_id"].as_str().unwrap().to_string();
        let uri = format!("/sales/{txid}");

        let (status, _) = call(&app, Method::GET, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::DELETE, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, updated) = call(
            &app,
            Method::PUT,
            &uri,
            Some(&owner),
            Some(json!({ "product_id": p1.id, "quantity": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let updated = parse(&updated);
        assert_eq!(updated["transaction"]["total_amount"], "89.97");
        assert_eq!(updated["transaction"]["total_utility"], "44.97");

        let (status, deleted) = call(&app, Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        let deleted = parse(&deleted);
        assert_eq!(deleted["deleted_transaction"]["total_amount"], "89.97");
        assert_eq!(deleted["deleted_transaction"]["total_items"], 3);

        let (status, _) = call(&app, Method::GET, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_product_routes() {
        let state = test_state().await;
        let token = bearer(&state, "u1", Role::Regular);
        let other = bearer(&state, "u2", Role::Regular);
        let app = router(state);

        let (status, created) = call(
            &app,
            Method::POST,
            "/products",
            Some(&token),
            Some(json!({ "name": "Mug", "price": 9.5, "unit_cost": "4.25" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let product = parse(&created)["product"].clone();
        assert_eq!(product["price"], "9.50");
        let uri = format!("/products/{}", product["id"].as_str().unwrap());

        let (status, _) = call(&app, Method::GET, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, updated) = call(&app, Method::PUT, &uri, Some(&token), Some(json!({ "brand": "Acme" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse(&updated)["product"]["brand"], "Acme");

        let (status, _) = call(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_admin_routes_are_role_gated() {
        let state = test_state().await;
        let admin = bearer(&state, "admin-1", Role::Admin);
        let regular = bearer(&state, "u1", Role::Regular);
        let app = router(state);

        let (status, _) = call(&app, Method::GET, "/admin/users", Some(&regular), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, created) = call(
            &app,
            Method::POST,
            "/admin/users",
            Some(&admin),
            Some(json!({ "display_name": "Ann" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let user = parse(&created)["user"].clone();
        assert_eq!(user["role"], "regular");

        let (status, changed) = call(
            &app,
            Method::PUT,
            &format!("/admin/users/{}/role", user["id"].as_str().unwrap()),
            Some(&admin),
            Some(json!({ "role": "moderator" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse(&changed)["user"]["role"], "moderator");

        let (status, _) = call(
            &app,
            Method::PUT,
            "/admin/users/admin-1/role",
            Some(&admin),
            Some(json!({ "role": "superuser" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
