//! Catalog service: each tenant's private product list.
//!
//! Every lookup is scoped to the caller, so a foreign product and a missing
//! one are the same 404.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use tally_core::money::Money;
use tally_core::pagination::{PageInfo, PageRequest};
use tally_core::policy::{authorize, authorize_product, Ability, Capability};
use tally_core::validation::{validate_amount, validate_brand, validate_product_name, validate_search_query};
use tally_core::{Actor, CoreError, Product, ValidationErrors};
use tally_db::ProductFilter;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub brand: Option<String>,
    pub price: Money,
    pub unit_cost: Option<Money>,
    pub bulk_cost: Option<Money>,
}

/// Partial update; absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub price: Option<Money>,
    pub unit_cost: Option<Money>,
    pub bulk_cost: Option<Money>,
}

/// Query string of `GET /products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListProductsQuery {
    pub search: Option<String>,
    pub brand: Option<String>,
    pub per_page: Option<i64>,
    pub cursor: Option<String>,
    pub page: Option<i64>,
}

/// Body of `GET /products`.
#[derive(Debug, Clone, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub count: usize,
    #[serde(flatten)]
    pub page: PageInfo,
}

fn validate_costs(
    errors: &mut ValidationErrors,
    price: Option<Money>,
    unit_cost: Option<Money>,
    bulk_cost: Option<Money>,
) {
    if let Some(price) = price {
        errors.check(validate_amount("price", price));
    }
    if let Some(cost) = unit_cost {
        errors.check(validate_amount("unit_cost", cost));
    }
    if let Some(cost) = bulk_cost {
        errors.check(validate_amount("bulk_cost", cost));
    }
}

pub struct CatalogService {
    state: AppState,
}

impl CatalogService {
    pub fn new(state: AppState) -> Self {
        CatalogService { state }
    }

    pub async fn create_product(&self, actor: &Actor, request: &CreateProductRequest) -> ApiResult<Product> {
        let mut errors = ValidationErrors::new();
        let name = errors.check(validate_product_name(&request.name));
        let brand = errors.check(validate_brand(request.brand.as_deref()));
        validate_costs(&mut errors, Some(request.price), request.unit_cost, request.bulk_cost);
        errors.into_result()?;

        authorize(actor, Capability::CreateProduct)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            owner_user_id: actor.id.clone(),
            name: name.unwrap_or_default(),
            brand: brand.flatten(),
            price: request.price,
            unit_cost: request.unit_cost,
            bulk_cost: request.bulk_cost,
            created_at: now,
            updated_at: now,
        };
        self.state.db.products().insert(&product).await?;

        info!(user_id = %actor.id, product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Lists the caller's products as a serialized [`ProductList`].
    pub async fn list_products(&self, actor: &Actor, query: &ListProductsQuery) -> ApiResult<String> {
        authorize(actor, Capability::ViewAnyProduct)?;

        let mut errors = ValidationErrors::new();
        let search = query
            .search
            .as_deref()
            .and_then(|s| errors.check(validate_search_query(s)))
            .flatten();
        let brand = errors
            .check(validate_brand(query.brand.as_deref()))
            .flatten();
        let page = PageRequest::from_params(query.cursor.as_deref(), query.page, query.per_page);
        if let Err(page_errors) = &page {
            errors.append(page_errors.clone());
        }
        errors.into_result()?;
        let page = page?;

        let filter = ProductFilter { search, brand };
        let key = format!(
            "products:{}:search={}:brand={}:{}",
            actor.id,
            filter.search.as_deref().unwrap_or_default(),
            filter.brand.as_deref().unwrap_or_default(),
            page.cache_key()
        );

        self.state
            .cache
            .get_or_compute(&key, || async {
                let repo = self.state.db.products();
                let total = repo.count_owned(&actor.id, &filter).await?;
                let products = if page.offset() < total {
                    repo.list_owned(&actor.id, &filter, page.per_page(), page.offset())
                        .await?
                } else {
                    Vec::new()
                };

                Ok::<_, ApiError>(ProductList {
                    count: products.len(),
                    products,
                    page: page.page_info(total),
                })
            })
            .await
    }

    pub async fn get_product(&self, actor: &Actor, id: &str) -> ApiResult<Product> {
        let product = self
            .state
            .db
            .products()
            .get_owned(&actor.id, id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", id))?;
        authorize_product(actor, Ability::View, &product)?;
        Ok(product)
    }

    pub async fn update_product(
        &self,
        actor: &Actor,
        id: &str,
        request: &UpdateProductRequest,
    ) -> ApiResult<Product> {
        let mut product = self.get_product(actor, id).await?;
        authorize_product(actor, Ability::Update, &product)?;

        let mut errors = ValidationErrors::new();
        if let Some(name) = request.name.as_deref() {
            if let Some(name) = errors.check(validate_product_name(name)) {
                product.name = name;
            }
        }
        if request.brand.is_some() {
            if let Some(brand) = errors.check(validate_brand(request.brand.as_deref())) {
                product.brand = brand;
            }
        }
        validate_costs(&mut errors, request.price, request.unit_cost, request.bulk_cost);
        errors.into_result()?;

        if let Some(price) = request.price {
            product.price = price;
        }
        if request.unit_cost.is_some() {
            product.unit_cost = request.unit_cost;
        }
        if request.bulk_cost.is_some() {
            product.bulk_cost = request.bulk_cost;
        }
        product.updated_at = Utc::now();

        self.state.db.products().update(&product).await?;
        info!(user_id = %actor.id, product_id = %product.id, "Product updated");
        Ok(product)
    }

    /// Deletes a product. Sale lines that reference it are kept.
    pub async fn delete_product(&self, actor: &Actor, id: &str) -> ApiResult<()> {
        let product = self.get_product(actor, id).await?;
        authorize_product(actor, Ability::Delete, &product)?;

        self.state.db.products().delete_owned(&actor.id, id).await?;
        info!(user_id = %actor.id, product_id = %id, "Product deleted");
        Ok(())
    }
}
