//! Catalog read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use common::{CategoryId, Money, ProductId, StoreId};
use serde::{Deserialize, Serialize};
use store::{Pagination, Product, ProductQuery, Store};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsParams {
    /// Name fragment, case-insensitive.
    pub name: Option<String>,
    pub category: Option<i64>,
    pub store: Option<i64>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub products: Vec<Product>,
}

impl ListProductsParams {
    fn into_query(self) -> ProductQuery {
        let mut query = ProductQuery::new().paginate(Pagination::new(self.page, self.limit));
        if let Some(name) = self.name.filter(|n| !n.is_empty()) {
            query = query.name_contains(name);
        }
        if let Some(category) = self.category {
            query = query.category_id(CategoryId::new(category));
        }
        if let Some(store) = self.store {
            query = query.store_id(StoreId::new(store));
        }
        if let Some(min) = self.min_price {
            query = query.min_price(Money::from_minor(min));
        }
        if let Some(max) = self.max_price {
            query = query.max_price(Money::from_minor(max));
        }
        query
    }
}

/// GET /products: browse the catalog.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<ListProductsParams>, QueryRejection>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let Query(params) = params?;

    let page = state.products.list(params.into_query()).await?;
    let total_pages = page.total_pages();

    Ok(Json(ProductListResponse {
        page: page.page,
        limit: page.limit,
        total: page.total,
        total_pages,
        products: page.items,
    }))
}

/// GET /products/{id}: read one product.
#[tracing::instrument(skip(state, id))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Product>, ApiError> {
    let Path(id) = id?;
    let product = state.products.get(ProductId::new(id)).await?;
    Ok(Json(product))
}
