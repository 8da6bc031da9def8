//! Checkout and transaction history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{AddressId, ProductId, TransactionId, UserId};
use domain::{Checkout, CheckoutItem};
use serde::{Deserialize, Serialize};
use store::{LineItem, Pagination, Store, Transaction, TransactionDetails, TransactionQuery};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub address_id: i64,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub items: Vec<CheckoutItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutItemRequest {
    pub product_id: i64,
    pub qty: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Exact payment method.
    pub method: Option<String>,
    /// Invoice code fragment.
    pub invoice: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub transaction: Transaction,
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub page: u32,
    pub limit: u32,
    pub transactions: Vec<TransactionDetails>,
}

impl CheckoutRequest {
    /// Builds the checkout command on behalf of the caller.
    pub fn into_command(self, user_id: UserId) -> Checkout {
        let items = self
            .items
            .into_iter()
            .map(|item| CheckoutItem::new(ProductId::new(item.product_id), item.qty))
            .collect();
        Checkout::new(
            user_id,
            AddressId::new(self.address_id),
            self.payment_method,
            items,
        )
    }
}

// -- Handlers --

/// POST /transactions: check out a basket for the caller.
#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let Json(req) = payload?;

    let receipt = state
        .checkout
        .checkout(req.into_command(user.user_id))
        .await?;

    let response = CheckoutResponse {
        transaction: receipt.transaction,
        line_items: receipt.line_items,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /transactions: list the caller's transactions, newest first.
#[tracing::instrument(skip(state, params), fields(user_id = %user.user_id))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    params: Result<Query<ListTransactionsParams>, QueryRejection>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let Query(params) = params?;

    let pagination = Pagination::new(params.page, params.limit);
    let mut query = TransactionQuery::for_user(user.user_id).paginate(pagination);
    if let Some(method) = params.method.filter(|m| !m.is_empty()) {
        query = query.payment_method(method);
    }
    if let Some(invoice) = params.invoice.filter(|i| !i.is_empty()) {
        query = query.invoice_contains(invoice);
    }

    let transactions = state.transactions.list(query).await?;

    Ok(Json(TransactionListResponse {
        page: pagination.page(),
        limit: pagination.limit(),
        transactions,
    }))
}

/// GET /transactions/{id}: fetch one of the caller's transactions.
#[tracing::instrument(skip(state, id), fields(user_id = %user.user_id))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<TransactionDetails>, ApiError> {
    let Path(id) = id?;

    let details = state
        .transactions
        .get(TransactionId::new(id), user.user_id)
        .await?;

    Ok(Json(details))
}
