//! Read side of the transaction store.

use common::{TransactionId, UserId};
use store::{Store, TransactionDetails, TransactionQuery};

use crate::DomainError;

/// Ownership-scoped reads of past transactions.
#[derive(Clone)]
pub struct TransactionService<S: Store> {
    store: S,
}

impl<S: Store> TransactionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists the caller's transactions, newest first.
    #[tracing::instrument(skip(self, query), fields(user_id = %query.user_id))]
    pub async fn list(
        &self,
        query: TransactionQuery,
    ) -> Result<Vec<TransactionDetails>, DomainError> {
        Ok(self.store.list_transactions(query).await?)
    }

    /// Fetches one of the caller's transactions.
    ///
    /// A transaction owned by someone else is reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn get(
        &self,
        id: TransactionId,
        user_id: UserId,
    ) -> Result<TransactionDetails, DomainError> {
        self.store
            .get_transaction(id, user_id)
            .await?
            .ok_or(DomainError::TransactionNotFound(id))
    }
}
