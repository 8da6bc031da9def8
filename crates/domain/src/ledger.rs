//! Product ledger: stock reads and conditional decrements.

use common::ProductId;
use store::{Page, Product, ProductQuery, Store, UnitOfWork};

use crate::{DomainError, checkout::CheckoutError};

/// Catalog reads outside of a checkout.
#[derive(Clone)]
pub struct ProductLedger<S: Store> {
    store: S,
}

impl<S: Store> ProductLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reads a product's current state.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: ProductId) -> Result<Product, DomainError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(DomainError::ProductNotFound(id))
    }

    /// Browses the catalog.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, query: ProductQuery) -> Result<Page<Product>, DomainError> {
        Ok(self.store.list_products(query).await?)
    }
}

/// Removes `quantity` units of a product from stock within a unit of work.
///
/// Returns the product as it stands after the decrement. The decrement is
/// conditioned on stock at write time, so a concurrent checkout that got
/// there first surfaces as [`CheckoutError::StockConflict`] rather than
/// an oversell.
pub async fn take_stock<U: UnitOfWork>(
    uow: &mut U,
    product_id: ProductId,
    quantity: u32,
) -> Result<Product, DomainError> {
    let product = uow
        .find_product(product_id)
        .await?
        .ok_or(CheckoutError::ProductNotFound(product_id))?;

    if i64::from(product.stock) < i64::from(quantity) {
        return Err(CheckoutError::InsufficientStock {
            product_id,
            product_name: product.name,
            requested: quantity,
            available: product.stock,
        }
        .into());
    }

    let updated = uow
        .decrement_stock(product_id, quantity)
        .await?
        .ok_or(CheckoutError::StockConflict { product_id })?;

    tracing::debug!(
        product_id = %product_id,
        quantity,
        remaining = updated.stock,
        "Stock decremented"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use common::{CategoryId, Money, StoreId};
    use store::{InMemoryStore, NewProduct};

    use super::*;

    async fn store_with_product(stock: i32) -> (InMemoryStore, Product) {
        let store = InMemoryStore::new();
        let product = store
            .create_product(NewProduct::new(
                "Sambal Bawang",
                Money::from_minor(25_000),
                stock,
                StoreId::new(1),
                CategoryId::new(1),
            ))
            .await
            .unwrap();
        (store, product)
    }

    #[tokio::test]
    async fn test_take_stock_decrements() {
        let (store, product) = store_with_product(5).await;

        let mut uow = store.begin().await.unwrap();
        let updated = take_stock(&mut uow, product.id, 2).await.unwrap();
        assert_eq!(updated.stock, 3);
        uow.commit().await.unwrap();

        let read = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(read.stock, 3);
    }

    #[tokio::test]
    async fn test_take_stock_reports_shortage_with_product_name() {
        let (store, product) = store_with_product(1).await;

        let mut uow = store.begin().await.unwrap();
        let err = take_stock(&mut uow, product.id, 2).await.unwrap_err();
        match err {
            DomainError::Checkout(CheckoutError::InsufficientStock {
                product_name,
                requested,
                available,
                ..
            }) => {
                assert_eq!(product_name, "Sambal Bawang");
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_take_stock_missing_product() {
        let store = InMemoryStore::new();

        let mut uow = store.begin().await.unwrap();
        let err = take_stock(&mut uow, ProductId::new(42), 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Checkout(CheckoutError::ProductNotFound(id)) if id == ProductId::new(42)
        ));
    }

    #[tokio::test]
    async fn test_ledger_get_missing_product() {
        let ledger = ProductLedger::new(InMemoryStore::new());

        let err = ledger.get(ProductId::new(9)).await.unwrap_err();
        assert!(matches!(err, DomainError::ProductNotFound(id) if id == ProductId::new(9)));
    }

    #[tokio::test]
    async fn test_ledger_lists_catalog() {
        let (store, product) = store_with_product(3).await;
        let ledger = ProductLedger::new(store);

        let page = ledger.list(ProductQuery::new()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, product.id);
        assert_eq!(ledger.get(product.id).await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_take_stock_can_drain_to_zero() {
        let (store, product) = store_with_product(2).await;

        let mut uow = store.begin().await.unwrap();
        let updated = take_stock(&mut uow, product.id, 2).await.unwrap();
        assert_eq!(updated.stock, 0);
    }
}
