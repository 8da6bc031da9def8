//! Integration tests for the checkout engine.
//!
//! These tests drive the full checkout workflow against the in-memory store
//! and verify totals, stock accounting, atomicity and snapshot history.

use common::{AddressId, CategoryId, Money, ProductId, StoreId, UserId};
use domain::{
    Checkout, CheckoutError, CheckoutItem, CheckoutService, DomainError, ErrorKind,
    InvoiceCodeGenerator, TransactionService,
};
use store::{
    Address, InMemoryStore, NewAddress, NewProduct, Product, ProductUpdate, Store,
    TransactionQuery,
};

const BUYER: UserId = UserId::new(1);

/// Helper to create a checkout service over a fresh store
fn create_service() -> CheckoutService<InMemoryStore> {
    CheckoutService::new(InMemoryStore::new())
}

async fn seed_product(store: &InMemoryStore, name: &str, price: i64, stock: i32) -> Product {
    store
        .create_product(NewProduct::new(
            name,
            Money::from_minor(price),
            stock,
            StoreId::new(1),
            CategoryId::new(1),
        ))
        .await
        .unwrap()
}

async fn seed_address(store: &InMemoryStore, user_id: UserId) -> Address {
    store
        .create_address(NewAddress::new(user_id, "Rumah", "Jl. Merdeka 1"))
        .await
        .unwrap()
}

async fn stock_of(store: &InMemoryStore, id: ProductId) -> i32 {
    store.get_product(id).await.unwrap().unwrap().stock
}

fn checkout(address: &Address, items: Vec<CheckoutItem>) -> Checkout {
    Checkout::new(BUYER, address.id, "COD", items)
}

/// Always hands out the same invoice code.
struct FixedInvoiceCode(&'static str);

impl InvoiceCodeGenerator for FixedInvoiceCode {
    fn next_code(&self) -> String {
        self.0.to_string()
    }
}

mod successful_checkout {
    use super::*;

    #[tokio::test]
    async fn single_item_example() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Produk A", 10_000, 5).await;
        let address = seed_address(&store, BUYER).await;

        let receipt = service
            .checkout(checkout(
                &address,
                vec![CheckoutItem::new(product.id, 2)],
            ))
            .await
            .unwrap();

        assert_eq!(receipt.line_items.len(), 1);
        assert_eq!(receipt.line_items[0].line_total, Money::from_minor(20_000));
        assert_eq!(receipt.line_items[0].quantity, 2);
        assert_eq!(receipt.transaction.total_price, Money::from_minor(20_000));
        assert_eq!(receipt.transaction.payment_method, "COD");
        assert!(receipt.transaction.invoice_code.starts_with("INV-"));
        assert_eq!(stock_of(&store, product.id).await, 3);
    }

    #[tokio::test]
    async fn total_is_sum_of_line_totals_across_stores() {
        let service = create_service();
        let store = service.store().clone();
        let coffee = seed_product(&store, "Kopi", 30_000, 10).await;
        let tea = store
            .create_product(NewProduct::new(
                "Teh",
                Money::from_minor(7_500),
                10,
                StoreId::new(2),
                CategoryId::new(2),
            ))
            .await
            .unwrap();
        let address = seed_address(&store, BUYER).await;

        let receipt = service
            .checkout(checkout(
                &address,
                vec![
                    CheckoutItem::new(coffee.id, 3),
                    CheckoutItem::new(tea.id, 4),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(receipt.transaction.total_price, Money::from_minor(120_000));
        assert_eq!(receipt.line_total_sum(), Some(receipt.transaction.total_price));
        assert_eq!(receipt.line_items[0].store_id, StoreId::new(1));
        assert_eq!(receipt.line_items[1].store_id, StoreId::new(2));
        assert_eq!(stock_of(&store, coffee.id).await, 7);
        assert_eq!(stock_of(&store, tea.id).await, 6);
        assert_eq!(store.snapshot_count().await, 2);
    }

    #[tokio::test]
    async fn duplicate_product_entries_draw_from_same_stock() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Gula Aren", 15_000, 3).await;
        let address = seed_address(&store, BUYER).await;

        let receipt = service
            .checkout(checkout(
                &address,
                vec![
                    CheckoutItem::new(product.id, 1),
                    CheckoutItem::new(product.id, 2),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(receipt.line_items.len(), 2);
        assert_eq!(stock_of(&store, product.id).await, 0);
    }

    #[tokio::test]
    async fn round_trip_survives_price_change() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Madu Hutan", 80_000, 5).await;
        let address = seed_address(&store, BUYER).await;

        let receipt = service
            .checkout(checkout(
                &address,
                vec![CheckoutItem::new(product.id, 1)],
            ))
            .await
            .unwrap();

        let mut update = ProductUpdate::from(&product);
        update.name = "Madu Hutan Premium".to_string();
        update.consumer_price = Money::from_minor(120_000);
        store.update_product(product.id, update).await.unwrap();

        let details = TransactionService::new(store.clone())
            .get(receipt.transaction.id, BUYER)
            .await
            .unwrap();

        assert_eq!(details.transaction, receipt.transaction);
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].line_item, receipt.line_items[0]);
        assert_eq!(details.items[0].snapshot.name, "Madu Hutan");
        assert_eq!(
            details.items[0].snapshot.consumer_price,
            Money::from_minor(80_000)
        );
    }
}

mod atomicity {
    use super::*;

    #[tokio::test]
    async fn insufficient_stock_leaves_everything_unchanged() {
        let service = create_service();
        let store = service.store().clone();
        let plenty = seed_product(&store, "Beras", 12_000, 10).await;
        let scarce = seed_product(&store, "Kopi Luwak", 500_000, 1).await;
        let address = seed_address(&store, BUYER).await;

        let err = service
            .checkout(checkout(
                &address,
                vec![
                    CheckoutItem::new(plenty.id, 4),
                    CheckoutItem::new(scarce.id, 2),
                ],
            ))
            .await
            .unwrap_err();

        match &err {
            DomainError::Checkout(CheckoutError::InsufficientStock {
                product_id,
                product_name,
                ..
            }) => {
                assert_eq!(*product_id, scarce.id);
                assert_eq!(product_name, "Kopi Luwak");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(stock_of(&store, plenty.id).await, 10);
        assert_eq!(stock_of(&store, scarce.id).await, 1);
        assert_eq!(store.snapshot_count().await, 0);
        assert_eq!(store.transaction_count().await, 0);
        assert_eq!(store.line_item_count().await, 0);
    }

    #[tokio::test]
    async fn missing_product_leaves_everything_unchanged() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Tempe", 5_000, 10).await;
        let address = seed_address(&store, BUYER).await;

        let err = service
            .checkout(checkout(
                &address,
                vec![
                    CheckoutItem::new(product.id, 1),
                    CheckoutItem::new(ProductId::new(999), 1),
                ],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Checkout(CheckoutError::ProductNotFound(id)) if id == ProductId::new(999)
        ));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(stock_of(&store, product.id).await, 10);
        assert_eq!(store.snapshot_count().await, 0);
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn failed_commit_leaves_everything_unchanged() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Tahu", 4_000, 10).await;
        let address = seed_address(&store, BUYER).await;

        store.set_fail_on_commit(true).await;
        let err = service
            .checkout(checkout(
                &address,
                vec![CheckoutItem::new(product.id, 3)],
            ))
            .await
            .unwrap_err();
        store.set_fail_on_commit(false).await;

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(stock_of(&store, product.id).await, 10);
        assert_eq!(store.snapshot_count().await, 0);
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn duplicate_invoice_code_is_a_conflict() {
        let store = InMemoryStore::new();
        let service =
            CheckoutService::with_invoice_codes(store.clone(), FixedInvoiceCode("INV-FIXED"));
        let product = seed_product(&store, "Kerupuk", 2_000, 10).await;
        let address = seed_address(&store, BUYER).await;

        service
            .checkout(checkout(
                &address,
                vec![CheckoutItem::new(product.id, 1)],
            ))
            .await
            .unwrap();

        let err = service
            .checkout(checkout(
                &address,
                vec![CheckoutItem::new(product.id, 1)],
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(stock_of(&store, product.id).await, 9);
        assert_eq!(store.transaction_count().await, 1);
        assert_eq!(store.snapshot_count().await, 1);
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn empty_items_rejected_before_any_read() {
        let service = create_service();
        let store = service.store().clone();
        let address = seed_address(&store, BUYER).await;

        let err = service.checkout(checkout(&address, vec![])).await.unwrap_err();
        assert!(matches!(err, DomainError::Checkout(CheckoutError::NoItems)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn non_positive_quantity_rejected() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Bawang", 3_000, 10).await;
        let address = seed_address(&store, BUYER).await;

        let err = service
            .checkout(checkout(
                &address,
                vec![
                    CheckoutItem::new(product.id, 1),
                    CheckoutItem::new(product.id, 0),
                ],
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(stock_of(&store, product.id).await, 10);
    }

    #[tokio::test]
    async fn address_of_another_user_is_not_found() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Cabai", 6_000, 10).await;
        let foreign = seed_address(&store, UserId::new(2)).await;

        let err = service
            .checkout(checkout(
                &foreign,
                vec![CheckoutItem::new(product.id, 1)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Checkout(CheckoutError::AddressNotFound(id)) if id == foreign.id
        ));
        assert_eq!(stock_of(&store, product.id).await, 10);
    }

    #[tokio::test]
    async fn unknown_address_is_not_found() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Garam", 1_000, 10).await;

        let err = service
            .checkout(Checkout::new(
                BUYER,
                AddressId::new(77),
                "COD",
                vec![CheckoutItem::new(product.id, 1)],
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn price_overflow_rejected() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Emas", i64::MAX / 2, 10).await;
        let address = seed_address(&store, BUYER).await;

        let err = service
            .checkout(checkout(
                &address,
                vec![CheckoutItem::new(product.id, 3)],
            ))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Checkout(CheckoutError::PriceOverflow { .. })
        ));
        assert_eq!(stock_of(&store, product.id).await, 10);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_unit_sold_exactly_once() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Edisi Terbatas", 99_000, 1).await;
        let address = seed_address(&store, BUYER).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let service = service.clone();
            let cmd = checkout(&address, vec![CheckoutItem::new(product.id, 1)]);
            handles.push(tokio::spawn(async move { service.checkout(cmd).await }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert_eq!(err.kind(), ErrorKind::Conflict),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(stock_of(&store, product.id).await, 0);
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Durian", 50_000, 10).await;
        let address = seed_address(&store, BUYER).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let service = service.clone();
            let cmd = checkout(&address, vec![CheckoutItem::new(product.id, 1)]);
            handles.push(tokio::spawn(async move { service.checkout(cmd).await }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 10);
        assert_eq!(stock_of(&store, product.id).await, 0);
    }
}

mod reads {
    use super::*;

    #[tokio::test]
    async fn list_is_scoped_to_owner_and_newest_first() {
        let service = create_service();
        let store = service.store().clone();
        let product = seed_product(&store, "Kopi", 10_000, 10).await;
        let address = seed_address(&store, BUYER).await;

        let first = service
            .checkout(checkout(&address, vec![CheckoutItem::new(product.id, 1)]))
            .await
            .unwrap();
        let second = service
            .checkout(Checkout::new(
                BUYER,
                address.id,
                "TRANSFER",
                vec![CheckoutItem::new(product.id, 2)],
            ))
            .await
            .unwrap();

        let reads = TransactionService::new(store.clone());
        let all = reads.list(TransactionQuery::for_user(BUYER)).await.unwrap();
        let ids: Vec<_> = all.iter().map(|d| d.transaction.id).collect();
        assert_eq!(ids, vec![second.transaction.id, first.transaction.id]);

        let transfers = reads
            .list(TransactionQuery::for_user(BUYER).payment_method("TRANSFER"))
            .await
            .unwrap();
        assert_eq!(transfers.len(), 1);

        let stranger = reads
            .list(TransactionQuery::for_user(UserId::new(2)))
            .await
            .unwrap();
        assert!(stranger.is_empty());

        let err = reads
            .get(first.transaction.id, UserId::new(2))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::TransactionNotFound(_)));
    }
}
