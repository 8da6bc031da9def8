use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{AddressId, LineItemId, ProductId, SnapshotId, TransactionId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Address, INVOICE_CODE_CONSTRAINT, LineItem, NewAddress, NewLineItem, NewProduct, NewSnapshot,
    NewTransaction, Page, Product, ProductQuery, ProductSnapshot, ProductUpdate, PurchasedItem,
    Result, STOCK_CONSTRAINT, StoreError, Transaction, TransactionDetails, TransactionQuery,
    slugify,
    store::{Store, UnitOfWork},
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    product: i64,
    address: i64,
    snapshot: i64,
    transaction: i64,
    line_item: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, Product>,
    addresses: BTreeMap<AddressId, Address>,
    snapshots: BTreeMap<SnapshotId, ProductSnapshot>,
    transactions: BTreeMap<TransactionId, Transaction>,
    line_items: Vec<LineItem>,
    sequences: Sequences,
    fail_on_commit: bool,
}

impl MemoryState {
    fn details(&self, transaction: &Transaction) -> TransactionDetails {
        let items = self
            .line_items
            .iter()
            .filter(|item| item.transaction_id == transaction.id)
            .filter_map(|item| {
                self.snapshots
                    .get(&item.snapshot_id)
                    .map(|snapshot| PurchasedItem {
                        line_item: item.clone(),
                        snapshot: snapshot.clone(),
                    })
            })
            .collect();
        TransactionDetails {
            transaction: transaction.clone(),
            items,
        }
    }
}

/// In-memory store implementation for testing and local runs.
///
/// A unit of work holds the whole store exclusively and writes to a staged
/// copy, so concurrent checkouts are serialized and a discarded unit of
/// work leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every subsequent commit to fail.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.state.lock().await.fail_on_commit = fail;
    }

    /// Returns the total number of snapshots stored.
    pub async fn snapshot_count(&self) -> usize {
        self.state.lock().await.snapshots.len()
    }

    /// Returns the total number of transactions stored, across all users.
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }

    /// Returns the total number of line items stored.
    pub async fn line_item_count(&self) -> usize {
        self.state.lock().await.line_items.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type UnitOfWork = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<InMemoryUnitOfWork> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryUnitOfWork { guard, staged })
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Page<Product>> {
        let state = self.state.lock().await;
        let name_fragment = query.name_contains.as_ref().map(|n| n.to_lowercase());

        let matching: Vec<&Product> = state
            .products
            .values()
            .filter(|p| {
                if let Some(ref fragment) = name_fragment
                    && !p.name.to_lowercase().contains(fragment.as_str())
                {
                    return false;
                }
                if let Some(category_id) = query.category_id
                    && p.category_id != category_id
                {
                    return false;
                }
                if let Some(store_id) = query.store_id
                    && p.store_id != store_id
                {
                    return false;
                }
                if let Some(min) = query.min_price
                    && p.consumer_price < min
                {
                    return false;
                }
                if let Some(max) = query.max_price
                    && p.consumer_price > max
                {
                    return false;
                }
                true
            })
            .collect();

        let pagination = query.pagination;
        let items = matching
            .iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(pagination.limit() as usize)
            .map(|p| (*p).clone())
            .collect();

        Ok(Page {
            page: pagination.page(),
            limit: pagination.limit(),
            total: matching.len() as u64,
            items,
        })
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        if product.stock < 0 {
            return Err(StoreError::check(STOCK_CONSTRAINT));
        }

        let mut state = self.state.lock().await;
        let now = Utc::now();
        let id = ProductId::new(next(&mut state.sequences.product));
        let created = Product {
            id,
            slug: slugify(&product.name),
            name: product.name,
            reseller_price: product.reseller_price,
            consumer_price: product.consumer_price,
            description: product.description,
            store_id: product.store_id,
            category_id: product.category_id,
            stock: product.stock,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(id, created.clone());
        Ok(created)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        if update.stock < 0 {
            return Err(StoreError::check(STOCK_CONSTRAINT));
        }

        let mut state = self.state.lock().await;
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(None);
        };
        product.slug = slugify(&update.name);
        product.name = update.name;
        product.reseller_price = update.reseller_price;
        product.consumer_price = update.consumer_price;
        product.description = update.description;
        product.category_id = update.category_id;
        product.stock = update.stock;
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn create_address(&self, address: NewAddress) -> Result<Address> {
        let mut state = self.state.lock().await;
        let id = AddressId::new(next(&mut state.sequences.address));
        let created = Address {
            id,
            user_id: address.user_id,
            label: address.label,
            recipient: address.recipient,
            phone: address.phone,
            detail: address.detail,
        };
        state.addresses.insert(id, created.clone());
        Ok(created)
    }

    async fn list_transactions(&self, query: TransactionQuery) -> Result<Vec<TransactionDetails>> {
        let state = self.state.lock().await;
        let pagination = query.pagination;

        let details = state
            .transactions
            .values()
            .rev()
            .filter(|t| {
                if t.user_id != query.user_id {
                    return false;
                }
                if let Some(ref method) = query.payment_method
                    && &t.payment_method != method
                {
                    return false;
                }
                if let Some(ref fragment) = query.invoice_contains
                    && !t.invoice_code.contains(fragment.as_str())
                {
                    return false;
                }
                true
            })
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(pagination.limit() as usize)
            .map(|t| state.details(t))
            .collect();

        Ok(details)
    }

    async fn get_transaction(
        &self,
        id: TransactionId,
        user_id: UserId,
    ) -> Result<Option<TransactionDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .map(|t| state.details(t)))
    }

    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<ProductSnapshot>> {
        Ok(self.state.lock().await.snapshots.get(&id).cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Unit of work over an [`InMemoryStore`].
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_address(&mut self, id: AddressId, user_id: UserId) -> Result<Option<Address>> {
        Ok(self
            .staged
            .addresses
            .get(&id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn lock_products(&mut self, _ids: &[ProductId]) -> Result<()> {
        // The unit of work already holds the whole store.
        Ok(())
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<Option<Product>> {
        let Some(product) = self.staged.products.get_mut(&id) else {
            return Ok(None);
        };
        let Ok(quantity) = i32::try_from(quantity) else {
            return Ok(None);
        };
        if product.stock < quantity {
            return Ok(None);
        }
        product.stock -= quantity;
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn insert_snapshot(&mut self, snapshot: NewSnapshot) -> Result<ProductSnapshot> {
        let id = SnapshotId::new(next(&mut self.staged.sequences.snapshot));
        let created = ProductSnapshot {
            id,
            product_id: snapshot.product_id,
            name: snapshot.name,
            slug: snapshot.slug,
            reseller_price: snapshot.reseller_price,
            consumer_price: snapshot.consumer_price,
            description: snapshot.description,
            store_id: snapshot.store_id,
            category_id: snapshot.category_id,
            created_at: Utc::now(),
        };
        self.staged.snapshots.insert(id, created.clone());
        Ok(created)
    }

    async fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction> {
        // Unique constraint simulation
        if self
            .staged
            .transactions
            .values()
            .any(|t| t.invoice_code == transaction.invoice_code)
        {
            return Err(StoreError::unique(INVOICE_CODE_CONSTRAINT));
        }

        let id = TransactionId::new(next(&mut self.staged.sequences.transaction));
        let created = Transaction {
            id,
            user_id: transaction.user_id,
            address_id: transaction.address_id,
            total_price: transaction.total_price,
            invoice_code: transaction.invoice_code,
            payment_method: transaction.payment_method,
            created_at: Utc::now(),
        };
        self.staged.transactions.insert(id, created.clone());
        Ok(created)
    }

    async fn insert_line_item(&mut self, item: NewLineItem) -> Result<LineItem> {
        if !self.staged.transactions.contains_key(&item.transaction_id) {
            return Err(StoreError::foreign_key(
                "transaction_line_items_transaction_id_fkey",
            ));
        }
        if !self.staged.snapshots.contains_key(&item.snapshot_id) {
            return Err(StoreError::foreign_key(
                "transaction_line_items_snapshot_id_fkey",
            ));
        }

        let created = LineItem {
            id: LineItemId::new(next(&mut self.staged.sequences.line_item)),
            transaction_id: item.transaction_id,
            snapshot_id: item.snapshot_id,
            store_id: item.store_id,
            quantity: item.quantity,
            line_total: item.line_total,
        };
        self.staged.line_items.push(created.clone());
        Ok(created)
    }

    async fn commit(self) -> Result<()> {
        let Self { mut guard, staged } = self;
        if staged.fail_on_commit {
            tracing::warn!("in-memory commit rejected by failure injection");
            return Err(StoreError::Backend("commit rejected".to_string()));
        }
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
