use async_trait::async_trait;
use common::{AddressId, ProductId, SnapshotId, TransactionId, UserId};

use crate::{
    Address, LineItem, NewAddress, NewLineItem, NewProduct, NewSnapshot, NewTransaction, Page,
    Product, ProductQuery, ProductSnapshot, ProductUpdate, Result, Transaction,
    TransactionDetails, TransactionQuery,
};

/// Core trait for storage implementations.
///
/// A store is handed to services explicitly; there is no process-wide
/// handle. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// Atomic unit of work produced by [`Store::begin`].
    type UnitOfWork: UnitOfWork;

    /// Opens a unit of work.
    ///
    /// Every write made through the returned unit of work becomes visible
    /// together on [`UnitOfWork::commit`], or not at all.
    async fn begin(&self) -> Result<Self::UnitOfWork>;

    /// Reads the current catalog state of a product.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products matching a query, one page at a time.
    async fn list_products(&self, query: ProductQuery) -> Result<Page<Product>>;

    /// Adds a product to the catalog.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Replaces the editable fields of a product.
    ///
    /// Returns None if the product doesn't exist.
    async fn update_product(&self, id: ProductId, update: ProductUpdate)
    -> Result<Option<Product>>;

    /// Adds an entry to a user's address book.
    async fn create_address(&self, address: NewAddress) -> Result<Address>;

    /// Lists a user's transactions, newest first.
    async fn list_transactions(&self, query: TransactionQuery) -> Result<Vec<TransactionDetails>>;

    /// Reads a transaction owned by the given user.
    ///
    /// Returns None if it doesn't exist or belongs to someone else.
    async fn get_transaction(
        &self,
        id: TransactionId,
        user_id: UserId,
    ) -> Result<Option<TransactionDetails>>;

    /// Reads a historical product snapshot.
    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<ProductSnapshot>>;

    /// Checks that the backing storage is reachable.
    async fn ping(&self) -> Result<()>;

    /// Short name of the backend, for health reports.
    fn backend(&self) -> &'static str;
}

/// One atomic, serializable unit of work.
///
/// Dropping a unit of work without committing discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Reads an address owned by the given user.
    async fn find_address(&mut self, id: AddressId, user_id: UserId) -> Result<Option<Address>>;

    /// Locks a set of products against concurrent writers until the unit of
    /// work ends.
    ///
    /// Rows are locked in ascending id order whatever the order of `ids`,
    /// so two units of work locking overlapping sets cannot deadlock.
    /// Missing ids are skipped.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<()>;

    /// Reads a product, holding it against concurrent writers until the
    /// unit of work ends.
    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Decrements stock if at least `quantity` units remain.
    ///
    /// The check and the write happen in a single step. Returns the updated
    /// product, or None if the product is missing or short of stock.
    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<Option<Product>>;

    /// Appends a product snapshot.
    async fn insert_snapshot(&mut self, snapshot: NewSnapshot) -> Result<ProductSnapshot>;

    /// Appends a transaction header.
    async fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction>;

    /// Appends a line item to a transaction created in this unit of work.
    async fn insert_line_item(&mut self, item: NewLineItem) -> Result<LineItem>;

    /// Makes every write visible.
    async fn commit(self) -> Result<()>;

    /// Discards every write.
    async fn rollback(self) -> Result<()>;
}
