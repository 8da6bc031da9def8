//! Records persisted by the store.

use chrono::{DateTime, Utc};
use common::{
    AddressId, CategoryId, LineItemId, Money, ProductId, SnapshotId, StoreId, TransactionId,
    UserId,
};
use serde::{Deserialize, Serialize};

/// Constraint guarding invoice code uniqueness.
pub const INVOICE_CODE_CONSTRAINT: &str = "transactions_invoice_code_key";

/// Constraint keeping product stock non-negative.
pub const STOCK_CONSTRAINT: &str = "products_stock_non_negative";

/// Widest payment method the transactions table accepts, in characters.
pub const MAX_PAYMENT_METHOD_LEN: usize = 64;

/// Current catalog state of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub reseller_price: Money,
    pub consumer_price: Money,
    pub description: Option<String>,
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product about to be added to the catalog.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub reseller_price: Money,
    pub consumer_price: Money,
    pub description: Option<String>,
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub stock: i32,
}

impl NewProduct {
    /// Creates a product with the given name, consumer price and stock.
    ///
    /// The reseller price defaults to the consumer price.
    pub fn new(
        name: impl Into<String>,
        consumer_price: Money,
        stock: i32,
        store_id: StoreId,
        category_id: CategoryId,
    ) -> Self {
        Self {
            name: name.into(),
            reseller_price: consumer_price,
            consumer_price,
            description: None,
            store_id,
            category_id,
            stock,
        }
    }

    pub fn with_reseller_price(mut self, price: Money) -> Self {
        self.reseller_price = price;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A catalog edit replacing the editable fields of a product.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub name: String,
    pub reseller_price: Money,
    pub consumer_price: Money,
    pub description: Option<String>,
    pub category_id: CategoryId,
    pub stock: i32,
}

impl From<&Product> for ProductUpdate {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            reseller_price: product.reseller_price,
            consumer_price: product.consumer_price,
            description: product.description.clone(),
            category_id: product.category_id,
            stock: product.stock,
        }
    }
}

/// An entry in a user's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub label: String,
    pub recipient: String,
    pub phone: String,
    pub detail: String,
}

/// An address about to be added to a user's address book.
#[derive(Debug, Clone)]
pub struct NewAddress {
    pub user_id: UserId,
    pub label: String,
    pub recipient: String,
    pub phone: String,
    pub detail: String,
}

impl NewAddress {
    pub fn new(user_id: UserId, label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            user_id,
            label: label.into(),
            recipient: String::new(),
            phone: String::new(),
            detail: detail.into(),
        }
    }
}

/// Immutable copy of a product's attributes at the moment of purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: SnapshotId,
    /// Informational back-reference; never used for live lookups.
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub reseller_price: Money,
    pub consumer_price: Money,
    pub description: Option<String>,
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
}

/// Snapshot fields captured from a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub reseller_price: Money,
    pub consumer_price: Money,
    pub description: Option<String>,
    pub store_id: StoreId,
    pub category_id: CategoryId,
}

impl From<&Product> for NewSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            reseller_price: product.reseller_price,
            consumer_price: product.consumer_price,
            description: product.description.clone(),
            store_id: product.store_id,
            category_id: product.category_id,
        }
    }
}

/// Header of a checkout transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub address_id: AddressId,
    pub total_price: Money,
    pub invoice_code: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
}

/// A transaction header about to be persisted.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub total_price: Money,
    pub invoice_code: String,
    pub payment_method: String,
}

/// One product-quantity entry within a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub transaction_id: TransactionId,
    pub snapshot_id: SnapshotId,
    /// Denormalized from the product; one checkout may span several stores.
    pub store_id: StoreId,
    pub quantity: u32,
    pub line_total: Money,
}

/// A line item about to be persisted.
#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub transaction_id: TransactionId,
    pub snapshot_id: SnapshotId,
    pub store_id: StoreId,
    pub quantity: u32,
    pub line_total: Money,
}

/// A line item paired with the snapshot it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedItem {
    pub line_item: LineItem,
    pub snapshot: ProductSnapshot,
}

/// A transaction with its purchased items, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub transaction: Transaction,
    pub items: Vec<PurchasedItem>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub page: u32,
    pub limit: u32,
    /// Number of matching records across all pages.
    pub total: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Number of pages needed to hold `total` records.
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }
}

/// Derives a URL slug from a product name.
///
/// Lowercases ASCII alphanumerics and collapses every other run of
/// characters into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
