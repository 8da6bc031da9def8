use std::collections::HashMap;

use async_trait::async_trait;
use common::{
    AddressId, CategoryId, LineItemId, Money, ProductId, SnapshotId, StoreId, TransactionId,
    UserId,
};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use crate::{
    Address, LineItem, NewAddress, NewLineItem, NewProduct, NewSnapshot, NewTransaction, Page,
    Product, ProductQuery, ProductSnapshot, ProductUpdate, PurchasedItem, Result, StoreError,
    Transaction, TransactionDetails, TransactionQuery, slugify,
    store::{Store, UnitOfWork},
};

const PRODUCT_COLUMNS: &str = "id, name, slug, reseller_price, consumer_price, description, \
     store_id, category_id, stock, created_at, updated_at";

const ADDRESS_COLUMNS: &str = "id, user_id, label, recipient, phone, detail";

const TRANSACTION_COLUMNS: &str =
    "id, user_id, address_id, total_price, invoice_code, payment_method, created_at";

// Snapshot and line item columns are aliased so both fit in one joined row.
const SNAPSHOT_COLUMNS: &str = "s.id AS snap_id, s.product_id AS snap_product_id, \
     s.name AS snap_name, s.slug AS snap_slug, s.reseller_price AS snap_reseller_price, \
     s.consumer_price AS snap_consumer_price, s.description AS snap_description, \
     s.store_id AS snap_store_id, s.category_id AS snap_category_id, \
     s.created_at AS snap_created_at";

const LINE_ITEM_COLUMNS: &str = "li.id AS item_id, li.transaction_id AS item_transaction_id, \
     li.snapshot_id AS item_snapshot_id, li.store_id AS item_store_id, \
     li.quantity AS item_quantity, li.line_total AS item_line_total";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool of at most `max_connections` to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::debug!(max_connections, "PostgreSQL pool connected");
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    /// Attaches line items and snapshots to transaction headers.
    async fn load_details(&self, transactions: Vec<Transaction>) -> Result<Vec<TransactionDetails>> {
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = transactions.iter().map(|t| t.id.as_i64()).collect();
        let sql = format!(
            "SELECT {LINE_ITEM_COLUMNS}, {SNAPSHOT_COLUMNS} \
             FROM transaction_line_items li \
             JOIN product_snapshots s ON s.id = li.snapshot_id \
             WHERE li.transaction_id = ANY($1) \
             ORDER BY li.id ASC"
        );
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&self.pool).await?;

        let mut grouped: HashMap<TransactionId, Vec<PurchasedItem>> = HashMap::new();
        for row in rows {
            let item = PurchasedItem {
                line_item: row_to_line_item(&row)?,
                snapshot: row_to_snapshot(&row)?,
            };
            grouped
                .entry(item.line_item.transaction_id)
                .or_default()
                .push(item);
        }

        Ok(transactions
            .into_iter()
            .map(|transaction| {
                let items = grouped.remove(&transaction.id).unwrap_or_default();
                TransactionDetails { transaction, items }
            })
            .collect())
    }
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        reseller_price: Money::from_minor(row.try_get("reseller_price")?),
        consumer_price: Money::from_minor(row.try_get("consumer_price")?),
        description: row.try_get("description")?,
        store_id: StoreId::new(row.try_get("store_id")?),
        category_id: CategoryId::new(row.try_get("category_id")?),
        stock: row.try_get("stock")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_address(row: &PgRow) -> Result<Address> {
    Ok(Address {
        id: AddressId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        label: row.try_get("label")?,
        recipient: row.try_get("recipient")?,
        phone: row.try_get("phone")?,
        detail: row.try_get("detail")?,
    })
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction> {
    Ok(Transaction {
        id: TransactionId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        address_id: AddressId::new(row.try_get("address_id")?),
        total_price: Money::from_minor(row.try_get("total_price")?),
        invoice_code: row.try_get("invoice_code")?,
        payment_method: row.try_get("payment_method")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_snapshot(row: &PgRow) -> Result<ProductSnapshot> {
    Ok(ProductSnapshot {
        id: SnapshotId::new(row.try_get("snap_id")?),
        product_id: ProductId::new(row.try_get("snap_product_id")?),
        name: row.try_get("snap_name")?,
        slug: row.try_get("snap_slug")?,
        reseller_price: Money::from_minor(row.try_get("snap_reseller_price")?),
        consumer_price: Money::from_minor(row.try_get("snap_consumer_price")?),
        description: row.try_get("snap_description")?,
        store_id: StoreId::new(row.try_get("snap_store_id")?),
        category_id: CategoryId::new(row.try_get("snap_category_id")?),
        created_at: row.try_get("snap_created_at")?,
    })
}

fn row_to_line_item(row: &PgRow) -> Result<LineItem> {
    let quantity: i32 = row.try_get("item_quantity")?;
    let quantity = u32::try_from(quantity).map_err(|e| sqlx::Error::ColumnDecode {
        index: "item_quantity".to_string(),
        source: Box::new(e),
    })?;

    Ok(LineItem {
        id: LineItemId::new(row.try_get("item_id")?),
        transaction_id: TransactionId::new(row.try_get("item_transaction_id")?),
        snapshot_id: SnapshotId::new(row.try_get("item_snapshot_id")?),
        store_id: StoreId::new(row.try_get("item_store_id")?),
        quantity,
        line_total: Money::from_minor(row.try_get("item_line_total")?),
    })
}

/// Builds the WHERE clause for a product query.
///
/// Returns the clause and the number of placeholders it uses.
fn product_filter_sql(query: &ProductQuery) -> (String, usize) {
    let mut sql = String::from(" WHERE 1=1");
    let mut param_count = 0;

    if query.name_contains.is_some() {
        param_count += 1;
        sql.push_str(&format!(
            " AND strpos(lower(name), lower(${param_count})) > 0"
        ));
    }
    if query.category_id.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND category_id = ${param_count}"));
    }
    if query.store_id.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND store_id = ${param_count}"));
    }
    if query.min_price.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND consumer_price >= ${param_count}"));
    }
    if query.max_price.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND consumer_price <= ${param_count}"));
    }

    (sql, param_count)
}

/// Binds product query parameters in the order `product_filter_sql` numbers them.
fn bind_product_filters<'q>(
    mut sqlx_query: Query<'q, Postgres, PgArguments>,
    query: &ProductQuery,
) -> Query<'q, Postgres, PgArguments> {
    if let Some(ref name) = query.name_contains {
        sqlx_query = sqlx_query.bind(name.clone());
    }
    if let Some(category_id) = query.category_id {
        sqlx_query = sqlx_query.bind(category_id.as_i64());
    }
    if let Some(store_id) = query.store_id {
        sqlx_query = sqlx_query.bind(store_id.as_i64());
    }
    if let Some(min) = query.min_price {
        sqlx_query = sqlx_query.bind(min.minor());
    }
    if let Some(max) = query.max_price {
        sqlx_query = sqlx_query.bind(max.minor());
    }
    sqlx_query
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|e| StoreError::Database(sqlx::Error::Encode(Box::new(e))))
}

#[async_trait]
impl Store for PostgresStore {
    type UnitOfWork = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork { tx })
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Page<Product>> {
        let (filter_sql, param_count) = product_filter_sql(&query);
        let pagination = query.pagination;

        let count_sql = format!("SELECT COUNT(*) FROM products{filter_sql}");
        let total: i64 = bind_product_filters(sqlx::query(&count_sql), &query)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;

        let page_sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products{filter_sql} ORDER BY id ASC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let rows = bind_product_filters(sqlx::query(&page_sql), &query)
            .bind(i64::from(pagination.limit()))
            .bind(to_i64(pagination.offset())?)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(row_to_product)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            page: pagination.page(),
            limit: pagination.limit(),
            total: u64::try_from(total).unwrap_or_default(),
            items,
        })
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let sql = format!(
            r#"
            INSERT INTO products (name, slug, reseller_price, consumer_price, description, store_id, category_id, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&product.name)
            .bind(slugify(&product.name))
            .bind(product.reseller_price.minor())
            .bind(product.consumer_price.minor())
            .bind(&product.description)
            .bind(product.store_id.as_i64())
            .bind(product.category_id.as_i64())
            .bind(product.stock)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_write)?;

        row_to_product(&row)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>> {
        let sql = format!(
            r#"
            UPDATE products SET
                name = $2,
                slug = $3,
                reseller_price = $4,
                consumer_price = $5,
                description = $6,
                category_id = $7,
                stock = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(&update.name)
            .bind(slugify(&update.name))
            .bind(update.reseller_price.minor())
            .bind(update.consumer_price.minor())
            .bind(&update.description)
            .bind(update.category_id.as_i64())
            .bind(update.stock)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_write)?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn create_address(&self, address: NewAddress) -> Result<Address> {
        let sql = format!(
            r#"
            INSERT INTO addresses (user_id, label, recipient, phone, detail)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ADDRESS_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(address.user_id.as_i64())
            .bind(&address.label)
            .bind(&address.recipient)
            .bind(&address.phone)
            .bind(&address.detail)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from_write)?;

        row_to_address(&row)
    }

    async fn list_transactions(&self, query: TransactionQuery) -> Result<Vec<TransactionDetails>> {
        let mut sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE user_id = $1");
        let mut param_count = 1;

        if query.payment_method.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payment_method = ${param_count}"));
        }
        if query.invoice_contains.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND strpos(invoice_code, ${param_count}) > 0"));
        }
        sql.push_str(&format!(
            " ORDER BY id DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        ));

        let mut sqlx_query = sqlx::query(&sql).bind(query.user_id.as_i64());
        if let Some(method) = query.payment_method {
            sqlx_query = sqlx_query.bind(method);
        }
        if let Some(fragment) = query.invoice_contains {
            sqlx_query = sqlx_query.bind(fragment);
        }
        let rows = sqlx_query
            .bind(i64::from(query.pagination.limit()))
            .bind(to_i64(query.pagination.offset())?)
            .fetch_all(&self.pool)
            .await?;

        let transactions = rows
            .iter()
            .map(row_to_transaction)
            .collect::<Result<Vec<_>>>()?;

        self.load_details(transactions).await
    }

    async fn get_transaction(
        &self,
        id: TransactionId,
        user_id: UserId,
    ) -> Result<Option<TransactionDetails>> {
        let sql =
            format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 AND user_id = $2");
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(user_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let transaction = row_to_transaction(&row)?;
        Ok(self.load_details(vec![transaction]).await?.pop())
    }

    async fn get_snapshot(&self, id: SnapshotId) -> Result<Option<ProductSnapshot>> {
        let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM product_snapshots s WHERE s.id = $1");
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_snapshot).transpose()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Unit of work backed by a single PostgreSQL transaction.
///
/// Products are row-locked (`FOR UPDATE`) in ascending id order through
/// [`UnitOfWork::lock_products`], and stock is only decremented by a
/// conditional update, so two checkouts of the same product cannot both
/// take the last unit. A deadlock or serialization failure reported by
/// the database surfaces as [`StoreError::Contention`].
pub struct PgUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_address(&mut self, id: AddressId, user_id: UserId) -> Result<Option<Address>> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1 AND user_id = $2");
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(user_id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_address).transpose()
    }

    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<()> {
        let mut ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        ids.sort_unstable();
        ids.dedup();

        sqlx::query("SELECT id FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn find_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<Option<Product>> {
        let Ok(quantity) = i32::try_from(quantity) else {
            return Ok(None);
        };

        let sql = format!(
            r#"
            UPDATE products SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        );
        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(quantity)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(StoreError::from_write)?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn insert_snapshot(&mut self, snapshot: NewSnapshot) -> Result<ProductSnapshot> {
        let sql = format!(
            r#"
            INSERT INTO product_snapshots AS s
                (product_id, name, slug, reseller_price, consumer_price, description, store_id, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SNAPSHOT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(snapshot.product_id.as_i64())
            .bind(&snapshot.name)
            .bind(&snapshot.slug)
            .bind(snapshot.reseller_price.minor())
            .bind(snapshot.consumer_price.minor())
            .bind(&snapshot.description)
            .bind(snapshot.store_id.as_i64())
            .bind(snapshot.category_id.as_i64())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(StoreError::from_write)?;

        row_to_snapshot(&row)
    }

    async fn insert_transaction(&mut self, transaction: NewTransaction) -> Result<Transaction> {
        let sql = format!(
            r#"
            INSERT INTO transactions (user_id, address_id, total_price, invoice_code, payment_method)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(transaction.user_id.as_i64())
            .bind(transaction.address_id.as_i64())
            .bind(transaction.total_price.minor())
            .bind(&transaction.invoice_code)
            .bind(&transaction.payment_method)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(StoreError::from_write)?;

        row_to_transaction(&row)
    }

    async fn insert_line_item(&mut self, item: NewLineItem) -> Result<LineItem> {
        let quantity = i32::try_from(item.quantity)
            .map_err(|e| StoreError::Database(sqlx::Error::Encode(Box::new(e))))?;

        let sql = format!(
            r#"
            INSERT INTO transaction_line_items AS li
                (transaction_id, snapshot_id, store_id, quantity, line_total)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {LINE_ITEM_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(item.transaction_id.as_i64())
            .bind(item.snapshot_id.as_i64())
            .bind(item.store_id.as_i64())
            .bind(quantity)
            .bind(item.line_total.minor())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(StoreError::from_write)?;

        row_to_line_item(&row)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        tracing::debug!("unit of work rolled back");
        Ok(())
    }
}
