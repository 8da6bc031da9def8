use common::{CategoryId, Money, StoreId, UserId};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// Normalized page/limit pair.
///
/// Pages are 1-based; out-of-range values fall back to the defaults
/// rather than producing negative offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    /// Normalizes a requested page and limit.
    ///
    /// A missing or zero page becomes 1, a missing or zero limit becomes
    /// [`DEFAULT_LIMIT`], and limits above [`MAX_LIMIT`] are clamped.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit
            .filter(|l| *l >= 1)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        Self { page, limit }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of records to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Builder for listing a user's transactions.
#[derive(Debug, Clone)]
pub struct TransactionQuery {
    /// Owner of the transactions; always applied.
    pub user_id: UserId,

    /// Filter by exact payment method.
    pub payment_method: Option<String>,

    /// Filter by invoice code substring.
    pub invoice_contains: Option<String>,

    pub pagination: Pagination,
}

impl TransactionQuery {
    /// Creates a query for all transactions owned by a user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            payment_method: None,
            invoice_contains: None,
            pagination: Pagination::default(),
        }
    }

    /// Filters by payment method.
    pub fn payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }

    /// Filters by a fragment of the invoice code.
    pub fn invoice_contains(mut self, fragment: impl Into<String>) -> Self {
        self.invoice_contains = Some(fragment.into());
        self
    }

    /// Selects a page of results.
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}

/// Builder for browsing the product catalog.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Filter by case-insensitive name substring.
    pub name_contains: Option<String>,

    /// Filter by category.
    pub category_id: Option<CategoryId>,

    /// Filter by owning store.
    pub store_id: Option<StoreId>,

    /// Filter by minimum consumer price (inclusive).
    pub min_price: Option<Money>,

    /// Filter by maximum consumer price (inclusive).
    pub max_price: Option<Money>,

    pub pagination: Pagination,
}

impl ProductQuery {
    /// Creates a query matching every product.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    pub fn category_id(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn store_id(mut self, store_id: StoreId) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn min_price(mut self, price: Money) -> Self {
        self.min_price = Some(price);
        self
    }

    pub fn max_price(mut self, price: Money) -> Self {
        self.max_price = Some(price);
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }
}
