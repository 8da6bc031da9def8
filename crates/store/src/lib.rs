//! Relational storage for the marketplace backend.
//!
//! The [`Store`] trait is the repository handed to services; a
//! [`UnitOfWork`] groups the writes of one checkout into a single atomic
//! commit. [`InMemoryStore`] backs tests and local runs, [`PostgresStore`]
//! backs production.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{ConstraintKind, Result, StoreError};
pub use memory::{InMemoryStore, InMemoryUnitOfWork};
pub use model::{
    Address, INVOICE_CODE_CONSTRAINT, LineItem, MAX_PAYMENT_METHOD_LEN, NewAddress, NewLineItem,
    NewProduct, NewSnapshot, NewTransaction, Page, Product, ProductSnapshot, ProductUpdate,
    PurchasedItem, STOCK_CONSTRAINT, Transaction, TransactionDetails, slugify,
};
pub use postgres::{PgUnitOfWork, PostgresStore};
pub use query::{DEFAULT_LIMIT, MAX_LIMIT, Pagination, ProductQuery, TransactionQuery};
pub use store::{Store, UnitOfWork};
