//! Shared types for the marketplace backend.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{
    AddressId, CategoryId, LineItemId, ProductId, SnapshotId, StoreId, TransactionId, UserId,
};
