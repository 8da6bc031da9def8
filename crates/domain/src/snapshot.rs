//! Product snapshot recorder.
//!
//! Each purchased line references a copy of the product taken at the moment
//! of purchase. Snapshots are append-only; later catalog edits never reach
//! them.

use store::{NewSnapshot, Product, ProductSnapshot, UnitOfWork};

use crate::DomainError;

/// Records the current attributes of a product within a unit of work.
pub async fn record<U: UnitOfWork>(
    uow: &mut U,
    product: &Product,
) -> Result<ProductSnapshot, DomainError> {
    let snapshot = uow.insert_snapshot(NewSnapshot::from(product)).await?;

    tracing::debug!(
        product_id = %product.id,
        snapshot_id = %snapshot.id,
        "Product snapshot recorded"
    );

    Ok(snapshot)
}
