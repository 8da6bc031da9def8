//! Checkout: turning a basket into a persisted transaction.

mod command;
mod invoice;
mod service;

pub use command::{Checkout, CheckoutItem};
pub use invoice::{InvoiceCodeGenerator, RandomInvoiceCode};
pub use service::{CheckoutReceipt, CheckoutService};

use common::{AddressId, ProductId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The checkout has no items.
    #[error("Checkout has no items")]
    NoItems,

    /// An item asks for a non-positive quantity.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// No payment method was given.
    #[error("Payment method is required")]
    PaymentMethodRequired,

    /// The payment method is longer than the store can hold.
    #[error("Payment method is too long (at most {max} characters)")]
    PaymentMethodTooLong { max: usize },

    /// A line or transaction total does not fit the money type.
    #[error("Price overflow while pricing product {product_id}")]
    PriceOverflow { product_id: ProductId },

    /// The delivery address doesn't exist or belongs to another user.
    #[error("Address not found: {0}")]
    AddressNotFound(AddressId),

    /// The product doesn't exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product has fewer units than requested.
    #[error(
        "Insufficient stock for product {product_name}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: i32,
    },

    /// Stock changed between the read and the conditional decrement.
    #[error("Stock for product {product_id} changed concurrently")]
    StockConflict { product_id: ProductId },
}

impl CheckoutError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::NoItems
            | CheckoutError::InvalidQuantity { .. }
            | CheckoutError::PaymentMethodRequired
            | CheckoutError::PaymentMethodTooLong { .. }
            | CheckoutError::PriceOverflow { .. } => ErrorKind::Validation,
            CheckoutError::AddressNotFound(_) | CheckoutError::ProductNotFound(_) => {
                ErrorKind::NotFound
            }
            CheckoutError::InsufficientStock { .. } | CheckoutError::StockConflict { .. } => {
                ErrorKind::Conflict
            }
        }
    }
}
