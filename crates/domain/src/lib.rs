//! Domain layer for the marketplace checkout.
//!
//! This crate provides:
//! - The product ledger (catalog reads and conditional stock decrements)
//! - The product snapshot recorder
//! - The checkout engine and invoice code generation
//! - The transaction read service
//! - The error taxonomy shared by the HTTP layer

pub mod checkout;
pub mod error;
pub mod ledger;
pub mod snapshot;
pub mod transactions;

pub use checkout::{
    Checkout, CheckoutError, CheckoutItem, CheckoutReceipt, CheckoutService,
    InvoiceCodeGenerator, RandomInvoiceCode,
};
pub use error::{DomainError, ErrorKind};
pub use ledger::ProductLedger;
pub use transactions::TransactionService;
