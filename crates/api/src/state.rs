//! Shared application state.

use domain::{CheckoutService, ProductLedger, TransactionService};
use store::Store;

/// Shared application state accessible from all handlers.
///
/// Every service holds its own handle to the same store.
pub struct AppState<S: Store> {
    pub checkout: CheckoutService<S>,
    pub transactions: TransactionService<S>,
    pub products: ProductLedger<S>,
}

impl<S: Store + Clone> AppState<S> {
    /// Wires the services over one store.
    pub fn new(store: S) -> Self {
        Self {
            checkout: CheckoutService::new(store.clone()),
            transactions: TransactionService::new(store.clone()),
            products: ProductLedger::new(store),
        }
    }

    /// The store shared by the services.
    pub fn store(&self) -> &S {
        self.checkout.store()
    }
}
