//! Checkout service: the all-or-nothing purchase workflow.

use std::time::Instant;

use common::{Money, ProductId, SnapshotId, StoreId};
use store::{LineItem, NewLineItem, NewTransaction, Store, Transaction, UnitOfWork};

use super::{Checkout, CheckoutError, InvoiceCodeGenerator, RandomInvoiceCode};
use crate::{DomainError, ledger, snapshot};

/// A persisted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub transaction: Transaction,
    pub line_items: Vec<LineItem>,
}

impl CheckoutReceipt {
    /// Sum of the line totals.
    pub fn line_total_sum(&self) -> Option<Money> {
        self.line_items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.line_total))
    }
}

/// A line item waiting for its transaction id.
struct PendingLine {
    snapshot_id: SnapshotId,
    store_id: StoreId,
    quantity: u32,
    line_total: Money,
}

/// Service that turns a [`Checkout`] command into a transaction.
///
/// Every stock decrement, snapshot, header and line item of one checkout is
/// written through a single unit of work. Any failure rolls the whole unit
/// back, so a failed checkout leaves the store exactly as it found it.
#[derive(Clone)]
pub struct CheckoutService<S: Store, G: InvoiceCodeGenerator = RandomInvoiceCode> {
    store: S,
    invoices: G,
}

impl<S: Store> CheckoutService<S> {
    /// Creates a checkout service issuing random invoice codes.
    pub fn new(store: S) -> Self {
        Self::with_invoice_codes(store, RandomInvoiceCode)
    }
}

impl<S: Store, G: InvoiceCodeGenerator> CheckoutService<S, G> {
    /// Creates a checkout service with a custom invoice code source.
    pub fn with_invoice_codes(store: S, invoices: G) -> Self {
        Self { store, invoices }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Purchases every item of the command or nothing at all.
    #[tracing::instrument(
        skip(self, cmd),
        fields(user_id = %cmd.user_id, address_id = %cmd.address_id, items = cmd.items.len())
    )]
    pub async fn checkout(&self, cmd: Checkout) -> Result<CheckoutReceipt, DomainError> {
        let started = Instant::now();
        let result = self.run(cmd).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.kind().as_str(),
        };
        metrics::counter!("checkouts_total", "outcome" => outcome).increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(receipt) => tracing::info!(
                transaction_id = %receipt.transaction.id,
                invoice_code = %receipt.transaction.invoice_code,
                total_price = %receipt.transaction.total_price,
                "Checkout completed"
            ),
            Err(err) => tracing::info!(error = %err, outcome, "Checkout rejected"),
        }

        result
    }

    async fn run(&self, cmd: Checkout) -> Result<CheckoutReceipt, DomainError> {
        let (payment_method, items) = cmd.validate()?;

        let mut uow = self.store.begin().await?;
        match self.apply(&mut uow, &cmd, payment_method, &items).await {
            Ok(receipt) => {
                uow.commit().await?;
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!(error = %rollback_err, "Failed to roll back checkout");
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        uow: &mut S::UnitOfWork,
        cmd: &Checkout,
        payment_method: String,
        items: &[(ProductId, u32)],
    ) -> Result<CheckoutReceipt, DomainError> {
        uow.find_address(cmd.address_id, cmd.user_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound(cmd.address_id))?;

        let product_ids: Vec<ProductId> = items.iter().map(|(id, _)| *id).collect();
        uow.lock_products(&product_ids).await?;

        let mut total_price = Money::zero();
        let mut pending = Vec::with_capacity(items.len());

        for &(product_id, quantity) in items {
            let product = ledger::take_stock(uow, product_id, quantity).await?;
            let snapshot = snapshot::record(uow, &product).await?;

            let line_total = product
                .consumer_price
                .checked_mul(quantity)
                .ok_or(CheckoutError::PriceOverflow { product_id })?;
            total_price = total_price
                .checked_add(line_total)
                .ok_or(CheckoutError::PriceOverflow { product_id })?;

            pending.push(PendingLine {
                snapshot_id: snapshot.id,
                store_id: product.store_id,
                quantity,
                line_total,
            });
        }

        let transaction = uow
            .insert_transaction(NewTransaction {
                user_id: cmd.user_id,
                address_id: cmd.address_id,
                total_price,
                invoice_code: self.invoices.next_code(),
                payment_method,
            })
            .await?;

        let mut line_items = Vec::with_capacity(pending.len());
        for line in pending {
            let item = uow
                .insert_line_item(NewLineItem {
                    transaction_id: transaction.id,
                    snapshot_id: line.snapshot_id,
                    store_id: line.store_id,
                    quantity: line.quantity,
                    line_total: line.line_total,
                })
                .await?;
            line_items.push(item);
        }

        Ok(CheckoutReceipt {
            transaction,
            line_items,
        })
    }
}
