use common::{AddressId, ProductId, UserId};
use store::MAX_PAYMENT_METHOD_LEN;

use super::CheckoutError;

/// One requested product and quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutItem {
    pub product_id: ProductId,
    /// Signed so that non-positive input can be reported rather than
    /// rejected at parse time.
    pub quantity: i64,
}

impl CheckoutItem {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Command to purchase a basket of products.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub payment_method: String,
    pub items: Vec<CheckoutItem>,
}

impl Checkout {
    /// Creates a new Checkout command.
    pub fn new(
        user_id: UserId,
        address_id: AddressId,
        payment_method: impl Into<String>,
        items: Vec<CheckoutItem>,
    ) -> Self {
        Self {
            user_id,
            address_id,
            payment_method: payment_method.into(),
            items,
        }
    }

    /// Checks the command before anything is read or written.
    ///
    /// Returns the trimmed payment method and the items with their
    /// quantities narrowed to `u32`, in request order.
    pub(crate) fn validate(&self) -> Result<(String, Vec<(ProductId, u32)>), CheckoutError> {
        if self.items.is_empty() {
            return Err(CheckoutError::NoItems);
        }

        let payment_method = self.payment_method.trim();
        if payment_method.is_empty() {
            return Err(CheckoutError::PaymentMethodRequired);
        }
        if payment_method.chars().count() > MAX_PAYMENT_METHOD_LEN {
            return Err(CheckoutError::PaymentMethodTooLong {
                max: MAX_PAYMENT_METHOD_LEN,
            });
        }

        let items = self
            .items
            .iter()
            .map(|item| {
                if item.quantity <= 0 {
                    return Err(CheckoutError::InvalidQuantity {
                        product_id: item.product_id,
                        quantity: item.quantity,
                    });
                }
                let quantity =
                    u32::try_from(item.quantity).map_err(|_| CheckoutError::PriceOverflow {
                        product_id: item.product_id,
                    })?;
                Ok((item.product_id, quantity))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((payment_method.to_string(), items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(payment_method: &str, items: Vec<CheckoutItem>) -> Checkout {
        Checkout::new(UserId::new(1), AddressId::new(1), payment_method, items)
    }

    #[test]
    fn test_validate_accepts_well_formed_command() {
        let cmd = command(
            "  COD ",
            vec![
                CheckoutItem::new(ProductId::new(1), 2),
                CheckoutItem::new(ProductId::new(2), 1),
            ],
        );

        let (method, items) = cmd.validate().unwrap();
        assert_eq!(method, "COD");
        assert_eq!(items, vec![(ProductId::new(1), 2), (ProductId::new(2), 1)]);
    }

    #[test]
    fn test_validate_rejects_empty_items() {
        let cmd = command("COD", vec![]);
        assert!(matches!(cmd.validate(), Err(CheckoutError::NoItems)));
    }

    #[test]
    fn test_validate_rejects_non_positive_quantity() {
        for quantity in [0, -3] {
            let cmd = command("COD", vec![CheckoutItem::new(ProductId::new(7), quantity)]);
            assert!(matches!(
                cmd.validate(),
                Err(CheckoutError::InvalidQuantity { quantity: q, .. }) if q == quantity
            ));
        }
    }

    #[test]
    fn test_validate_rejects_blank_payment_method() {
        let cmd = command("   ", vec![CheckoutItem::new(ProductId::new(1), 1)]);
        assert!(matches!(
            cmd.validate(),
            Err(CheckoutError::PaymentMethodRequired)
        ));
    }

    #[test]
    fn test_validate_rejects_overlong_payment_method() {
        let items = vec![CheckoutItem::new(ProductId::new(1), 1)];

        let cmd = command(&"x".repeat(MAX_PAYMENT_METHOD_LEN), items.clone());
        assert!(cmd.validate().is_ok());

        let cmd = command(&"x".repeat(MAX_PAYMENT_METHOD_LEN + 1), items);
        assert!(matches!(
            cmd.validate(),
            Err(CheckoutError::PaymentMethodTooLong { max: MAX_PAYMENT_METHOD_LEN })
        ));
    }

    #[test]
    fn test_validate_rejects_quantity_beyond_u32() {
        let cmd = command(
            "COD",
            vec![CheckoutItem::new(ProductId::new(1), i64::from(u32::MAX) + 1)],
        );
        assert!(matches!(
            cmd.validate(),
            Err(CheckoutError::PriceOverflow { .. })
        ));
    }

    #[test]
    fn test_duplicate_products_are_kept_in_order() {
        let cmd = command(
            "COD",
            vec![
                CheckoutItem::new(ProductId::new(3), 1),
                CheckoutItem::new(ProductId::new(3), 2),
            ],
        );

        let (_, items) = cmd.validate().unwrap();
        assert_eq!(items, vec![(ProductId::new(3), 1), (ProductId::new(3), 2)]);
    }
}
