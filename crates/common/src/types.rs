use serde::{Deserialize, Serialize};

/// Declares a typed identifier backed by a database-assigned 64-bit key.
///
/// Each identifier is a distinct type so a product id can never be passed
/// where an address id is expected.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw key.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw key.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of an authenticated user.
    UserId
);
entity_id!(
    /// Identifier of a catalog product.
    ProductId
);
entity_id!(
    /// Identifier of a shop owning products.
    StoreId
);
entity_id!(
    /// Identifier of a product category.
    CategoryId
);
entity_id!(
    /// Identifier of an entry in a user's address book.
    AddressId
);
entity_id!(
    /// Identifier of a checkout transaction.
    TransactionId
);
entity_id!(
    /// Identifier of a historical product snapshot.
    SnapshotId
);
entity_id!(
    /// Identifier of a transaction line item.
    LineItemId
);
