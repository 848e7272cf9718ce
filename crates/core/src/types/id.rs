//! Newtype IDs for type-safe document references.
//!
//! Documents in the hosted store are addressed by opaque string keys. Use the
//! `define_id!` macro to create wrappers that prevent accidentally mixing keys
//! from different collections.

/// Macro to define a type-safe document ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`, `Default`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use subasa_core::define_id;
/// define_id!(WarehouseId);
/// define_id!(ShipmentId);
///
/// let warehouse = WarehouseId::new("hcm-01");
/// let shipment = ShipmentId::new("hcm-01");
///
/// // These are different types, so this won't compile:
/// // let _: WarehouseId = shipment;
/// assert_eq!(warehouse.as_str(), shipment.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Default,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Keys of documents in `products/{id}`, `users/{id}` and `orders/{id}`.
define_id!(ProductId);
define_id!(UserId);
define_id!(DocumentId);

// Business order number (`<baseOrderId>-<sellerEmail>`), distinct from the
// store-assigned document key.
define_id!(OrderId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrips_through_json_as_plain_string() {
        let id = ProductId::new("1NQabc");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"1NQabc\"");
    }

    #[test]
    fn test_id_display() {
        let id = UserId::from("uid-42");
        assert_eq!(id.to_string(), "uid-42");
    }

    #[test]
    fn test_ids_compare_by_value() {
        assert_eq!(OrderId::new("ORDER1"), OrderId::from("ORDER1".to_string()));
        assert_ne!(OrderId::new("ORDER1"), OrderId::new("ORDER2"));
    }
}
