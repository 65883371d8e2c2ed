//! Newtype IDs for type-safe entity references.
//!
//! Users carry numeric IDs created with the `define_id!` macro. Products carry
//! an opaque string ID that, in practice, is a decimal sequence number.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe numeric ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
///
/// # Example
///
/// ```rust
/// # use stockroom_core::define_id;
/// define_id!(AccountId);
/// define_id!(OrderId);
///
/// let account_id = AccountId::new(1);
/// let order_id = OrderId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: AccountId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);

impl UserId {
    /// Sentinel for a user record that has not been given an ID yet.
    pub const UNASSIGNED: Self = Self(-1);

    /// Whether this ID was assigned by the store (non-negative).
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.0 >= 0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

/// Opaque product identifier.
///
/// The store assigns these as decimal sequence numbers (`"1"`, `"2"`, ...),
/// but callers must treat them as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Wrap an existing identifier without validation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the identifier for a given sequence number.
    #[must_use]
    pub fn from_sequence(seq: u64) -> Self {
        Self(seq.to_string())
    }

    /// Interpret the identifier as a positive sequence number.
    ///
    /// Returns `None` for empty, non-numeric, zero or negative identifiers.
    #[must_use]
    pub fn as_sequence(&self) -> Option<u64> {
        match self.0.trim().parse::<u64>() {
            Ok(0) | Err(_) => None,
            Ok(seq) => Some(seq),
        }
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_sentinel() {
        assert!(!UserId::UNASSIGNED.is_assigned());
        assert!(!UserId::default().is_assigned());
        assert!(UserId::new(0).is_assigned());
        assert!(UserId::new(7).is_assigned());
    }

    #[test]
    fn test_user_id_serializes_as_number() {
        let json = serde_json::to_string(&UserId::new(3)).unwrap_or_default();
        assert_eq!(json, "3");
    }

    #[test]
    fn test_product_id_sequence() {
        assert_eq!(ProductId::from_sequence(12).as_str(), "12");
        assert_eq!(ProductId::from("12").as_sequence(), Some(12));
        assert_eq!(ProductId::from(" 4 ").as_sequence(), Some(4));
    }

    #[test]
    fn test_product_id_rejects_non_positive() {
        assert_eq!(ProductId::from("0").as_sequence(), None);
        assert_eq!(ProductId::from("").as_sequence(), None);
        assert_eq!(ProductId::from("-3").as_sequence(), None);
        assert_eq!(ProductId::from("abc").as_sequence(), None);
    }

    #[test]
    fn test_product_id_blank() {
        assert!(ProductId::from("   ").is_blank());
        assert!(!ProductId::from("1").is_blank());
    }
}
