//! Identifier newtypes.
//!
//! All identifiers are opaque strings. They are ordered so that result sets
//! can be kept in deterministic order.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a persisted `Query`.
    QueryId
);
string_id!(
    /// Identifier of the record type a query filters over.
    MetaTypeId
);
string_id!(
    /// Identifier of a `QueryPath`.
    PathId
);
string_id!(
    /// Identifier of a candidate value in a `QueryValue`.
    ValueId
);
string_id!(
    /// Identifier of a stored record.
    RecordId
);
