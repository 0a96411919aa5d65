//! Identifier newtypes
//!
//! Server-assigned identifiers are opaque strings; locally-assigned ones are
//! UUIDs rendered as strings so both round-trip through persistence unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier value.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier.
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
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Account identifier issued by the remote authority.
    FullAccountId
);

string_id!(
    /// Keyset identifier issued by the remote authority.
    ///
    /// Two keysets are the same wallet generation iff their server ids match.
    F8eKeysetId
);

string_id!(
    /// Locally-assigned identifier for keysets, key bundles and keyboxes.
    LocalId
);

impl LocalId {
    /// Generate a fresh random local identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_transparently() {
        let id = FullAccountId::new("urn:account:1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"urn:account:1\"");
        assert_eq!(serde_json::from_str::<FullAccountId>(&json).unwrap(), id);
    }

    #[test]
    fn generated_local_ids_are_unique() {
        assert_ne!(LocalId::generate(), LocalId::generate());
    }
}
