//! Public key material held by the three key-holders.
//!
//! Keys are opaque descriptor strings. Derivation happens elsewhere; this crate
//! only compares, stores and forwards them.

use crate::identifiers::LocalId;
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A descriptor public key, e.g. `[d34db33f/84'/0'/0']xpub6.../*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorPublicKey(String);

impl DescriptorPublicKey {
    /// Wrap a descriptor key string.
    pub fn new(dpub: impl Into<String>) -> Self {
        Self(dpub.into())
    }

    /// The raw descriptor string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Master fingerprint from the key origin, if the descriptor carries one.
    ///
    /// The origin is the bracketed prefix `[fingerprint/path...]`; the
    /// fingerprint is always eight hex characters.
    pub fn origin_fingerprint(&self) -> Option<&str> {
        let rest = self.0.strip_prefix('[')?;
        let end = rest.find(']')?;
        let origin = &rest[..end];
        let fingerprint = origin.split('/').next()?;
        let is_valid =
            fingerprint.len() == 8 && fingerprint.chars().all(|c| c.is_ascii_hexdigit());
        is_valid.then_some(fingerprint)
    }
}

impl fmt::Display for DescriptorPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! spending_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub DescriptorPublicKey);

        impl $name {
            /// Wrap a descriptor key string.
            pub fn new(dpub: impl Into<String>) -> Self {
                Self(DescriptorPublicKey::new(dpub))
            }
        }
    };
}

spending_key!(
    /// Spending key held by the mobile app.
    AppSpendingPublicKey
);
spending_key!(
    /// Spending key held by the hardware device.
    HwSpendingPublicKey
);
spending_key!(
    /// Spending key held by the remote co-signer.
    F8eSpendingPublicKey
);

macro_rules! auth_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a hex-encoded public key.
            pub fn new(pubkey: impl Into<String>) -> Self {
                Self(pubkey.into())
            }

            /// Hex-encoded public key.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

auth_key!(
    /// App authentication key for everyday (global) sessions.
    AppGlobalAuthPublicKey
);
auth_key!(
    /// App authentication key scoped to recovery sessions.
    AppRecoveryAuthPublicKey
);
auth_key!(
    /// Hardware authentication key.
    HwAuthPublicKey
);

/// Keys generated by the app for one wallet generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppKeyBundle {
    pub local_id: LocalId,
    pub spending_key: AppSpendingPublicKey,
    pub auth_key: AppGlobalAuthPublicKey,
    pub recovery_auth_key: AppRecoveryAuthPublicKey,
    pub network: Network,
}

/// Keys reported by a hardware device for one wallet generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwKeyBundle {
    pub local_id: LocalId,
    pub spending_key: HwSpendingPublicKey,
    pub auth_key: HwAuthPublicKey,
    pub network: Network,
}

/// Cloud storage encryption key sealed by the hardware.
///
/// Persisted at the `AttemptingCompletion` checkpoint so a later cloud
/// backup can be produced after a crash.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedCsek(#[serde(with = "hex_bytes")] pub Vec<u8>);

impl fmt::Debug for SealedCsek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedCsek({} bytes)", self.0.len())
    }
}

/// Hardware-signed proof that the caller currently holds the hardware factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwFactorProofOfPossession {
    pub hw_signed_token: String,
}

/// A hex-encoded signature produced by one of the key-holders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub String);

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
