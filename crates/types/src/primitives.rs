// Path: crates/types/src/primitives.rs
//! Fixed-width identifiers used throughout the membership and quorum layers.
//!
//! All of these types serialize to lowercase hex for human-facing output (JSON,
//! TOML, logs) and to their raw bytes under the canonical SCALE codec.

use parity_scale_codec::{Decode, Encode};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// The byte length of this identifier.
            pub const LEN: usize = $len;
            /// The all-zero value, used as the "unset" sentinel.
            pub const ZERO: Self = Self([0u8; $len]);

            /// Returns true if every byte is zero.
            pub fn is_null(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Builds a value from a slice, returning `None` on a length mismatch.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                <[u8; $len]>::try_from(bytes).ok().map(Self)
            }

            /// Returns the raw bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Returns the lowercase hex representation.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parses a hex string of exactly the right length.
            pub fn from_hex(s: &str) -> Option<Self> {
                hex::decode(s).ok().and_then(|b| Self::from_slice(&b))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ZERO
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).ok_or_else(|| {
                    D::Error::custom(concat!("invalid hex for ", stringify!($name)))
                })
            }
        }
    };
}

fixed_bytes!(
    /// A 256-bit hash: block hashes, transaction ids, `proTxHash`, sign hashes.
    ///
    /// Ordering is bytewise over the stored bytes.
    Hash256,
    32
);

fixed_bytes!(
    /// A 160-bit key identifier for owner and voting keys.
    KeyId,
    20
);

fixed_bytes!(
    /// A compressed BLS12-381 G1 public key (operator keys, quorum keys).
    BlsPublicKeyBytes,
    48
);

fixed_bytes!(
    /// A compressed BLS12-381 G2 signature.
    BlsSignatureBytes,
    96
);

impl Hash256 {
    /// Compares two hashes as 256-bit little-endian integers.
    ///
    /// Score-based selections treat hashes as numbers whose least significant
    /// byte comes first, so the comparison starts at the last byte.
    pub fn cmp_as_uint(&self, other: &Self) -> std::cmp::Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

/// A reference to a transaction output, used for masternode collateral.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Encode, Decode, Serialize, Deserialize,
)]
pub struct OutPoint {
    /// The id of the transaction holding the output.
    pub txid: Hash256,
    /// The output index within that transaction.
    pub index: u32,
}

impl OutPoint {
    /// Creates a new outpoint.
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.txid, self.index)
    }
}

/// A network service address (IPv6 or IPv4-mapped) plus port.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Encode, Decode, Serialize, Deserialize,
)]
pub struct ServiceAddr {
    /// The 16-byte IP address. IPv4 addresses use the `::ffff:a.b.c.d` mapping.
    pub ip: [u8; 16],
    /// The TCP port.
    pub port: u16,
}

impl ServiceAddr {
    /// Builds an IPv4-mapped service address.
    pub fn from_ipv4(octets: [u8; 4], port: u16) -> Self {
        let mut ip = [0u8; 16];
        ip[10] = 0xff;
        ip[11] = 0xff;
        ip[12..].copy_from_slice(&octets);
        Self { ip, port }
    }

    /// Returns true for the unset address, which never participates in uniqueness checks.
    pub fn is_null(&self) -> bool {
        self.port == 0 && self.ip.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for ServiceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let std_ip = std::net::Ipv6Addr::from(self.ip);
        match std_ip.to_ipv4_mapped() {
            Some(v4) => write!(f, "{}:{}", v4, self.port),
            None => write!(f, "[{}]:{}", std_ip, self.port),
        }
    }
}

/// An auxiliary-chain (NEVM) address. Empty means "not set".
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct NevmAddress(pub Vec<u8>);

impl NevmAddress {
    /// The only accepted length for a non-empty address.
    pub const LEN: usize = 20;

    /// Returns true if no address is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for NevmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NevmAddress({})", hex::encode(&self.0))
    }
}

impl Serialize for NevmAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for NevmAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map(Self).map_err(D::Error::custom)
    }
}

/// An opaque output script (payout destinations).
#[derive(Clone, PartialEq, Eq, Hash, Default, Debug, Encode, Decode, Serialize, Deserialize)]
pub struct Script(pub Vec<u8>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_hex_roundtrip_and_null() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        let h = Hash256(bytes);
        assert!(!h.is_null());
        assert!(Hash256::ZERO.is_null());
        assert_eq!(Hash256::from_hex(&h.to_hex()), Some(h));
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", h.to_hex()));
    }

    #[test]
    fn uint_comparison_starts_at_last_byte() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        a[0] = 0xff;
        b[31] = 0x01;
        // Bytewise `a > b`, numerically `a < b`.
        assert!(Hash256(a) > Hash256(b));
        assert_eq!(Hash256(a).cmp_as_uint(&Hash256(b)), std::cmp::Ordering::Less);
    }

    #[test]
    fn service_addr_display_and_null() {
        let addr = ServiceAddr::from_ipv4([10, 0, 0, 1], 8369);
        assert_eq!(addr.to_string(), "10.0.0.1:8369");
        assert!(!addr.is_null());
        assert!(ServiceAddr::default().is_null());
    }
}
