//! Key hashes: the identifiers that join locally-held signing capability to
//! on-chain authorization records.
//!
//! A [`KeyHash`] is a SHA-256 digest computed from one of three inputs:
//!
//! | Input | Preimage |
//! |-------|----------|
//! | public key | serialized public key bytes |
//! | WebAuthn credential | raw credential id bytes |
//! | wallet address | lower-cased hex address string |
//!
//! These preimages are part of on-chain state: the account factory stores
//! keys under exactly these digests, so changing any of them orphans every
//! existing authorization record.
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::key_hash::{KeyHashInput, create_key_hash};
//!
//! let hash = create_key_hash(&KeyHashInput::WalletAddress(
//!     "0x9858EfFD232B4033E47d90003D41EC34EcaEda94".to_string(),
//! ));
//! let same = create_key_hash(&KeyHashInput::WalletAddress(
//!     "0x9858effd232b4033e47d90003d41ec34ecaeda94".to_string(),
//! ));
//! assert_eq!(hash, same);
//! assert_eq!(hash.to_string().len(), 64);
//! ```

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::auth::Key;
use crate::crypto::sha256;
use crate::encoding::decode_hex_array;
use crate::error::{Error, Result};

/// A 32-byte key hash, displayed as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyHash([u8; 32]);

impl KeyHash {
    /// The length of a key hash in bytes.
    pub const BYTE_LEN: usize = 32;

    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes the key hash of an on-chain [`Key`].
    ///
    /// Public keys hash their serialized bytes; Ethereum wallet keys hash
    /// their lower-cased address.
    #[must_use]
    pub fn of_key(key: &Key) -> Self {
        let input = match key {
            Key::Ethereum(address) => KeyHashInput::WalletAddress(address.to_hex()),
            Key::Secp256r1(pub_key) | Key::Secp256k1(pub_key) | Key::Ed25519(pub_key) => {
                KeyHashInput::PublicKey(pub_key.clone())
            }
        };
        create_key_hash(&input)
    }
}

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for KeyHash {
    type Err = Error;

    /// Parses 64 hex digits in either case, with or without `0x`.
    fn from_str(s: &str) -> Result<Self> {
        decode_hex_array::<32>(s).map(Self)
    }
}

impl Serialize for KeyHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl From<[u8; 32]> for KeyHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// What a key hash can be derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyHashInput {
    /// Public key bytes as registered on chain (SEC1 compressed for the
    /// ECDSA curves, 32 bytes for Ed25519).
    PublicKey(Vec<u8>),
    /// The raw (decoded) WebAuthn credential id.
    CredentialId(Vec<u8>),
    /// A hex wallet address, in any case.
    WalletAddress(String),
}

/// Derives a key hash. Deterministic and stable across versions.
#[must_use]
pub fn create_key_hash(input: &KeyHashInput) -> KeyHash {
    match input {
        KeyHashInput::PublicKey(bytes) | KeyHashInput::CredentialId(bytes) => {
            KeyHash(sha256(bytes))
        }
        KeyHashInput::WalletAddress(address) => {
            KeyHash(sha256(address.to_ascii_lowercase().as_bytes()))
        }
    }
}
