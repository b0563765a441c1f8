//! 20-byte addresses for accounts, contracts and EVM wallets.
//!
//! Two derivations produce an [`Address`]:
//!
//! - **Contract addresses** are predicted with [`compute_address`], which
//!   mirrors the chain's instantiation formula:
//!   `ripemd160(sha256(deployer || code_hash || salt))`.
//! - **EVM wallet addresses** come from a secp256k1 public key:
//!   the last 20 bytes of `keccak256(x || y)`.
//!
//! Addresses serialize as lowercase `0x`-prefixed hex; parsing accepts any
//! case.
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::address::{Address, compute_address};
//!
//! let deployer = Address::new([1u8; 20]);
//! let code_hash = [2u8; 32];
//!
//! let a = compute_address(&deployer, &code_hash, b"salt");
//! let b = compute_address(&deployer, &code_hash, b"salt");
//! assert_eq!(a, b);
//! assert_ne!(a, compute_address(&deployer, &code_hash, b"other"));
//! ```

use core::fmt;
use core::str::FromStr;

use alloy_primitives::{Address as AlloyAddress, keccak256};
use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::crypto::{ripemd160, sha256};
use crate::encoding::{decode_hex_array, encode_hex_prefixed};
use crate::error::{Error, Result};

/// A 20-byte address.
///
/// This is a wrapper around [`alloy_primitives::Address`] that adds the
/// chain's contract-address derivation and lowercase serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(AlloyAddress);

impl Address {
    /// The length of an address in bytes.
    pub const BYTE_LEN: usize = 20;

    /// Creates a new address from a 20-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; Self::BYTE_LEN]) -> Self {
        Self(AlloyAddress::new(bytes))
    }

    /// Derives the EVM address of a secp256k1 public key.
    ///
    /// # Arguments
    ///
    /// * `public_key` - A SEC1 secp256k1 key, compressed (33 bytes) or
    ///   uncompressed (65 bytes)
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPublicKey`] if the bytes are not a curve point.
    ///
    /// # Example
    ///
    /// ```
    /// use wallet_signer_core::address::Address;
    /// use wallet_signer_core::keys::Secp256k1KeyPair;
    ///
    /// let kp = Secp256k1KeyPair::make();
    /// let a = Address::from_public_key(&kp.public_key(true)).unwrap();
    /// let b = Address::from_public_key(&kp.public_key(false)).unwrap();
    /// assert_eq!(a, b);
    /// ```
    pub fn from_public_key(public_key: &[u8]) -> Result<Self> {
        let key = VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|e| Error::InvalidPublicKey(format!("invalid secp256k1 key: {e}")))?;
        let point = key.to_encoded_point(false);
        let digest = keccak256(&point.as_bytes()[1..]);

        let mut out = [0u8; Self::BYTE_LEN];
        out.copy_from_slice(&digest[32 - Self::BYTE_LEN..]);
        Ok(Self::new(out))
    }

    /// Returns the address as a byte array reference.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; Self::BYTE_LEN] {
        self.0.as_ref()
    }

    /// Returns the address as a 20-byte array.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        self.0.0.0
    }

    /// Returns the EIP-55 mixed-case checksum form, with `0x` prefix.
    #[must_use]
    pub fn to_checksum_hex(&self) -> String {
        self.0.to_checksum(None)
    }

    /// Lowercase hex with `0x` prefix, the form used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        encode_hex_prefixed(self.as_bytes())
    }

    /// Parses 20 bytes of hex, `0x` optional. Case is not checked against
    /// the EIP-55 checksum.
    ///
    /// # Errors
    ///
    /// [`Error::HexDecodeFailed`] for malformed hex and
    /// [`Error::InvalidInput`] for any length other than 20 bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use wallet_signer_core::address::Address;
    ///
    /// let addr = Address::from_hex("0x9858EfFD232B4033E47d90003D41EC34EcaEda94").unwrap();
    /// assert_eq!(addr.to_string(), "0x9858effd232b4033e47d90003d41ec34ecaeda94");
    /// ```
    pub fn from_hex(text: &str) -> Result<Self> {
        decode_hex_array(text).map(Self::new)
    }
}

/// Predicts the address of a contract instantiated by `deployer`.
///
/// `ripemd160(sha256(deployer || code_hash || salt))`
///
/// # Arguments
///
/// * `deployer` - The account or factory that instantiates the contract
/// * `code_hash` - SHA-256 hash of the contract's wasm byte code
/// * `salt` - Arbitrary bytes chosen by the deployer
#[must_use]
pub fn compute_address(deployer: &Address, code_hash: &[u8; 32], salt: &[u8]) -> Address {
    let mut preimage = Vec::with_capacity(Address::BYTE_LEN + 32 + salt.len());
    preimage.extend_from_slice(deployer.as_bytes());
    preimage.extend_from_slice(code_hash);
    preimage.extend_from_slice(salt);
    Address::new(ripemd160(&sha256(&preimage)))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(de::Error::custom)
    }
}

impl From<AlloyAddress> for Address {
    fn from(inner: AlloyAddress) -> Self {
        Self(inner)
    }
}

impl From<Address> for AlloyAddress {
    fn from(address: Address) -> Self {
        address.0
    }
}
