//! Key algorithms: secp256k1, ed25519 and secp256r1.
//!
//! Off-chain signing capability is represented by [`KeyPair`], a sum type
//! over the algorithms whose private keys the client can hold. secp256r1 keys
//! live inside WebAuthn authenticators, so that module only verifies and
//! normalizes signatures.
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::crypto::sha256;
//! use wallet_signer_core::keys::{KeyAlgo, KeyPair};
//!
//! let key_pair = KeyPair::from_bytes(KeyAlgo::Secp256k1, &[7u8; 32]).unwrap();
//! let hash = sha256(b"message");
//! let signature = key_pair.sign(&hash).unwrap();
//!
//! assert!(KeyPair::verify(
//!     KeyAlgo::Secp256k1,
//!     &hash,
//!     &signature,
//!     &key_pair.public_key(),
//! ));
//! ```

pub mod ed25519;
pub mod mnemonic;
pub mod secp256k1;
pub mod secp256r1;

use core::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub use ed25519::Ed25519KeyPair;
pub use mnemonic::{DEFAULT_COIN_TYPE, generate_mnemonic, mnemonic_to_seed};
pub use secp256k1::{Secp256k1KeyPair, recover_pub_key};

use crate::error::{Error, Result};

/// Length of every private key handled by this crate.
pub const PRIVATE_KEY_LEN: usize = 32;

/// The signature algorithms a key can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgo {
    /// NIST P-256, used by WebAuthn passkeys.
    Secp256r1,
    /// secp256k1, used by Ethereum wallets and session keys.
    Secp256k1,
    /// Ed25519.
    Ed25519,
}

impl KeyAlgo {
    /// Stable one-byte tag mixed into key hashes and account salts.
    ///
    /// These values are part of on-chain identifiers and must never change.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Secp256r1 => 0,
            Self::Secp256k1 => 1,
            Self::Ed25519 => 2,
        }
    }

    /// Returns the lowercase algorithm name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secp256r1 => "secp256r1",
            Self::Secp256k1 => "secp256k1",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for KeyAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A private key the client holds, for one of the supported algorithms.
#[derive(Debug, Clone)]
pub enum KeyPair {
    /// A secp256k1 key pair.
    Secp256k1(Secp256k1KeyPair),
    /// An Ed25519 key pair.
    Ed25519(Ed25519KeyPair),
}

impl KeyPair {
    /// Generates a random key pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for [`KeyAlgo::Secp256r1`], whose
    /// private keys never leave the authenticator.
    pub fn make(algo: KeyAlgo) -> Result<Self> {
        match algo {
            KeyAlgo::Secp256k1 => Ok(Self::Secp256k1(Secp256k1KeyPair::make())),
            KeyAlgo::Ed25519 => Ok(Self::Ed25519(Ed25519KeyPair::make())),
            KeyAlgo::Secp256r1 => Err(unsupported_algo(algo)),
        }
    }

    /// Builds a key pair from a raw 32-byte private key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the key is not exactly 32 bytes,
    /// is not a valid scalar, or the algorithm has no client-side key pair.
    pub fn from_bytes(algo: KeyAlgo, private_key: &[u8]) -> Result<Self> {
        match algo {
            KeyAlgo::Secp256k1 => Ok(Self::Secp256k1(Secp256k1KeyPair::from_bytes(private_key)?)),
            KeyAlgo::Ed25519 => Ok(Self::Ed25519(Ed25519KeyPair::from_bytes(private_key)?)),
            KeyAlgo::Secp256r1 => Err(unsupported_algo(algo)),
        }
    }

    /// Derives a key pair from a BIP-39 mnemonic at `m/44'/{coin_type}'/0'/0/0`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Derivation`] if the mnemonic is invalid or the path
    /// yields no private key.
    pub fn from_mnemonic(algo: KeyAlgo, mnemonic: &str, coin_type: u32) -> Result<Self> {
        match algo {
            KeyAlgo::Secp256k1 => Ok(Self::Secp256k1(Secp256k1KeyPair::from_mnemonic(
                mnemonic, coin_type,
            )?)),
            KeyAlgo::Ed25519 => Ok(Self::Ed25519(Ed25519KeyPair::from_mnemonic(
                mnemonic, coin_type,
            )?)),
            KeyAlgo::Secp256r1 => Err(unsupported_algo(algo)),
        }
    }

    /// Returns the algorithm of this key pair.
    #[must_use]
    pub const fn algo(&self) -> KeyAlgo {
        match self {
            Self::Secp256k1(_) => KeyAlgo::Secp256k1,
            Self::Ed25519(_) => KeyAlgo::Ed25519,
        }
    }

    /// Returns the raw private key.
    #[must_use]
    pub fn private_key(&self) -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
        match self {
            Self::Secp256k1(kp) => kp.private_key(),
            Self::Ed25519(kp) => kp.private_key(),
        }
    }

    /// Returns the public key in the form registered on chain.
    ///
    /// secp256k1 keys are SEC1-compressed (33 bytes); Ed25519 keys are 32 bytes.
    #[must_use]
    pub fn public_key(&self) -> Vec<u8> {
        match self {
            Self::Secp256k1(kp) => kp.public_key(true),
            Self::Ed25519(kp) => kp.public_key().to_vec(),
        }
    }

    /// Signs a message hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless `0 < hash.len() <= 32`.
    pub fn sign(&self, hash: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Secp256k1(kp) => Ok(kp.sign(hash)?.to_vec()),
            Self::Ed25519(kp) => Ok(kp.sign(hash)?.to_vec()),
        }
    }

    /// Verifies a signature over `hash` against a public key.
    ///
    /// Malformed keys or signatures verify as `false`.
    #[must_use]
    pub fn verify(algo: KeyAlgo, hash: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        match algo {
            KeyAlgo::Secp256k1 => Secp256k1KeyPair::verify(hash, signature, public_key),
            KeyAlgo::Ed25519 => Ed25519KeyPair::verify(hash, signature, public_key),
            KeyAlgo::Secp256r1 => secp256r1::verify(hash, signature, public_key),
        }
    }
}

/// Generates a random key pair; shorthand for [`KeyPair::make`].
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for [`KeyAlgo::Secp256r1`].
pub fn make_key_pair(algo: KeyAlgo) -> Result<KeyPair> {
    KeyPair::make(algo)
}

/// Checks that a message hash is between 1 and 32 bytes long.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] otherwise.
pub fn check_hash(hash: &[u8]) -> Result<()> {
    if hash.is_empty() || hash.len() > 32 {
        return Err(Error::InvalidInput(format!(
            "message hash must be 1 to 32 bytes, got {}",
            hash.len()
        )));
    }
    Ok(())
}

/// Left-pads a 1..=32 byte hash to 32 bytes.
pub(crate) fn pad_hash(hash: &[u8]) -> Result<[u8; 32]> {
    check_hash(hash)?;
    let mut out = [0u8; 32];
    out[32 - hash.len()..].copy_from_slice(hash);
    Ok(out)
}

/// Copies a private key slice into a zeroizing array.
pub(crate) fn private_key_array(bytes: &[u8]) -> Result<Zeroizing<[u8; PRIVATE_KEY_LEN]>> {
    if bytes.len() != PRIVATE_KEY_LEN {
        return Err(Error::InvalidInput(format!(
            "private key must be {PRIVATE_KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let mut key = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    key.copy_from_slice(bytes);
    Ok(key)
}

fn unsupported_algo(algo: KeyAlgo) -> Error {
    Error::InvalidInput(format!("{algo} private keys are not held by the client"))
}
