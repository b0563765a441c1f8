//! Ed25519 key pairs.

use core::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use super::{PRIVATE_KEY_LEN, check_hash, mnemonic, private_key_array};
use crate::error::Result;

/// An Ed25519 key pair.
#[derive(Clone)]
pub struct Ed25519KeyPair {
    signing_key: SigningKey,
}

impl fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519KeyPair")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

impl Ed25519KeyPair {
    /// Generates a random key pair.
    #[must_use]
    pub fn make() -> Self {
        let mut secret = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        OsRng.fill_bytes(&mut secret[..]);
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    /// Builds a key pair from a 32-byte seed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`](crate::Error::InvalidInput) if the seed is not 32 bytes.
    pub fn from_bytes(private_key: &[u8]) -> Result<Self> {
        let secret = private_key_array(private_key)?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    /// Derives a key pair from a mnemonic along the hardened SLIP-10 path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Derivation`](crate::Error::Derivation) if the mnemonic is invalid.
    pub fn from_mnemonic(phrase: &str, coin_type: u32) -> Result<Self> {
        let secret = mnemonic::derive_ed25519(phrase, coin_type)?;
        Self::from_bytes(secret.as_ref())
    }

    /// Returns the 32-byte seed.
    #[must_use]
    pub fn private_key(&self) -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// Returns the 32-byte public key.
    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Signs a message hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`](crate::Error::InvalidInput) unless `0 < hash.len() <= 32`.
    pub fn sign(&self, hash: &[u8]) -> Result<[u8; 64]> {
        check_hash(hash)?;
        Ok(self.signing_key.sign(hash).to_bytes())
    }

    /// Verifies a 64-byte signature over `hash`.
    #[must_use]
    pub fn verify(hash: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        if check_hash(hash).is_err() {
            return false;
        }
        let Ok(public_key) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(hash, &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc8032_test_1_public_key() {
        let secret = hex::decode("9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60")
            .unwrap();
        let kp = Ed25519KeyPair::from_bytes(&secret).unwrap();
        assert_eq!(
            hex::encode(kp.public_key()),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
    }

    #[test]
    fn signatures_are_deterministic() {
        let kp = Ed25519KeyPair::make();
        let hash = [0xab; 32];
        assert_eq!(kp.sign(&hash).unwrap(), kp.sign(&hash).unwrap());
        assert!(Ed25519KeyPair::verify(&hash, &kp.sign(&hash).unwrap(), &kp.public_key()));
    }

    #[test]
    fn malformed_inputs_do_not_verify() {
        let kp = Ed25519KeyPair::make();
        let hash = [1u8; 32];
        let sig = kp.sign(&hash).unwrap();

        assert!(!Ed25519KeyPair::verify(&hash, &sig[..63], &kp.public_key()));
        assert!(!Ed25519KeyPair::verify(&hash, &sig, &kp.public_key()[..31]));
        assert!(!Ed25519KeyPair::verify(&[], &sig, &kp.public_key()));
    }
}
