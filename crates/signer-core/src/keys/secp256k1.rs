//! secp256k1 key pairs, RFC6979 signing and public-key recovery.

use core::fmt;

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use super::{PRIVATE_KEY_LEN, mnemonic, pad_hash, private_key_array};
use crate::error::{Error, Result};
use crate::signature::RecoverableSignature;

/// A secp256k1 key pair.
///
/// The signing key is wiped from memory when the key pair is dropped.
#[derive(Clone)]
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secp256k1KeyPair")
            .field("public_key", &hex::encode(self.public_key(true)))
            .finish_non_exhaustive()
    }
}

impl Secp256k1KeyPair {
    /// Generates a random key pair.
    #[must_use]
    pub fn make() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Builds a key pair from a raw 32-byte private key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the key is not 32 bytes or is not
    /// a valid scalar (zero or above the curve order).
    pub fn from_bytes(private_key: &[u8]) -> Result<Self> {
        let key = private_key_array(private_key)?;
        let signing_key = SigningKey::from_slice(key.as_ref())
            .map_err(|_| Error::InvalidInput("private key is not a valid scalar".to_string()))?;
        Ok(Self { signing_key })
    }

    /// Derives a key pair from a mnemonic at `m/44'/{coin_type}'/0'/0/0`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Derivation`] if derivation fails.
    pub fn from_mnemonic(phrase: &str, coin_type: u32) -> Result<Self> {
        let key = mnemonic::derive_secp256k1(phrase, coin_type)?;
        Self::from_bytes(key.as_ref()).map_err(|e| Error::Derivation(e.to_string()))
    }

    /// Returns the raw private key.
    #[must_use]
    pub fn private_key(&self) -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
        Zeroizing::new(self.signing_key.to_bytes().into())
    }

    /// Returns the SEC1-encoded public key.
    #[must_use]
    pub fn public_key(&self, compressed: bool) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(compressed)
            .as_bytes()
            .to_vec()
    }

    /// Signs a hash and returns the 64-byte compact `r || s` signature.
    ///
    /// Signatures are RFC6979-deterministic and low-S.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless `0 < hash.len() <= 32`.
    pub fn sign(&self, hash: &[u8]) -> Result<[u8; 64]> {
        Ok(self.sign_recoverable(hash)?.to_compact())
    }

    /// Signs a hash and returns `{r, s, v}` with `v` in `{0, 1}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] unless `0 < hash.len() <= 32`.
    pub fn sign_recoverable(&self, hash: &[u8]) -> Result<RecoverableSignature> {
        let prehash = pad_hash(hash)?;
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;

        let (signature, recovery_id) = match signature.normalize_s() {
            Some(normalized) => (
                normalized,
                RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
            ),
            None => (signature, recovery_id),
        };

        let (r, s) = split_signature(&signature);
        Ok(RecoverableSignature::new(r, s, recovery_id.to_byte()))
    }

    /// Verifies a compact (64-byte) or recoverable (65-byte) signature.
    ///
    /// Malformed keys, malformed signatures and high-S signatures verify as
    /// `false`.
    #[must_use]
    pub fn verify(hash: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let Ok(prehash) = pad_hash(hash) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key) else {
            return false;
        };
        let compact = match signature.len() {
            64 | 65 => &signature[..64],
            _ => return false,
        };
        let Ok(signature) = K256Signature::from_slice(compact) else {
            return false;
        };
        verifying_key.verify_prehash(&prehash, &signature).is_ok()
    }
}

fn split_signature(signature: &K256Signature) -> ([u8; 32], [u8; 32]) {
    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    (r, s)
}

/// Recovers the signer's public key from a hash and a recoverable signature.
///
/// High-S signatures are normalized first, flipping the recovery bit.
///
/// # Arguments
///
/// * `hash` - The signed hash (1 to 32 bytes)
/// * `signature` - The `{r, s, v}` signature; build one from 64/65 raw bytes
///   with [`RecoverableSignature::from_slice`]
/// * `compressed` - Whether to return the 33-byte compressed key instead of
///   the 65-byte uncompressed one
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the signature is malformed or no
/// key can be recovered.
///
/// # Example
///
/// ```
/// use wallet_signer_core::crypto::sha256;
/// use wallet_signer_core::keys::{Secp256k1KeyPair, recover_pub_key};
///
/// let kp = Secp256k1KeyPair::from_bytes(&[9u8; 32]).unwrap();
/// let hash = sha256(b"recover me");
/// let sig = kp.sign_recoverable(&hash).unwrap();
///
/// assert_eq!(recover_pub_key(&hash, &sig, true).unwrap(), kp.public_key(true));
/// ```
pub fn recover_pub_key(
    hash: &[u8],
    signature: &RecoverableSignature,
    compressed: bool,
) -> Result<Vec<u8>> {
    let prehash = pad_hash(hash)?;
    let k256_sig = K256Signature::from_slice(&signature.to_compact())
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(signature.v())
        .ok_or_else(|| Error::InvalidSignature(format!("invalid recovery id {}", signature.v())))?;

    let (k256_sig, recovery_id) = match k256_sig.normalize_s() {
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (k256_sig, recovery_id),
    };

    let verifying_key = VerifyingKey::recover_from_prehash(&prehash, &k256_sig, recovery_id)
        .map_err(|e| Error::InvalidSignature(format!("public key recovery failed: {e}")))?;

    Ok(verifying_key
        .to_encoded_point(compressed)
        .as_bytes()
        .to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{eth_hash_message, sha256};
    use crate::encoding::decode_hex;

    /// Private key of the first account of the all-`abandon` test mnemonic.
    const ABANDON_KEY: &str = "1ab42cc412b618bdea3a599e3c9bae199ebf030895b039e9db1e30dafb12b727";

    #[test]
    fn signatures_are_deterministic_and_low_s() {
        let kp = Secp256k1KeyPair::from_bytes(&decode_hex(ABANDON_KEY).unwrap()).unwrap();
        let hash = sha256(b"deterministic");

        let a = kp.sign(&hash).unwrap();
        let b = kp.sign(&hash).unwrap();
        assert_eq!(a, b);

        let sig = K256Signature::from_slice(&a).unwrap();
        assert!(sig.normalize_s().is_none());
    }

    #[test]
    fn recover_matches_signer() {
        let kp = Secp256k1KeyPair::make();
        let hash = sha256(b"hello");
        let sig = kp.sign_recoverable(&hash).unwrap();

        assert_eq!(recover_pub_key(&hash, &sig, true).unwrap(), kp.public_key(true));
        assert_eq!(
            recover_pub_key(&hash, &sig, false).unwrap(),
            kp.public_key(false)
        );
    }

    #[test]
    fn recover_accepts_ethereum_v() {
        let kp = Secp256k1KeyPair::make();
        let hash = eth_hash_message(b"Please sign this message");
        let sig = kp.sign_recoverable(&hash).unwrap();

        // Wallets return r || s || (27 + v).
        let mut bytes = sig.to_bytes();
        bytes[64] += 27;
        let parsed = RecoverableSignature::from_slice(&bytes).unwrap();

        assert_eq!(parsed.v(), sig.v());
        assert_eq!(recover_pub_key(&hash, &parsed, true).unwrap(), kp.public_key(true));
    }

    #[test]
    fn recover_normalizes_high_s() {
        let kp = Secp256k1KeyPair::make();
        let hash = sha256(b"malleable");
        let sig = kp.sign_recoverable(&hash).unwrap();

        // Negate s and flip the parity: the same key must come back.
        let k256_sig = K256Signature::from_slice(&sig.to_compact()).unwrap();
        let high = K256Signature::from_scalars(k256_sig.r(), -*k256_sig.s()).unwrap();
        let (r, s) = split_signature(&high);
        let flipped = RecoverableSignature::new(r, s, sig.v() ^ 1);

        assert_eq!(
            recover_pub_key(&hash, &flipped, true).unwrap(),
            kp.public_key(true)
        );
    }

    #[test]
    fn verify_accepts_65_byte_signatures() {
        let kp = Secp256k1KeyPair::make();
        let hash = sha256(b"65");
        let sig = kp.sign_recoverable(&hash).unwrap();

        assert!(Secp256k1KeyPair::verify(&hash, &sig.to_bytes(), &kp.public_key(true)));
        assert!(Secp256k1KeyPair::verify(&hash, &sig.to_compact(), &kp.public_key(false)));
        assert!(!Secp256k1KeyPair::verify(&hash, &[0u8; 63], &kp.public_key(true)));
    }

    #[test]
    fn zero_key_is_rejected() {
        assert!(Secp256k1KeyPair::from_bytes(&[0u8; 32]).is_err());
    }
}
