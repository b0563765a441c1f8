//! secp256r1 (P-256) verification for WebAuthn signatures.
//!
//! The private half of these keys lives in an authenticator; the client only
//! needs to normalize and check what the authenticator returns.
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::keys::secp256r1::{compress_public_key, verify};
//!
//! // Uncompressed keys are accepted and can be compressed for key hashing.
//! let uncompressed = hex::decode(
//!     "04471c3e758c4904285bba7e53118ed0f524adeb0757d25bd2f8e7b0d76dfa714c\
//!      dd520f7aca8a8b917acc37f51de8f0c9bbe3ad858382e702dc25a12d09f7a858",
//! )
//! .unwrap();
//! let compressed = compress_public_key(&uncompressed).unwrap();
//! assert_eq!(compressed[0], 0x02);
//! assert!(!verify(&[0u8; 32], &[0u8; 64], &compressed));
//! ```

use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};

use super::pad_hash;
use crate::error::{Error, Result};

/// Length of a SEC1-compressed P-256 public key.
pub const COMPRESSED_KEY_LEN: usize = 33;

/// Verifies a 64-byte `r || s` P-256 signature over a prehashed message.
///
/// Both low-S and high-S signatures are accepted: authenticators do not
/// normalize `s`.
#[must_use]
pub fn verify(hash: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(prehash) = pad_hash(hash) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    verifying_key.verify_prehash(&prehash, &signature).is_ok()
}

/// Converts any SEC1 P-256 public key to its 33-byte compressed form.
///
/// # Errors
///
/// Returns [`Error::InvalidPublicKey`] if the bytes are not a curve point.
pub fn compress_public_key(public_key: &[u8]) -> Result<Vec<u8>> {
    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| Error::InvalidPublicKey(format!("invalid P-256 key: {e}")))?;
    Ok(key.to_encoded_point(true).as_bytes().to_vec())
}

/// Rewrites a 64-byte signature into low-S form.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the signature is malformed.
pub fn normalize_s(signature: &[u8]) -> Result<[u8; 64]> {
    let sig = Signature::from_slice(signature)
        .map_err(|e| Error::InvalidSignature(format!("invalid P-256 signature: {e}")))?;
    let sig = sig.normalize_s().unwrap_or(sig);
    let mut out = [0u8; 64];
    out.copy_from_slice(&sig.to_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use p256::ecdsa::SigningKey;
    use p256::ecdsa::signature::hazmat::PrehashSigner;

    use super::*;

    const HASH: &str = "9dee2e79cf18da0d97fcdcf26cf1ca17451e93f8e57b2e21211ed3583159c098";
    const SIG: &str = "997b4360410fe73feb340b211d5c3c1c2e6be39c04c681801c2f48aed41d569c\
                       65f710b4877ce98ff624ca4ac4f56729c6d75f4d18e6775c3d47fe7e1f1589c9";
    const PUBKEY: &str = "02471c3e758c4904285bba7e53118ed0f524adeb0757d25bd2f8e7b0d76dfa714c";

    #[test]
    fn verifies_known_vector() {
        let hash = hex::decode(HASH).unwrap();
        let sig = hex::decode(SIG).unwrap();
        let pk = hex::decode(PUBKEY).unwrap();

        assert!(verify(&hash, &sig, &pk));

        let mut tampered = hash.clone();
        tampered[0] ^= 1;
        assert!(!verify(&tampered, &sig, &pk));
    }

    #[test]
    fn high_s_is_accepted_and_normalized() {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let hash = [0x11; 32];
        let sig: Signature = key.sign_prehash(&hash).unwrap();
        let pk = key.verifying_key().to_encoded_point(true);

        let low = sig.normalize_s().unwrap_or(sig);
        let high = Signature::from_scalars(low.r(), -*low.s()).unwrap();

        assert!(verify(&hash, &high.to_bytes(), pk.as_bytes()));
        assert_eq!(normalize_s(&high.to_bytes()).unwrap(), normalize_s(&low.to_bytes()).unwrap());
        assert_eq!(normalize_s(&low.to_bytes()).unwrap().as_slice(), low.to_bytes().as_slice());
    }

    #[test]
    fn compress_is_idempotent() {
        let pk = hex::decode(PUBKEY).unwrap();
        assert_eq!(compress_public_key(&pk).unwrap(), pk);
        assert!(compress_public_key(&[0x05; 33]).is_err());
    }
}
