//! Hash functions and ASN.1 DER signature parsing.
//!
//! This module collects the digests used across the crate and converts the
//! DER-encoded ECDSA signatures returned by WebAuthn authenticators into the
//! compact form every verifier downstream expects.
//!
//! # Signature Format
//!
//! Authenticators return signatures in DER format:
//! ```text
//! 30 len 02 r_len r_bytes 02 s_len s_bytes
//! ```
//!
//! The chain expects the compact format: `r || s` (64 bytes total).
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::crypto::der_to_compact;
//!
//! // Parse a DER-encoded signature with r = 1, s = 2
//! let der = vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02];
//! let compact = der_to_compact(&der).unwrap();
//! assert_eq!(compact[31], 1);
//! assert_eq!(compact[63], 2);
//! ```

use alloy_primitives::keccak256 as alloy_keccak256;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Prefix of EIP-191 `personal_sign` messages.
const ETH_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Computes the SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Computes the RIPEMD-160 digest of `data`.
#[must_use]
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// Computes the Keccak-256 digest of `data`.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    alloy_keccak256(data).0
}

/// Hashes a message the way `personal_sign` wallets do (EIP-191).
///
/// `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`
///
/// # Example
///
/// ```
/// use wallet_signer_core::crypto::eth_hash_message;
///
/// let hash = eth_hash_message(b"hello");
/// assert_eq!(hash.len(), 32);
/// ```
#[must_use]
pub fn eth_hash_message(message: &[u8]) -> [u8; 32] {
    let len = message.len().to_string();
    let mut data = Vec::with_capacity(ETH_MESSAGE_PREFIX.len() + len.len() + message.len());
    data.extend_from_slice(ETH_MESSAGE_PREFIX);
    data.extend_from_slice(len.as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Parses a DER-encoded ECDSA signature into raw `(r, s)` components.
///
/// Each INTEGER is left-padded to 32 bytes. Longer integers keep their low
/// 32 bytes.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the DER encoding is malformed.
///
/// # Example
///
/// ```
/// use wallet_signer_core::crypto::parse_der_signature;
///
/// // DER with sign padding: r = 0x80, s = 0x90
/// let der = vec![0x30, 0x08, 0x02, 0x02, 0x00, 0x80, 0x02, 0x02, 0x00, 0x90];
/// let (r, s) = parse_der_signature(&der).unwrap();
/// assert_eq!(r[31], 0x80);
/// assert_eq!(s[31], 0x90);
/// ```
pub fn parse_der_signature(der: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    if der.len() < 8 {
        return Err(Error::InvalidSignature("DER too short".to_string()));
    }

    if der[0] != 0x30 {
        return Err(Error::InvalidSignature(
            "invalid DER sequence tag".to_string(),
        ));
    }

    // Sequence length, short or one-byte long form.
    let (seq_len, mut i) = match der[1] {
        0x81 => (usize::from(der[2]), 3),
        len if len < 0x80 => (usize::from(len), 2),
        _ => {
            return Err(Error::InvalidSignature(
                "unsupported DER length form".to_string(),
            ));
        }
    };
    if i + seq_len != der.len() {
        return Err(Error::InvalidSignature(
            "DER sequence length mismatch".to_string(),
        ));
    }

    let r_bytes = read_integer(der, &mut i, "r")?;
    let s_bytes = read_integer(der, &mut i, "s")?;

    if i != der.len() {
        return Err(Error::InvalidSignature(
            "trailing bytes after DER integers".to_string(),
        ));
    }

    Ok((to_fixed_bytes(r_bytes), to_fixed_bytes(s_bytes)))
}

/// Reads one `02 len bytes` INTEGER starting at `*i`.
fn read_integer<'a>(der: &'a [u8], i: &mut usize, name: &str) -> Result<&'a [u8]> {
    if *i + 2 > der.len() || der[*i] != 0x02 {
        return Err(Error::InvalidSignature(format!("invalid {name} tag")));
    }
    let len = usize::from(der[*i + 1]);
    *i += 2;

    if len == 0 || *i + len > der.len() {
        return Err(Error::InvalidSignature(format!("{name} length overflow")));
    }

    let bytes = &der[*i..*i + len];
    *i += len;
    Ok(bytes)
}

/// Left-pads or truncates big-endian integer bytes to 32 bytes.
fn to_fixed_bytes(bytes: &[u8]) -> [u8; 32] {
    let bytes = &bytes[bytes.len().saturating_sub(32)..];
    let mut result = [0u8; 32];
    result[32 - bytes.len()..].copy_from_slice(bytes);
    result
}

/// Converts a DER-encoded ECDSA signature to the 64-byte `r || s` form.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the DER encoding is malformed.
pub fn der_to_compact(der: &[u8]) -> Result<[u8; 64]> {
    let (r, s) = parse_der_signature(der)?;
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(&r);
    out[32..].copy_from_slice(&s);
    Ok(out)
}
