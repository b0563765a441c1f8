//! Recoverable ECDSA signatures.
//!
//! [`RecoverableSignature`] is what injected wallets and local secp256k1
//! keys hand back, and what the `standard` on-chain signature carries. The
//! recovery bit is always stored as `0` or `1`.
//!
//! Three raw layouts are accepted by [`RecoverableSignature::from_slice`]:
//!
//! | length | layout            | recovery bit                  |
//! |--------|-------------------|-------------------------------|
//! | 65     | `r ‖ s ‖ v`       | `v` is `0`/`1` or `27`/`28`   |
//! | 64     | `r ‖ yParityAndS` | top bit of `s` ([EIP-2098])   |
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::RecoverableSignature;
//!
//! let mut raw = [0u8; 65];
//! raw[64] = 28;
//!
//! let sig = RecoverableSignature::from_slice(&raw).unwrap();
//! assert_eq!(sig.v(), 1);
//! ```
//!
//! [EIP-2098]: https://eips.ethereum.org/EIPS/eip-2098

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::{decode_hex, encode_hex_prefixed};
use crate::error::{Error, Result};

/// An ECDSA signature with its public-key recovery bit.
///
/// Serializes as `{"r": "0x..", "s": "0x..", "v": 0|1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecoverableSignature {
    #[serde(with = "scalar")]
    r: [u8; 32],
    #[serde(with = "scalar")]
    s: [u8; 32],
    v: u8,
}

/// `0x`-prefixed hex for a 32-byte scalar.
mod scalar {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use crate::encoding::{decode_hex_array, encode_hex_prefixed};

    pub(super) fn serialize<S: Serializer>(scalar: &[u8; 32], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&encode_hex_prefixed(scalar))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 32], D::Error> {
        let text = String::deserialize(de)?;
        decode_hex_array(&text).map_err(de::Error::custom)
    }
}

impl RecoverableSignature {
    /// Length of `r ‖ s ‖ v`.
    pub const BYTE_LEN: usize = 65;

    /// Length of `r ‖ s`.
    pub const COMPACT_LEN: usize = 64;

    /// Builds a signature from its parts. A `v` of `27`/`28` is folded to
    /// its recovery bit.
    #[must_use]
    pub const fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        let parity = if v >= 27 { v - 27 } else { v };
        Self { r, s, v: parity & 1 }
    }

    /// Parses a 65-byte or EIP-2098 64-byte signature.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSignature`] on any other length, or when the trailing
    /// byte of a 65-byte signature is not `0`, `1`, `27` or `28`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            Self::BYTE_LEN => {
                let v = match bytes[64] {
                    parity @ (0 | 1) => parity,
                    legacy @ (27 | 28) => legacy - 27,
                    other => {
                        return Err(Error::InvalidSignature(format!(
                            "recovery byte {other} is not one of 0, 1, 27, 28"
                        )));
                    }
                };
                Ok(Self {
                    r: array32(&bytes[..32]),
                    s: array32(&bytes[32..64]),
                    v,
                })
            }
            Self::COMPACT_LEN => {
                let mut s = array32(&bytes[32..]);
                let v = s[0] >> 7;
                s[0] &= 0x7f;
                Ok(Self {
                    r: array32(&bytes[..32]),
                    s,
                    v,
                })
            }
            len => Err(Error::InvalidSignature(format!(
                "signature must be 64 or 65 bytes, got {len}"
            ))),
        }
    }

    /// `r ‖ s ‖ v` with `v` in `{0, 1}`.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut out = [0u8; Self::BYTE_LEN];
        out[..Self::COMPACT_LEN].copy_from_slice(&self.to_compact());
        out[Self::COMPACT_LEN] = self.v;
        out
    }

    /// `r ‖ s`, without the recovery bit.
    #[must_use]
    pub fn to_compact(&self) -> [u8; Self::COMPACT_LEN] {
        let mut out = [0u8; Self::COMPACT_LEN];
        let (r, s) = out.split_at_mut(32);
        r.copy_from_slice(&self.r);
        s.copy_from_slice(&self.s);
        out
    }

    #[must_use]
    pub const fn r(&self) -> &[u8; 32] {
        &self.r
    }

    #[must_use]
    pub const fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// The recovery bit, `0` or `1`.
    #[must_use]
    pub const fn v(&self) -> u8 {
        self.v
    }

    /// `0x`-prefixed hex of [`Self::to_bytes`].
    #[must_use]
    pub fn to_hex(&self) -> String {
        encode_hex_prefixed(&self.to_bytes())
    }

    /// Parses hex produced by [`Self::to_hex`] or a wallet, `0x` optional.
    ///
    /// # Errors
    ///
    /// [`Error::HexDecodeFailed`] for malformed hex, otherwise as
    /// [`Self::from_slice`].
    pub fn from_hex(text: &str) -> Result<Self> {
        Self::from_slice(&decode_hex(text)?)
    }
}

fn array32(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(bytes);
    out
}

impl fmt::Display for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
