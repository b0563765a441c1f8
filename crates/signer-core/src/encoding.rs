//! Strict text codecs and canonical JSON.
//!
//! Every decoder in this module rejects input instead of guessing: wrong
//! length, odd hex digits, whitespace, characters outside the alphabet and
//! misplaced or missing `=` padding are all errors.
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::encoding::{decode_base64, encode_base64};
//!
//! let encoded = encode_base64(b"hello");
//! assert_eq!(encoded, "aGVsbG8=");
//! assert_eq!(decode_base64(&encoded).unwrap(), b"hello");
//!
//! // Missing padding is rejected.
//! assert!(decode_base64("aGVsbG8").is_err());
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Encodes bytes as lowercase hex without a prefix.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Encodes bytes as lowercase hex with a `0x` prefix.
#[must_use]
pub fn encode_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decodes a hex string, with or without a `0x` prefix.
///
/// # Errors
///
/// Returns [`Error::HexDecodeFailed`] on odd length or non-hex characters
/// (whitespace included).
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(s)?)
}

/// Decodes a hex string into a fixed-size array.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the decoded length is not `N`.
pub fn decode_hex_array<const N: usize>(s: &str) -> Result<[u8; N]> {
    let bytes = decode_hex(s)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("expected {N} bytes of hex, got {len}")))
}

/// Encodes bytes as standard padded base64.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard base64 with canonical padding.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on bad padding, bad length, whitespace or
/// characters outside the standard alphabet.
pub fn decode_base64(s: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(s)?)
}

/// Encodes bytes as URL-safe base64 without padding.
#[must_use]
pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes URL-safe base64 without padding.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the input is padded or malformed.
pub fn decode_base64url(s: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(s)?)
}

/// Converts a base64url string (padded or not) to padded standard base64.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the input contains characters that
/// belong to neither alphabet, has an impossible length, or carries more
/// padding than its length calls for.
pub fn base64url_to_base64(s: &str) -> Result<String> {
    let trimmed = s.trim_end_matches('=');
    if trimmed.len() % 4 == 1 {
        return Err(Error::InvalidInput(format!(
            "base64url length {} is impossible",
            s.len()
        )));
    }
    let padding = s.len() - trimmed.len();
    if padding > 0 && padding != (4 - trimmed.len() % 4) % 4 {
        return Err(Error::InvalidInput(format!(
            "base64url has {padding} padding characters for {} data characters",
            trimmed.len()
        )));
    }

    let mut out = String::with_capacity(trimmed.len() + 3);
    for c in trimmed.chars() {
        match c {
            '-' => out.push('+'),
            '_' => out.push('/'),
            'A'..='Z' | 'a'..='z' | '0'..='9' => out.push(c),
            other => {
                return Err(Error::InvalidInput(format!(
                    "invalid base64url character {other:?}"
                )));
            }
        }
    }
    while out.len() % 4 != 0 {
        out.push('=');
    }
    Ok(out)
}

/// Converts padded standard base64 to unpadded base64url.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the input is not valid standard base64.
pub fn base64_to_base64url(s: &str) -> Result<String> {
    let bytes = decode_base64(s)?;
    Ok(encode_base64url(&bytes))
}

/// Renders a JSON value compactly with object keys sorted at every level.
///
/// `serde_json` stores objects in a `BTreeMap` unless its `preserve_order`
/// feature is enabled, so its compact output is already key-sorted.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use wallet_signer_core::encoding::to_canonical_json;
///
/// let value = json!({"b": 1, "a": {"d": [true, null], "c": "x"}});
/// assert_eq!(to_canonical_json(&value), r#"{"a":{"c":"x","d":[true,null]},"b":1}"#);
/// ```
#[must_use]
pub fn to_canonical_json(value: &Value) -> String {
    value.to_string()
}

/// Serializes any value to canonical JSON bytes.
///
/// # Errors
///
/// Returns [`Error::JsonError`] if the value cannot be represented as JSON.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Serde helper for byte fields carried as standard base64 strings.
pub mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Serializes bytes as padded standard base64.
    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]> + ?Sized,
    {
        serializer.serialize_str(&super::encode_base64(bytes.as_ref()))
    }

    /// Deserializes strict standard base64 into bytes.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::decode_base64(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn hex_roundtrip_and_prefix() {
        let bytes = [0xde, 0xad, 0xbe, 0xef];
        assert_eq!(encode_hex(&bytes), "deadbeef");
        assert_eq!(encode_hex_prefixed(&bytes), "0xdeadbeef");
        assert_eq!(decode_hex("0xdeadbeef").unwrap(), bytes);
        assert_eq!(decode_hex("DEADBEEF").unwrap(), bytes);
    }

    #[test]
    fn hex_rejects_malformed() {
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("ab cd").is_err());
        assert!(decode_hex("zz").is_err());
        assert!(decode_hex(" abcd").is_err());
    }

    #[test]
    fn hex_array_length() {
        assert_eq!(decode_hex_array::<2>("0102").unwrap(), [1, 2]);
        assert!(matches!(
            decode_hex_array::<3>("0102"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn base64_empty() {
        assert_eq!(encode_base64(&[]), "");
        assert_eq!(decode_base64("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn base64_rejects_bad_padding() {
        // Missing padding.
        assert!(decode_base64("aGk").is_err());
        // Too much padding.
        assert!(decode_base64("aGk==").is_err());
        // Padding in the middle.
        assert!(decode_base64("aG=k").is_err());
        // Padding only.
        assert!(decode_base64("====").is_err());
    }

    #[test]
    fn base64_rejects_whitespace_and_alphabet() {
        assert!(decode_base64("aGVs bG8=").is_err());
        assert!(decode_base64("aGVsbG8=\n").is_err());
        assert!(decode_base64("aGVs-G8=").is_err());
        assert!(decode_base64("a").is_err());
    }

    #[test]
    fn base64url_conversion() {
        let bytes = [0xfb, 0xff, 0xfe, 0x01];
        let url = encode_base64url(&bytes);
        assert_eq!(url, "-__-AQ");
        assert_eq!(base64url_to_base64(&url).unwrap(), "+//+AQ==");
        assert_eq!(base64_to_base64url("+//+AQ==").unwrap(), url);
        assert_eq!(decode_base64url(&url).unwrap(), bytes);
        assert!(decode_base64url("-__-AQ==").is_err());
        assert!(base64url_to_base64("abcde").is_err());
        assert!(base64url_to_base64("ab+c").is_err());
    }

    #[test]
    fn base64url_padding_must_fit_the_length() {
        assert_eq!(base64url_to_base64("-__-AQ==").unwrap(), "+//+AQ==");
        assert_eq!(base64url_to_base64("YWI=").unwrap(), "YWI=");
        for excess in ["-__-AQ===", "-__-AQ=", "YWI==", "YWJj=", "YWJj====", "YW===="] {
            assert!(
                matches!(base64url_to_base64(excess), Err(Error::InvalidInput(_))),
                "{excess}"
            );
        }
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let a = json!({"z": {"b": 2, "a": 1}, "y": [{"d": 1, "c": 2}]});
        let b = json!({"y": [{"c": 2, "d": 1}], "z": {"a": 1, "b": 2}});
        assert_eq!(to_canonical_json(&a), to_canonical_json(&b));
        assert_eq!(
            to_canonical_json(&a),
            r#"{"y":[{"c":2,"d":1}],"z":{"a":1,"b":2}}"#
        );
    }

    #[test]
    fn canonical_bytes_sort_struct_fields() {
        #[derive(Serialize)]
        struct Unsorted {
            zeta: u8,
            alpha: Vec<u8>,
        }

        let bytes = canonical_json_bytes(&Unsorted { zeta: 1, alpha: vec![2] }).unwrap();
        assert_eq!(bytes, br#"{"alpha":[2],"zeta":1}"#);
    }

    #[test]
    fn canonical_json_escapes_strings() {
        let value = json!({"k\"ey": "line\nbreak"});
        assert_eq!(to_canonical_json(&value), r#"{"k\"ey":"line\nbreak"}"#);
    }

    proptest! {
        #[test]
        fn base64_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(decode_base64(&encode_base64(&bytes)).unwrap(), bytes.clone());
            prop_assert_eq!(decode_base64url(&encode_base64url(&bytes)).unwrap(), bytes);
        }

        #[test]
        fn base64_rejects_truncated_padding(bytes in proptest::collection::vec(any::<u8>(), 1..64)) {
            let encoded = encode_base64(&bytes);
            if encoded.ends_with('=') {
                prop_assert!(decode_base64(encoded.trim_end_matches('=')).is_err());
            }
        }
    }
}
