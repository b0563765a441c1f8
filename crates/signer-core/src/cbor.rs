//! WebAuthn attestation parsing.
//!
//! WebAuthn returns the new credential's public key inside a CBOR-encoded
//! attestation object:
//!
//! ```text
//! attestationObject = { "fmt": tstr, "attStmt": map, "authData": bstr }
//! authData          = rpIdHash(32) || flags(1) || signCount(4)
//!                     || aaguid(16) || credIdLen(2) || credId || coseKey
//! coseKey (P-256)   = { 1: 2, 3: -7, -1: 1, -2: x(32), -3: y(32) }
//! ```
//!
//! CBOR items are decoded with [`ciborium`]. `authData` is a fixed binary
//! layout rather than CBOR, so it is sliced by hand.
//!
//! # Example
//!
//! ```ignore
//! use wallet_signer_core::cbor::decode_attestation_public_key;
//!
//! let point = decode_attestation_public_key(&attestation_object)?;
//! assert_eq!(point[0], 0x04);
//! ```

use ciborium::Value;

use crate::error::{Error, Result};

/// Length of a CBOR-encoded P-256 COSE key with 32-byte coordinates.
pub const COSE_P256_KEY_LEN: usize = 77;

const COSE_KTY: i128 = 1;
const COSE_ALG: i128 = 3;
const COSE_X: i128 = -2;
const COSE_Y: i128 = -3;

/// Authenticator data flag: attested credential data included.
const FLAG_ATTESTED: u8 = 0x40;

/// Decodes one item from the front of `reader`, advancing it.
fn read_item(reader: &mut &[u8]) -> Result<Value> {
    ciborium::de::from_reader(reader).map_err(|e| Error::CredentialCreation(format!("CBOR: {e}")))
}

/// Decodes exactly one item spanning the whole input.
fn read_exact(bytes: &[u8]) -> Result<Value> {
    let mut reader = bytes;
    let value = read_item(&mut reader)?;
    if !reader.is_empty() {
        return Err(Error::CredentialCreation(format!(
            "CBOR: {} trailing bytes",
            reader.len()
        )));
    }
    Ok(value)
}

fn map_entry<'a>(map: &'a Value, matches: impl Fn(&Value) -> bool) -> Option<&'a Value> {
    map.as_map()?
        .iter()
        .find(|(key, _)| matches(key))
        .map(|(_, value)| value)
}

fn int_entry(map: &Value, label: i128) -> Option<&Value> {
    map_entry(map, |key| {
        key.as_integer().is_some_and(|i| i128::from(i) == label)
    })
}

/// A COSE elliptic-curve public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    /// Key type (`2` for EC2).
    pub kty: Option<i128>,
    /// Algorithm (`-7` for ES256).
    pub alg: Option<i128>,
    pub x: [u8; 32],
    pub y: [u8; 32],
}

impl CoseKey {
    /// Extracts the EC2 coordinates from a decoded COSE key map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialCreation`] if either coordinate is missing
    /// or not 32 bytes long.
    pub fn from_cbor(value: &Value) -> Result<Self> {
        let coordinate = |label: i128, name: &str| -> Result<[u8; 32]> {
            int_entry(value, label)
                .and_then(Value::as_bytes)
                .and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok())
                .ok_or_else(|| {
                    Error::CredentialCreation(format!("COSE key has no 32-byte {name} coordinate"))
                })
        };
        let integer = |label: i128| {
            int_entry(value, label)
                .and_then(Value::as_integer)
                .map(i128::from)
        };

        Ok(Self {
            kty: integer(COSE_KTY),
            alg: integer(COSE_ALG),
            x: coordinate(COSE_X, "x")?,
            y: coordinate(COSE_Y, "y")?,
        })
    }

    /// Returns the uncompressed SEC1 point `0x04 || x || y`.
    #[must_use]
    pub fn to_uncompressed_point(&self) -> [u8; 65] {
        let mut point = [0u8; 65];
        point[0] = 0x04;
        point[1..33].copy_from_slice(&self.x);
        point[33..].copy_from_slice(&self.y);
        point
    }
}

/// Parsed WebAuthn authenticator data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    /// SHA-256 of the relying party id.
    pub rp_id_hash: [u8; 32],
    pub flags: u8,
    pub sign_count: u32,
    /// Present on registration.
    pub attested_credential: Option<AttestedCredential>,
}

/// The attested credential section of authenticator data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredential {
    /// Authenticator model identifier.
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    pub public_key: CoseKey,
}

/// Parses authenticator data, including attested credential data if flagged.
///
/// # Errors
///
/// Returns [`Error::CredentialCreation`] if the data is truncated or the COSE
/// key is malformed.
pub fn parse_authenticator_data(data: &[u8]) -> Result<AuthenticatorData> {
    const HEADER_LEN: usize = 37;

    if data.len() < HEADER_LEN {
        return Err(Error::CredentialCreation(format!(
            "authenticator data too short: {} bytes",
            data.len()
        )));
    }

    let mut rp_id_hash = [0u8; 32];
    rp_id_hash.copy_from_slice(&data[..32]);
    let flags = data[32];
    let sign_count = u32::from_be_bytes([data[33], data[34], data[35], data[36]]);

    let attested_credential = if flags & FLAG_ATTESTED != 0 {
        let rest = &data[HEADER_LEN..];
        if rest.len() < 18 {
            return Err(Error::CredentialCreation(
                "attested credential data truncated".to_string(),
            ));
        }

        let mut aaguid = [0u8; 16];
        aaguid.copy_from_slice(&rest[..16]);
        let id_len = usize::from(u16::from_be_bytes([rest[16], rest[17]]));
        let rest = &rest[18..];
        if rest.len() < id_len {
            return Err(Error::CredentialCreation(
                "credential id truncated".to_string(),
            ));
        }

        // Extensions may follow the key.
        let mut cose = &rest[id_len..];
        let public_key = CoseKey::from_cbor(&read_item(&mut cose)?)?;

        Some(AttestedCredential {
            aaguid,
            credential_id: rest[..id_len].to_vec(),
            public_key,
        })
    } else {
        None
    };

    Ok(AuthenticatorData {
        rp_id_hash,
        flags,
        sign_count,
        attested_credential,
    })
}

/// Extracts `authData` from an attestation object.
///
/// # Errors
///
/// Returns [`Error::CredentialCreation`] if the object is not a CBOR map with
/// a byte-string `authData` entry.
pub fn attestation_auth_data(attestation_object: &[u8]) -> Result<Vec<u8>> {
    let outer = read_exact(attestation_object)?;
    map_entry(&outer, |key| key.as_text() == Some("authData"))
        .and_then(Value::as_bytes)
        .cloned()
        .ok_or_else(|| Error::CredentialCreation("attestation has no authData".to_string()))
}

/// Decodes the P-256 public key of a new credential from its attestation
/// object.
///
/// The COSE key of a P-256 credential occupies the last
/// [`COSE_P256_KEY_LEN`] bytes of `authData` when no extensions are present.
///
/// # Returns
///
/// The uncompressed SEC1 point `0x04 || x || y`.
///
/// # Errors
///
/// Returns [`Error::CredentialCreation`] if the attestation is malformed.
pub fn decode_attestation_public_key(attestation_object: &[u8]) -> Result<[u8; 65]> {
    let auth_data = attestation_auth_data(attestation_object)?;
    if auth_data.len() < COSE_P256_KEY_LEN {
        return Err(Error::CredentialCreation(format!(
            "authData too short for a P-256 key: {} bytes",
            auth_data.len()
        )));
    }

    let tail = &auth_data[auth_data.len() - COSE_P256_KEY_LEN..];
    Ok(CoseKey::from_cbor(&read_exact(tail)?)?.to_uncompressed_point())
}
