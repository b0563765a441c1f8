//! EIP-712 typed structured data hashing.
//!
//! This module implements [EIP-712] the way the chain verifies it, so a hash
//! computed here matches the hash an injected wallet signs with
//! `eth_signTypedData_v4`.
//!
//! # Hash Computation
//!
//! A wallet signs
//! ```text
//! keccak256("\x19\x01" || domainSeparator || hashStruct(message))
//! ```
//!
//! `encodeType` lists the primary type followed by every struct type it
//! reaches (directly or through other structs), sorted by name. Message keys
//! that the schema does not declare are ignored; declared fields missing from
//! the message are an error.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use wallet_signer_core::eip712::{Eip712Domain, TypedData};
//!
//! let typed_data = TypedData::new(
//!     Eip712Domain {
//!         name: Some("DangoArbitraryMessage".to_string()),
//!         ..Eip712Domain::default()
//!     },
//!     json!({"Message": [{"name": "expire_at", "type": "string"}]}),
//!     "Message",
//!     json!({"expire_at": "1700000000000"}),
//! )
//! .unwrap();
//!
//! assert_eq!(typed_data.signing_hash().unwrap().len(), 32);
//! ```
//!
//! [EIP-712]: https://eips.ethereum.org/EIPS/eip-712

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{B256, U256, keccak256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;
use crate::encoding::decode_hex;
use crate::error::{Error, Result};

/// Name of the reserved domain type.
pub const DOMAIN_TYPE: &str = "EIP712Domain";

/// The EIP-712 domain separator parameters.
///
/// Only the fields that are present take part in the separator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    /// The human-readable name of the signing domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The version of the signing domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// The chain ID where signatures are valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,

    /// The address of the contract verifying the signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<Address>,

    /// A disambiguating salt, as 32 bytes of hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Eip712Domain {
    /// Returns the `EIP712Domain` field list for the fields that are present.
    #[must_use]
    pub fn type_fields(&self) -> Vec<TypeField> {
        let mut fields = Vec::with_capacity(5);
        if self.name.is_some() {
            fields.push(TypeField::new("name", "string"));
        }
        if self.version.is_some() {
            fields.push(TypeField::new("version", "string"));
        }
        if self.chain_id.is_some() {
            fields.push(TypeField::new("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            fields.push(TypeField::new("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            fields.push(TypeField::new("salt", "bytes32"));
        }
        fields
    }

    /// Computes the domain separator hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTypedData`] if the salt is not 32 bytes of hex.
    pub fn separator_hash(&self) -> Result<B256> {
        if let Some(ref salt) = self.salt {
            let len = decode_hex(salt)?.len();
            if len != 32 {
                return Err(Error::InvalidTypedData(format!(
                    "domain salt must be 32 bytes, got {len}"
                )));
            }
        }

        // Present fields are encoded like any other struct member.
        let fields = self.type_fields();
        let values = serde_json::to_value(self)?;
        let type_string = format!("{DOMAIN_TYPE}({})", join_fields(&fields));

        let mut encoded = keccak256(type_string.as_bytes()).to_vec();
        for field in &fields {
            encoded.extend_from_slice(&encode_primitive(&field.field_type, &values[&field.name])?);
        }
        Ok(keccak256(&encoded))
    }
}

/// A type field definition for EIP-712.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeField {
    /// The name of the field.
    pub name: String,

    /// The type of the field (e.g., "string", "uint256", "Coin0[]").
    #[serde(rename = "type")]
    pub field_type: String,
}

impl TypeField {
    /// Creates a field definition.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

/// Struct definitions keyed by type name.
pub type Types = BTreeMap<String, Vec<TypeField>>;

/// Typed structured data for EIP-712 signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    /// The struct definitions, usually including `EIP712Domain`.
    pub types: Types,

    /// The primary type being signed.
    pub primary_type: String,

    /// The EIP-712 domain.
    pub domain: Eip712Domain,

    /// The message data.
    pub message: Value,
}

impl TypedData {
    /// Creates typed data from a JSON `types` object.
    ///
    /// # Arguments
    ///
    /// * `domain` - The EIP-712 domain separator parameters
    /// * `types` - JSON object mapping type names to field lists
    /// * `primary_type` - The name of the primary type being signed
    /// * `message` - The message data as a JSON value
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTypedData`] if `types` is not an object of
    /// `{name, type}` field lists.
    pub fn new(
        domain: Eip712Domain,
        types: Value,
        primary_type: impl Into<String>,
        message: Value,
    ) -> Result<Self> {
        let types: Types = serde_json::from_value(types)
            .map_err(|e| Error::InvalidTypedData(format!("malformed types: {e}")))?;
        Ok(Self {
            types,
            primary_type: primary_type.into(),
            domain,
            message,
        })
    }

    /// Assembles typed data from a schema without `EIP712Domain`, adding
    /// the domain type that matches `domain`.
    #[must_use]
    pub fn with_domain_type(
        mut types: Types,
        primary_type: impl Into<String>,
        domain: Eip712Domain,
        message: Value,
    ) -> Self {
        types.insert(DOMAIN_TYPE.to_string(), domain.type_fields());
        Self {
            types,
            primary_type: primary_type.into(),
            domain,
            message,
        }
    }

    /// Computes the signing hash for this typed data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedType`] if a referenced type has no
    /// definition, or [`Error::InvalidTypedData`] if the message does not fit
    /// the schema.
    pub fn signing_hash(&self) -> Result<B256> {
        let domain_separator = self.domain.separator_hash()?;
        let struct_hash = self.hash_struct(&self.primary_type, &self.message)?;

        let mut data = Vec::with_capacity(2 + 32 + 32);
        data.extend_from_slice(&[0x19, 0x01]);
        data.extend_from_slice(domain_separator.as_slice());
        data.extend_from_slice(struct_hash.as_slice());

        Ok(keccak256(&data))
    }

    /// Computes `hashStruct(message)` for the primary type.
    ///
    /// # Errors
    ///
    /// Same as [`Self::signing_hash`].
    pub fn message_hash(&self) -> Result<B256> {
        self.hash_struct(&self.primary_type, &self.message)
    }

    /// `hashStruct(s) = keccak256(typeHash || encodeData(s))`
    fn hash_struct(&self, type_name: &str, data: &Value) -> Result<B256> {
        let type_hash = keccak256(self.encode_type(type_name)?.as_bytes());
        let encoded_data = self.encode_data(type_name, data)?;

        let mut buf = Vec::with_capacity(32 + encoded_data.len());
        buf.extend_from_slice(type_hash.as_slice());
        buf.extend_from_slice(&encoded_data);

        Ok(keccak256(&buf))
    }

    /// Encodes a type and all of its dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedType`] if `type_name` has no definition.
    pub fn encode_type(&self, type_name: &str) -> Result<String> {
        let mut deps = BTreeSet::new();
        self.collect_dependencies(type_name, &mut deps)?;
        deps.remove(type_name);

        let mut result = String::new();
        for name in std::iter::once(type_name).chain(deps.iter().map(String::as_str)) {
            let fields = self.fields(name)?;
            result.push_str(name);
            result.push('(');
            result.push_str(&join_fields(fields));
            result.push(')');
        }
        Ok(result)
    }

    fn collect_dependencies(&self, type_name: &str, deps: &mut BTreeSet<String>) -> Result<()> {
        if !deps.insert(type_name.to_string()) {
            return Ok(());
        }
        for field in self.fields(type_name)? {
            let base = base_type(&field.field_type);
            if self.types.contains_key(base) {
                self.collect_dependencies(base, deps)?;
            }
        }
        Ok(())
    }

    fn fields(&self, type_name: &str) -> Result<&[TypeField]> {
        self.types
            .get(type_name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UndefinedType(type_name.to_string()))
    }

    fn encode_data(&self, type_name: &str, data: &Value) -> Result<Vec<u8>> {
        let fields = self.fields(type_name)?;

        let obj = data.as_object().ok_or_else(|| {
            Error::InvalidTypedData(format!("expected object for {type_name}"))
        })?;

        let mut encoded = Vec::with_capacity(32 * fields.len());
        for field in fields {
            let value = obj.get(&field.name).ok_or_else(|| {
                Error::InvalidTypedData(format!("{type_name} is missing field {}", field.name))
            })?;
            encoded.extend_from_slice(&self.encode_field(&field.field_type, value)?);
        }

        Ok(encoded)
    }

    fn encode_field(&self, field_type: &str, value: &Value) -> Result<[u8; 32]> {
        if let Some(item_type) = array_item_type(field_type) {
            let items = value
                .as_array()
                .ok_or_else(|| Error::InvalidTypedData(format!("expected array for {field_type}")))?;

            let mut items_encoded = Vec::with_capacity(32 * items.len());
            for item in items {
                items_encoded.extend_from_slice(&self.encode_field(item_type, item)?);
            }
            return Ok(keccak256(&items_encoded).0);
        }

        if self.types.contains_key(field_type) {
            return Ok(self.hash_struct(field_type, value)?.0);
        }

        encode_primitive(field_type, value)
    }

    /// Parses typed data from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if parsing fails.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses typed data from UTF-8 JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if parsing fails.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serializes the typed data to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn join_fields(fields: &[TypeField]) -> String {
    fields
        .iter()
        .map(|f| format!("{} {}", f.field_type, f.name))
        .collect::<Vec<_>>()
        .join(",")
}

/// Strips every array suffix: `Foo[][3]` becomes `Foo`.
fn base_type(field_type: &str) -> &str {
    field_type.split('[').next().unwrap_or(field_type)
}

/// Strips the outermost array suffix: `Foo[2][]` becomes `Foo[2]`.
fn array_item_type(field_type: &str) -> Option<&str> {
    if !field_type.ends_with(']') {
        return None;
    }
    field_type.rfind('[').map(|i| &field_type[..i])
}

fn encode_primitive(field_type: &str, value: &Value) -> Result<[u8; 32]> {
    match field_type {
        "string" => {
            let s = value
                .as_str()
                .ok_or_else(|| Error::InvalidTypedData("expected string".to_string()))?;
            Ok(keccak256(s.as_bytes()).0)
        }
        "bytes" => {
            let bytes = bytes_value(value)?;
            Ok(keccak256(&bytes).0)
        }
        "bool" => {
            let b = value
                .as_bool()
                .ok_or_else(|| Error::InvalidTypedData("expected bool".to_string()))?;
            let mut buf = [0u8; 32];
            buf[31] = u8::from(b);
            Ok(buf)
        }
        "address" => {
            let s = value
                .as_str()
                .ok_or_else(|| Error::InvalidTypedData("expected address string".to_string()))?;
            let address = Address::from_hex(s)
                .map_err(|e| Error::InvalidTypedData(format!("invalid address {s}: {e}")))?;
            let mut buf = [0u8; 32];
            buf[12..].copy_from_slice(address.as_bytes());
            Ok(buf)
        }
        t if t.starts_with("bytes") => {
            let size = type_width(t, "bytes", 1, 32)?;
            let bytes = bytes_value(value)?;
            if bytes.len() > size {
                return Err(Error::InvalidTypedData(format!(
                    "bytes too long for {t}: {} > {size}",
                    bytes.len()
                )));
            }
            let mut buf = [0u8; 32];
            buf[..bytes.len()].copy_from_slice(&bytes);
            Ok(buf)
        }
        t if t.starts_with("uint") => {
            let bits = type_width(t, "uint", 8, 256)?;
            let (negative, magnitude) = parse_integer(value)?;
            if negative && !magnitude.is_zero() {
                return Err(Error::InvalidTypedData(format!("negative value for {t}")));
            }
            if magnitude.bit_len() > bits {
                return Err(Error::InvalidTypedData(format!("value out of range for {t}")));
            }
            Ok(magnitude.to_be_bytes::<32>())
        }
        t if t.starts_with("int") => {
            let bits = type_width(t, "int", 8, 256)?;
            let (negative, magnitude) = parse_integer(value)?;
            let min_magnitude = U256::from(1u8) << (bits - 1);
            let in_range = if negative {
                magnitude <= min_magnitude
            } else {
                magnitude < min_magnitude
            };
            if !in_range {
                return Err(Error::InvalidTypedData(format!("value out of range for {t}")));
            }
            let word = if negative {
                U256::ZERO.wrapping_sub(magnitude)
            } else {
                magnitude
            };
            Ok(word.to_be_bytes::<32>())
        }
        _ => Err(Error::UndefinedType(field_type.to_string())),
    }
}

/// Parses the width suffix of `uintN`, `intN` or `bytesN`; a bare `uint` or
/// `int` means 256 bits.
fn type_width(t: &str, prefix: &str, unit: usize, max: usize) -> Result<usize> {
    let suffix = &t[prefix.len()..];
    if suffix.is_empty() && prefix != "bytes" {
        return Ok(256);
    }
    let n: usize = suffix
        .parse()
        .map_err(|_| Error::UndefinedType(t.to_string()))?;
    if n == 0 || n > max || n % unit != 0 {
        return Err(Error::UndefinedType(t.to_string()));
    }
    Ok(n)
}

fn bytes_value(value: &Value) -> Result<Vec<u8>> {
    let s = value
        .as_str()
        .ok_or_else(|| Error::InvalidTypedData("expected hex string".to_string()))?;
    decode_hex(s)
}

/// Parses a JSON number, decimal string or `0x` hex string into a sign and
/// magnitude.
fn parse_integer(value: &Value) -> Result<(bool, U256)> {
    if let Some(n) = value.as_u64() {
        return Ok((false, U256::from(n)));
    }
    if let Some(n) = value.as_i64() {
        return Ok((n < 0, U256::from(n.unsigned_abs())));
    }
    if value.is_number() {
        return Err(Error::InvalidTypedData(format!(
            "expected an integer, got {value}"
        )));
    }

    let s = value
        .as_str()
        .ok_or_else(|| Error::InvalidTypedData(format!("expected an integer, got {value}")))?;
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || digits == "0x" {
        return Err(Error::InvalidTypedData(format!("invalid integer: {s:?}")));
    }
    let magnitude = match digits.strip_prefix("0x") {
        Some(hex_digits) => U256::from_str_radix(hex_digits, 16),
        None => U256::from_str_radix(digits, 10),
    }
    .map_err(|_| Error::InvalidTypedData(format!("invalid integer: {s}")))?;

    Ok((negative, magnitude))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn mail() -> TypedData {
        let domain = Eip712Domain {
            name: Some("Ether Mail".to_string()),
            version: Some("1".to_string()),
            chain_id: Some(1),
            verifying_contract: Some(
                Address::from_hex("0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC").unwrap(),
            ),
            salt: None,
        };

        let types = json!({
            "Person": [
                {"name": "name", "type": "string"},
                {"name": "wallet", "type": "address"}
            ],
            "Mail": [
                {"name": "from", "type": "Person"},
                {"name": "to", "type": "Person"},
                {"name": "contents", "type": "string"}
            ]
        });

        let message = json!({
            "from": {"name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"},
            "to": {"name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"},
            "contents": "Hello, Bob!"
        });

        TypedData::new(domain, types, "Mail", message).unwrap()
    }

    #[test]
    fn ether_mail_reference_hashes() {
        let typed_data = mail();

        assert_eq!(
            typed_data.encode_type("Mail").unwrap(),
            "Mail(Person from,Person to,string contents)Person(string name,address wallet)"
        );
        assert_eq!(
            hex::encode(typed_data.domain.separator_hash().unwrap()),
            "f2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f"
        );
        assert_eq!(
            hex::encode(typed_data.message_hash().unwrap()),
            "c52c0ee5d84264471806290a3f2c4cecfc5490626bf912d01f240d7a274b371e"
        );
        assert_eq!(
            hex::encode(typed_data.signing_hash().unwrap()),
            "be609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2"
        );
    }

    #[test]
    fn encode_type_includes_transitive_dependencies() {
        let types = json!({
            "Root": [{"name": "a", "type": "Alpha[]"}],
            "Alpha": [{"name": "b", "type": "Beta"}],
            "Beta": [{"name": "c", "type": "Charlie"}, {"name": "root", "type": "Root"}],
            "Charlie": [{"name": "x", "type": "uint8"}]
        });
        let typed_data =
            TypedData::new(Eip712Domain::default(), types, "Root", json!({})).unwrap();

        assert_eq!(
            typed_data.encode_type("Root").unwrap(),
            "Root(Alpha[] a)Alpha(Beta b)Beta(Charlie c,Root root)Charlie(uint8 x)"
        );
    }

    #[test]
    fn extra_message_keys_are_ignored() {
        let mut typed_data = mail();
        let base = typed_data.signing_hash().unwrap();

        typed_data.message["unexpected"] = json!("ignored");
        typed_data.message["from"]["extra"] = json!(1);

        assert_eq!(typed_data.signing_hash().unwrap(), base);
    }

    #[test]
    fn missing_field_is_an_error() {
        let mut typed_data = mail();
        typed_data.message.as_object_mut().unwrap().remove("contents");

        assert!(matches!(
            typed_data.signing_hash(),
            Err(Error::InvalidTypedData(_))
        ));
    }

    #[test]
    fn undefined_type_error() {
        let typed_data = TypedData::new(
            Eip712Domain::default(),
            json!({}),
            "NonExistent",
            json!({"foo": "bar"}),
        )
        .unwrap();

        assert!(matches!(
            typed_data.signing_hash(),
            Err(Error::UndefinedType(_))
        ));
    }

    #[test]
    fn domain_uses_only_present_fields() {
        let named = Eip712Domain {
            name: Some("DangoArbitraryMessage".to_string()),
            ..Eip712Domain::default()
        };
        assert_eq!(
            hex::encode(named.separator_hash().unwrap()),
            "452d59eb36f371f570cc7e122ad995f2e9ce00b57fddb9dab8d7ce161ab76aef"
        );

        let with_salt = Eip712Domain {
            salt: Some("0x01".to_string()),
            ..named
        };
        assert!(matches!(
            with_salt.separator_hash(),
            Err(Error::InvalidTypedData(_))
        ));
    }

    #[test]
    fn empty_and_nested_arrays() {
        let types = json!({
            "Batch": [
                {"name": "empty", "type": "uint256[]"},
                {"name": "grid", "type": "uint8[][]"}
            ]
        });
        let typed_data = TypedData::new(
            Eip712Domain::default(),
            types,
            "Batch",
            json!({"empty": [], "grid": [[1, 2], []]}),
        )
        .unwrap();

        let empty = keccak256(b"");
        let mut row = [0u8; 64];
        row[31] = 1;
        row[63] = 2;
        let grid = keccak256([keccak256(row).0, empty.0].concat());

        let mut expected = keccak256(
            "Batch(uint256[] empty,uint8[][] grid)".as_bytes(),
        )
        .to_vec();
        expected.extend_from_slice(empty.as_slice());
        expected.extend_from_slice(grid.as_slice());

        assert_eq!(typed_data.message_hash().unwrap(), keccak256(expected));
    }

    #[test]
    fn integers_encode_in_twos_complement() {
        assert_eq!(
            encode_primitive("int256", &json!(-1)).unwrap(),
            [0xff; 32]
        );
        assert_eq!(
            encode_primitive("int8", &json!("-128")).unwrap(),
            U256::ZERO.wrapping_sub(U256::from(128)).to_be_bytes::<32>()
        );
        assert!(encode_primitive("int8", &json!(128)).is_err());
        assert!(encode_primitive("int8", &json!(-129)).is_err());

        assert_eq!(
            encode_primitive("uint256", &json!("0x2a")).unwrap(),
            encode_primitive("uint256", &json!(42)).unwrap()
        );
        assert!(encode_primitive("uint8", &json!(256)).is_err());
        assert!(encode_primitive("uint32", &json!(-1)).is_err());
        assert!(encode_primitive("uint256", &json!(1.5)).is_err());
    }

    #[test]
    fn address_is_padded_not_hashed() {
        let encoded = encode_primitive(
            "address",
            &json!("0x00000000000000000000000000000000000000Ff"),
        )
        .unwrap();
        assert_eq!(encoded[..31], [0u8; 31]);
        assert_eq!(encoded[31], 0xff);
        assert!(encode_primitive("address", &json!("0x1234")).is_err());
    }

    #[test]
    fn fixed_bytes_are_right_padded() {
        let encoded = encode_primitive("bytes4", &json!("0xdeadbeef")).unwrap();
        assert_eq!(&encoded[..4], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(encoded[4..], [0u8; 28]);
        assert!(encode_primitive("bytes2", &json!("0xdeadbeef")).is_err());
        assert!(encode_primitive("bytes33", &json!("0x00")).is_err());
    }

    #[test]
    fn typed_data_json_roundtrip() {
        let original = mail();
        let recovered = TypedData::from_json(&original.to_json().unwrap()).unwrap();

        assert_eq!(recovered, original);
        assert_eq!(
            original.signing_hash().unwrap(),
            recovered.signing_hash().unwrap()
        );
    }
}
