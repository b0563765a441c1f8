//! EIP-712 schemas for transactions and arbitrary payloads.
//!
//! Injected wallets can only sign typed data, so every transaction is
//! re-expressed as an EIP-712 document before signing. The schema depends on
//! the data: variable-length maps such as transfer recipients or funds are
//! flattened into one field per key, so two transfers to different
//! recipients have different schemas.
//!
//! The schema used to hash is the schema embedded in the signed document;
//! the chain re-hashes with the embedded schema, never with its own.
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::address::Address;
//! use wallet_signer_core::sign_doc::{Coins, Message, Metadata};
//! use wallet_signer_core::typed_data::{TxTypedMessage, TypedDataParameter, compose_tx_typed_data};
//! use wallet_signer_core::eip712::Eip712Domain;
//!
//! let messages = vec![Message::transfer([(
//!     Address::new([7u8; 20]),
//!     Coins::from([("uusdc".to_string(), "100".to_string())]),
//! )])];
//! let param = TypedDataParameter::for_messages(&messages).unwrap();
//!
//! let tx = TxTypedMessage {
//!     messages,
//!     gas_limit: 100_000,
//!     metadata: Metadata::new("alice", "dev-1", 0),
//! };
//! let domain = Eip712Domain {
//!     name: Some("localhost".to_string()),
//!     verifying_contract: Some(Address::new([1u8; 20])),
//!     ..Eip712Domain::default()
//! };
//!
//! let typed_data = compose_tx_typed_data(&tx, domain, &param).unwrap();
//! assert_eq!(typed_data.primary_type, "Message");
//! assert!(typed_data.types.contains_key("Coin0"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::eip712::{Eip712Domain, TypeField, TypedData, Types};
use crate::error::{Error, Result};
use crate::sign_doc::{Coins, Message, Metadata, SignDoc};

/// Primary type of every composed document.
pub const PRIMARY_TYPE: &str = "Message";

/// The schema of one transaction message: the `TxMessage` fields plus the
/// struct types they reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataParameter {
    /// Fields of `TxMessage`.
    pub fields: Vec<TypeField>,
    pub extra_types: Types,
}

impl TypedDataParameter {
    /// Infers the schema of a single message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTypedData`] if the message contains floats,
    /// nulls inside arrays or arrays of mixed types.
    pub fn for_message(message: &Message) -> Result<Self> {
        let mut types = Types::new();
        let struct_name = match message {
            Message::Transfer(recipients) => {
                let mut fields = Vec::with_capacity(recipients.len());
                for (i, (recipient, coins)) in recipients.iter().enumerate() {
                    let coin_type = format!("Coin{i}");
                    types.insert(coin_type.clone(), coin_fields(coins));
                    fields.push(TypeField::new(recipient.to_hex(), coin_type));
                }
                insert_struct(&mut types, "Transfer", fields)
            }
            Message::Execute(msg) => {
                let mut fields = vec![TypeField::new("contract", "address")];
                push_inferred(&mut fields, &mut types, "msg", "ExecuteMsg", &msg.msg)?;
                fields.push(TypeField::new("funds", insert_struct(&mut types, "Funds", coin_fields(&msg.funds))));
                insert_struct(&mut types, "Execute", fields)
            }
            Message::Instantiate(msg) => {
                let mut fields = vec![TypeField::new("code_hash", "string")];
                push_inferred(&mut fields, &mut types, "msg", "InstantiateMsg", &msg.msg)?;
                fields.push(TypeField::new("salt", "string"));
                if msg.label.is_some() {
                    fields.push(TypeField::new("label", "string"));
                }
                if msg.admin.is_some() {
                    fields.push(TypeField::new("admin", "address"));
                }
                fields.push(TypeField::new("funds", insert_struct(&mut types, "Funds", coin_fields(&msg.funds))));
                insert_struct(&mut types, "Instantiate", fields)
            }
            Message::Migrate(msg) => {
                let mut fields = vec![
                    TypeField::new("contract", "address"),
                    TypeField::new("new_code_hash", "string"),
                ];
                push_inferred(&mut fields, &mut types, "msg", "MigrateMsg", &msg.msg)?;
                insert_struct(&mut types, "Migrate", fields)
            }
            Message::Upload(_) => {
                insert_struct(&mut types, "Upload", vec![TypeField::new("code", "string")])
            }
            Message::Configure(value) => match infer_type("Configure", value, &mut types)? {
                Some(name) => name,
                None => insert_struct(&mut types, "Configure", Vec::new()),
            },
        };

        Ok(Self {
            fields: vec![TypeField::new(message.kind(), struct_name)],
            extra_types: types,
        })
    }

    /// Infers the one schema shared by all messages of a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTypedData`] if there are no messages, if any
    /// message fails inference, or if two messages need different schemas.
    pub fn for_messages(messages: &[Message]) -> Result<Self> {
        let (first, rest) = messages.split_first().ok_or_else(|| {
            Error::InvalidTypedData("a transaction needs at least one message".to_string())
        })?;

        let param = Self::for_message(first)?;
        for (i, message) in rest.iter().enumerate() {
            if Self::for_message(message)? != param {
                return Err(Error::InvalidTypedData(format!(
                    "message {} does not share the schema of message 0",
                    i + 1
                )));
            }
        }
        Ok(param)
    }
}

/// The parts of a sign doc that go into its typed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxTypedMessage {
    pub messages: Vec<Message>,
    pub gas_limit: u64,
    pub metadata: Metadata,
}

impl From<&SignDoc> for TxTypedMessage {
    fn from(doc: &SignDoc) -> Self {
        Self {
            messages: doc.messages.clone(),
            gas_limit: doc.gas_limit,
            metadata: doc.data.clone(),
        }
    }
}

/// An arbitrary payload with its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitraryTypedMessage {
    pub message: Value,
    /// Struct definitions, not including `EIP712Domain`.
    pub types: Types,
    /// The root struct of `message`.
    pub primary_type: String,
}

/// Builds the typed data a wallet signs for a transaction.
///
/// # Errors
///
/// Returns [`Error::JsonError`] if a message cannot be serialized.
pub fn compose_tx_typed_data(
    tx: &TxTypedMessage,
    domain: Eip712Domain,
    param: &TypedDataParameter,
) -> Result<TypedData> {
    let mut metadata_fields = vec![
        TypeField::new("username", "string"),
        TypeField::new("chain_id", "string"),
        TypeField::new("nonce", "uint32"),
    ];
    let mut metadata = Map::new();
    metadata.insert("username".into(), json!(tx.metadata.username));
    metadata.insert("chain_id".into(), json!(tx.metadata.chain_id));
    metadata.insert("nonce".into(), json!(tx.metadata.nonce));
    if let Some(ref expiry) = tx.metadata.expiry {
        metadata_fields.push(TypeField::new("expiry", "string"));
        metadata.insert("expiry".into(), json!(expiry));
    }

    let mut types = param.extra_types.clone();
    types.insert(
        PRIMARY_TYPE.to_string(),
        vec![
            TypeField::new("metadata", "Metadata"),
            TypeField::new("gas_limit", "uint32"),
            TypeField::new("messages", "TxMessage[]"),
        ],
    );
    types.insert("Metadata".to_string(), metadata_fields);
    types.insert("TxMessage".to_string(), param.fields.clone());

    let message = json!({
        "metadata": metadata,
        "gas_limit": tx.gas_limit,
        "messages": serde_json::to_value(&tx.messages)?,
    });
    Ok(TypedData::with_domain_type(types, PRIMARY_TYPE, domain, message))
}

/// Builds the typed data for an arbitrary payload, in a domain that only
/// carries a name.
#[must_use]
pub fn compose_arbitrary_typed_data(
    payload: &ArbitraryTypedMessage,
    domain_name: impl Into<String>,
) -> TypedData {
    let domain = Eip712Domain {
        name: Some(domain_name.into()),
        ..Eip712Domain::default()
    };
    TypedData::with_domain_type(
        payload.types.clone(),
        payload.primary_type.clone(),
        domain,
        payload.message.clone(),
    )
}

fn coin_fields(coins: &Coins) -> Vec<TypeField> {
    coins
        .keys()
        .map(|denom| TypeField::new(denom.clone(), "string"))
        .collect()
}

fn push_inferred(
    fields: &mut Vec<TypeField>,
    types: &mut Types,
    field: &str,
    hint: &str,
    value: &Value,
) -> Result<()> {
    if let Some(ty) = infer_type(hint, value, types)? {
        fields.push(TypeField::new(field, ty));
    }
    Ok(())
}

/// Infers the EIP-712 type of a JSON value; `None` for `null`, which is
/// left out of the schema.
fn infer_type(hint: &str, value: &Value, types: &mut Types) -> Result<Option<String>> {
    let ty = match value {
        Value::Null => return Ok(None),
        Value::Bool(_) => "bool".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Number(n) if n.is_u64() => "uint256".to_string(),
        Value::Number(n) if n.is_i64() => "int256".to_string(),
        Value::Number(n) => {
            return Err(Error::InvalidTypedData(format!(
                "{hint}: floats cannot be signed as typed data, got {n}"
            )));
        }
        Value::Array(items) => {
            let mut item_type: Option<String> = None;
            for item in items {
                let ty = infer_type(hint, item, types)?.ok_or_else(|| {
                    Error::InvalidTypedData(format!("{hint}: arrays cannot contain null"))
                })?;
                match item_type {
                    None => item_type = Some(ty),
                    Some(ref prev) if *prev == ty => {}
                    Some(ref prev) => {
                        return Err(Error::InvalidTypedData(format!(
                            "{hint}: array mixes {prev} and {ty}"
                        )));
                    }
                }
            }
            format!("{}[]", item_type.as_deref().unwrap_or("string"))
        }
        Value::Object(map) => infer_struct(hint, map, types)?,
    };
    Ok(Some(ty))
}

fn infer_struct(name: &str, map: &Map<String, Value>, types: &mut Types) -> Result<String> {
    let mut fields = Vec::with_capacity(map.len());
    for (i, (key, value)) in map.iter().enumerate() {
        let hint = child_name(name, key, i);
        if let Some(ty) = infer_type(&hint, value, types)? {
            fields.push(TypeField::new(key.clone(), ty));
        }
    }
    Ok(insert_struct(types, name, fields))
}

/// Inserts a struct under `base`, or `base2`, `base3`, ... if the name is
/// taken by a struct with different fields. Identical structs are shared.
fn insert_struct(types: &mut Types, base: &str, fields: Vec<TypeField>) -> String {
    let mut name = base.to_string();
    let mut n = 1;
    loop {
        match types.get(&name) {
            None => {
                types.insert(name.clone(), fields);
                return name;
            }
            Some(existing) if *existing == fields => return name,
            Some(_) => {
                n += 1;
                name = format!("{base}{n}");
            }
        }
    }
}

/// Names the struct for a nested object: the parent name followed by the
/// key in PascalCase, or by the field position when the key has no usable
/// letters (addresses, denoms starting with digits).
fn child_name(parent: &str, key: &str, index: usize) -> String {
    let pascal: String = key
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
                .unwrap_or_default()
        })
        .collect();

    match pascal.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => format!("{parent}{pascal}"),
        _ => format!("{parent}{index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::eip712::DOMAIN_TYPE;
    use crate::sign_doc::{MsgExecute, MsgInstantiate, MsgMigrate, MsgUpload};

    fn field(name: &str, ty: &str) -> TypeField {
        TypeField::new(name, ty)
    }

    #[test]
    fn transfer_schema_flattens_recipients_and_denoms() {
        let a = Address::new([0xaa; 20]);
        let b = Address::new([0xbb; 20]);
        let message = Message::transfer([
            (b, Coins::from([("uatom".to_string(), "1".to_string())])),
            (
                a,
                Coins::from([
                    ("uusdc".to_string(), "2".to_string()),
                    ("bridge/eth".to_string(), "3".to_string()),
                ]),
            ),
        ]);

        let param = TypedDataParameter::for_message(&message).unwrap();

        assert_eq!(param.fields, vec![field("transfer", "Transfer")]);
        assert_eq!(
            param.extra_types["Transfer"],
            vec![field(&a.to_hex(), "Coin0"), field(&b.to_hex(), "Coin1")]
        );
        assert_eq!(
            param.extra_types["Coin0"],
            vec![field("bridge/eth", "string"), field("uusdc", "string")]
        );
        assert_eq!(param.extra_types["Coin1"], vec![field("uatom", "string")]);
    }

    #[test]
    fn execute_schema_infers_msg() {
        let message = Message::Execute(MsgExecute {
            contract: Address::new([1u8; 20]),
            msg: json!({
                "swap": {
                    "route": [{"pool": 1, "out": "uusdc"}, {"pool": 2, "out": "uatom"}],
                    "minimum_output": null,
                    "slippage": -3,
                    "exact": true
                }
            }),
            funds: Coins::from([("uusdc".to_string(), "10".to_string())]),
        });

        let param = TypedDataParameter::for_message(&message).unwrap();
        let types = &param.extra_types;

        assert_eq!(
            types["Execute"],
            vec![
                field("contract", "address"),
                field("msg", "ExecuteMsg"),
                field("funds", "Funds")
            ]
        );
        assert_eq!(types["ExecuteMsg"], vec![field("swap", "ExecuteMsgSwap")]);
        assert_eq!(
            types["ExecuteMsgSwap"],
            vec![
                field("exact", "bool"),
                field("route", "ExecuteMsgSwapRoute[]"),
                field("slippage", "int256")
            ]
        );
        assert_eq!(
            types["ExecuteMsgSwapRoute"],
            vec![field("out", "string"), field("pool", "uint256")]
        );
        assert_eq!(types["Funds"], vec![field("uusdc", "string")]);
    }

    #[test]
    fn instantiate_and_migrate_schemas() {
        let instantiate = Message::Instantiate(MsgInstantiate {
            code_hash: "ab".repeat(32),
            msg: json!({"owner": "alice"}),
            salt: b"salt".to_vec(),
            label: Some("vault".to_string()),
            admin: None,
            funds: Coins::new(),
        });
        let param = TypedDataParameter::for_message(&instantiate).unwrap();
        assert_eq!(
            param.extra_types["Instantiate"],
            vec![
                field("code_hash", "string"),
                field("msg", "InstantiateMsg"),
                field("salt", "string"),
                field("label", "string"),
                field("funds", "Funds")
            ]
        );
        assert!(param.extra_types["Funds"].is_empty());

        let migrate = Message::Migrate(MsgMigrate {
            contract: Address::new([3u8; 20]),
            new_code_hash: "cd".repeat(32),
            msg: json!({}),
        });
        let param = TypedDataParameter::for_message(&migrate).unwrap();
        assert_eq!(
            param.extra_types["Migrate"],
            vec![
                field("contract", "address"),
                field("new_code_hash", "string"),
                field("msg", "MigrateMsg")
            ]
        );
    }

    #[test]
    fn upload_and_configure_schemas() {
        let param =
            TypedDataParameter::for_message(&Message::Upload(MsgUpload { code: vec![0, 1] }))
                .unwrap();
        assert_eq!(param.fields, vec![field("upload", "Upload")]);
        assert_eq!(param.extra_types["Upload"], vec![field("code", "string")]);

        let param = TypedDataParameter::for_message(&Message::Configure(json!({
            "new_cfg": {"owner": "alice"},
            "tags": []
        })))
        .unwrap();
        assert_eq!(
            param.extra_types["Configure"],
            vec![field("new_cfg", "ConfigureNewCfg"), field("tags", "string[]")]
        );
    }

    #[test]
    fn inference_rejects_unsignable_values() {
        let float = Message::Configure(json!({"ratio": 0.5}));
        assert!(matches!(
            TypedDataParameter::for_message(&float),
            Err(Error::InvalidTypedData(_))
        ));

        let mixed = Message::Configure(json!({"items": [1, "two"]}));
        assert!(TypedDataParameter::for_message(&mixed).is_err());

        let null_item = Message::Configure(json!({"items": [null]}));
        assert!(TypedDataParameter::for_message(&null_item).is_err());
    }

    #[test]
    fn for_messages_requires_one_schema() {
        let to = |byte: u8| {
            Message::transfer([(
                Address::new([byte; 20]),
                Coins::from([("uusdc".to_string(), "1".to_string())]),
            )])
        };

        assert!(TypedDataParameter::for_messages(&[to(1), to(1)]).is_ok());
        assert!(matches!(
            TypedDataParameter::for_messages(&[to(1), to(2)]),
            Err(Error::InvalidTypedData(_))
        ));
        assert!(TypedDataParameter::for_messages(&[]).is_err());
    }

    #[test]
    fn child_names() {
        assert_eq!(child_name("Execute", "gas_limit", 0), "ExecuteGasLimit");
        assert_eq!(child_name("Root", "0xabc", 3), "Root3");
        assert_eq!(child_name("Root", "hyp/eth/usdc", 1), "RootHypEthUsdc");
    }

    #[test]
    fn arbitrary_typed_data_has_name_only_domain() {
        let payload = ArbitraryTypedMessage {
            message: json!({"hello": "world"}),
            types: Types::from([("Message".to_string(), vec![field("hello", "string")])]),
            primary_type: "Message".to_string(),
        };
        let typed_data = compose_arbitrary_typed_data(&payload, "ArbitraryMessage");

        assert_eq!(typed_data.types[DOMAIN_TYPE], vec![field("name", "string")]);
        assert_eq!(typed_data.types["Message"], vec![field("hello", "string")]);
        assert!(typed_data.signing_hash().is_ok());
    }

    #[test]
    fn tx_typed_data_includes_expiry_only_when_set() {
        let messages = vec![Message::Upload(MsgUpload { code: vec![1] })];
        let param = TypedDataParameter::for_messages(&messages).unwrap();
        let mut tx = TxTypedMessage {
            messages,
            gas_limit: 1,
            metadata: Metadata::new("alice", "dev-1", 0),
        };

        let plain = compose_tx_typed_data(&tx, Eip712Domain::default(), &param).unwrap();
        assert_eq!(plain.types["Metadata"].len(), 3);
        assert!(plain.message["metadata"].get("expiry").is_none());

        tx.metadata.expiry = Some("1700000000".to_string());
        let expiring = compose_tx_typed_data(&tx, Eip712Domain::default(), &param).unwrap();
        assert_eq!(expiring.types["Metadata"][3], field("expiry", "string"));
        assert_ne!(
            plain.signing_hash().unwrap(),
            expiring.signing_hash().unwrap()
        );
    }
}
