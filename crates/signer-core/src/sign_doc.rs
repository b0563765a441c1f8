//! Unsigned transactions and their canonical sign bytes.
//!
//! A [`SignDoc`] is what every connector signs. Its sign bytes are the
//! compact JSON encoding with object keys sorted at every level, so field
//! declaration order never leaks into signatures.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use wallet_signer_core::address::Address;
//! use wallet_signer_core::sign_doc::{Message, Metadata, SignDoc};
//!
//! let recipient = Address::new([2u8; 20]);
//! let coins = BTreeMap::from([("uusdc".to_string(), "100".to_string())]);
//!
//! let doc = SignDoc {
//!     sender: Address::new([1u8; 20]),
//!     gas_limit: 1_000_000,
//!     messages: vec![Message::transfer([(recipient, coins)])],
//!     data: Metadata::new("alice", "dev-1", 0),
//! };
//!
//! let bytes = String::from_utf8(doc.sign_bytes().unwrap()).unwrap();
//! assert!(bytes.starts_with(r#"{"data":{"chain_id":"dev-1","nonce":0,"username":"alice"}"#));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;
use crate::crypto::sha256;
use crate::encoding::{base64_bytes, canonical_json_bytes};
use crate::error::Result;

/// Denom to amount; amounts are decimal strings.
pub type Coins = BTreeMap<String, String>;

/// Transaction metadata echoed unmodified into the signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// The user signing the transaction.
    pub username: String,
    /// The chain the transaction is intended for.
    pub chain_id: String,
    /// The account nonce this transaction consumes.
    pub nonce: u32,
    /// Optional expiry, as the chain's decimal timestamp string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
}

impl Metadata {
    /// Creates metadata without an expiry.
    #[must_use]
    pub fn new(username: impl Into<String>, chain_id: impl Into<String>, nonce: u32) -> Self {
        Self {
            username: username.into(),
            chain_id: chain_id.into(),
            nonce,
            expiry: None,
        }
    }
}

/// Instantiates a contract from uploaded code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgInstantiate {
    /// Hash of the uploaded code, as hex.
    pub code_hash: String,
    /// Instantiation message passed to the contract.
    pub msg: Value,
    /// Salt for address derivation.
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    /// Optional human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Optional admin allowed to migrate the contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Address>,
    /// Coins sent along with the instantiation.
    #[serde(default)]
    pub funds: Coins,
}

/// Executes a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExecute {
    /// The contract to execute.
    pub contract: Address,
    /// Execute message passed to the contract.
    pub msg: Value,
    /// Coins sent along with the call.
    #[serde(default)]
    pub funds: Coins,
}

/// Migrates a contract to new code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMigrate {
    /// The contract to migrate.
    pub contract: Address,
    /// Hash of the new code, as hex.
    pub new_code_hash: String,
    /// Migrate message passed to the contract.
    pub msg: Value,
}

/// Uploads contract code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpload {
    /// The wasm byte code.
    #[serde(with = "base64_bytes")]
    pub code: Vec<u8>,
}

/// The closed set of messages a transaction can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Message {
    /// Updates chain or app configuration; the payload is passed through.
    Configure(Value),
    /// Sends coins to one or more recipients.
    Transfer(BTreeMap<Address, Coins>),
    /// Uploads contract code.
    Upload(MsgUpload),
    /// Instantiates a contract.
    Instantiate(MsgInstantiate),
    /// Executes a contract.
    Execute(MsgExecute),
    /// Migrates a contract.
    Migrate(MsgMigrate),
}

impl Message {
    /// Builds a transfer message.
    pub fn transfer(recipients: impl IntoIterator<Item = (Address, Coins)>) -> Self {
        Self::Transfer(recipients.into_iter().collect())
    }

    /// Builds an execute message without funds.
    #[must_use]
    pub fn execute(contract: Address, msg: Value) -> Self {
        Self::Execute(MsgExecute {
            contract,
            msg,
            funds: Coins::new(),
        })
    }

    /// Returns the message kind as it appears on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::Transfer(_) => "transfer",
            Self::Upload(_) => "upload",
            Self::Instantiate(_) => "instantiate",
            Self::Execute(_) => "execute",
            Self::Migrate(_) => "migrate",
        }
    }
}

/// The canonical unsigned payload of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDoc {
    /// The account sending the transaction.
    pub sender: Address,
    /// Maximum gas the transaction may consume.
    pub gas_limit: u64,
    /// The messages, in execution order.
    pub messages: Vec<Message>,
    /// Metadata the account checks before executing.
    pub data: Metadata,
}

impl SignDoc {
    /// Returns the canonical (sorted-key, compact) JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonError`] if a message cannot be serialized.
    pub fn sign_bytes(&self) -> Result<Vec<u8>> {
        canonical_json_bytes(self)
    }

    /// Returns `sha256(sign_bytes)`, the digest passkeys and session keys sign.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::JsonError`] if a message cannot be serialized.
    pub fn sign_hash(&self) -> Result<[u8; 32]> {
        Ok(sha256(&self.sign_bytes()?))
    }
}
