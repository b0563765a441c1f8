//! Wallet Signer Core Library
//!
//! This crate provides the signer and account core of a wallet front end:
//! the keys a user signs with, the way those keys are identified on chain,
//! and the connectors that turn a passkey, a browser wallet or a delegated
//! session key into credentials the chain accepts.
//!
//! # Overview
//!
//! A user owns one or more keys registered under a username. Each key is
//! identified by a [`KeyHash`]. Connecting proves control of one of those
//! keys and fetches the user's accounts. Transactions are [`SignDoc`]s
//! signed into a [`Credential`].
//!
//! This library provides:
//!
//! - **Keys**: secp256k1 and Ed25519 key pairs, BIP-39 mnemonics and
//!   secp256r1 verification
//! - **Identifiers**: key hashes, account salts and predicted addresses
//! - **EIP-712**: typed data hashing and schema inference for wallets
//! - **Connectors**: passkey, EIP-1193, embedded wallet and session signers
//! - **Subscriptions**: a deduplicating multiplexer over a [`Transport`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Connectors                           │
//! │   Passkey   │   EIP-1193 / Embedded   │   Session key       │
//! ├─────────────────────────────────────────────────────────────┤
//! │   Auth      │   Typed data    │   Account    │ Subscriptions │
//! │ credentials │   EIP-712       │   salts      │  multiplexer  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Keys  │  Key hash  │  CBOR / DER  │  Encoding  │  Crypto   │
//! ├─────────────────────────────────────────────────────────────┤
//! │       Transport (chain queries)  │  WebAuthn  │  EIP-1193   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Signing a Transaction with a Local Key
//!
//! ```rust
//! use wallet_signer_core::auth::{Credential, Key, StandardCredential, sign_with};
//! use wallet_signer_core::keys::{KeyAlgo, KeyPair};
//! use wallet_signer_core::{Address, KeyHash, Message, Metadata, SignDoc};
//!
//! let key_pair = KeyPair::make(KeyAlgo::Secp256k1).unwrap();
//! let key = Key::Secp256k1(key_pair.public_key());
//!
//! let doc = SignDoc {
//!     sender: Address::new([1u8; 20]),
//!     gas_limit: 1_000_000,
//!     messages: vec![Message::execute(Address::new([2u8; 20]), serde_json::json!({}))],
//!     data: Metadata::new("javier", "dev-6", 0),
//! };
//!
//! let credential = Credential::Standard(StandardCredential {
//!     key_hash: KeyHash::of_key(&key),
//!     signature: sign_with(&key_pair, &doc.sign_hash().unwrap()).unwrap(),
//! });
//! ```
//!
//! ## Hashing Typed Data
//!
//! ```rust
//! use wallet_signer_core::TypedData;
//!
//! let typed_data = TypedData::from_json(
//!     r#"{
//!         "types": {
//!             "EIP712Domain": [{"name": "name", "type": "string"}],
//!             "Message": [{"name": "greeting", "type": "string"}]
//!         },
//!         "primaryType": "Message",
//!         "domain": {"name": "dango.exchange"},
//!         "message": {"greeting": "hello"}
//!     }"#,
//! )
//! .unwrap();
//!
//! let hash = typed_data.signing_hash().unwrap();
//! assert_eq!(hash.len(), 32);
//! ```
//!
//! ## Predicting an Account Address
//!
//! ```rust
//! use wallet_signer_core::Address;
//! use wallet_signer_core::account::{AccountSalt, predict_account_address};
//!
//! let factory = Address::new([0x18; 20]);
//! let spot_code_hash = [0xaa; 32];
//!
//! let address = predict_account_address(&factory, &spot_code_hash, &AccountSalt::Index(3)).unwrap();
//! println!("Next account: {address}");
//! ```
//!
//! # Platform Integration
//!
//! Browser capabilities sit behind traits so connectors run the same in a
//! browser and in tests:
//!
//! - [`webauthn::WebAuthnProvider`] for `navigator.credentials`
//! - [`eip1193::Eip1193Provider`] for `window.ethereum`
//! - [`transport::Transport`] for chain queries and subscriptions
//!
//! The `wallet-signer-wasm` crate implements them over `web-sys`.
//!
//! # Security Considerations
//!
//! - Private keys are zeroized when dropped and never logged
//! - Passkey and secp256k1 signatures are normalized to low-S form
//! - [`auth::verify_credential`] repeats the chain's checks before broadcast

// Modules
pub mod account;
pub mod address;
pub mod auth;
pub mod cbor;
pub mod config;
pub mod connector;
pub mod crypto;
pub mod eip1193;
pub mod eip712;
pub mod encoding;
pub mod error;
pub mod key_hash;
pub mod keys;
pub mod logging;
pub mod sign_doc;
pub mod signature;
pub mod subscription;
pub mod transport;
pub mod typed_data;
pub mod webauthn;

// Re-exports for convenience
pub use address::Address;
pub use auth::{Credential, Key};
pub use config::SignerConfig;
pub use connector::{ConnectParams, Connector, ConnectorEvent};
pub use eip712::{Eip712Domain, TypedData};
pub use error::{Error, Result};
pub use key_hash::KeyHash;
pub use sign_doc::{Message, Metadata, SignDoc};
pub use signature::RecoverableSignature;
pub use subscription::SubscriptionStore;
pub use transport::Transport;

// Re-export commonly used alloy types
pub use alloy_primitives::{B256, U256};
