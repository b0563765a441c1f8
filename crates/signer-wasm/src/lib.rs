//! Wallet Signer WASM Library
//!
//! This crate provides WebAssembly bindings for the wallet signer core:
//! the browser's authenticator and injected wallet behind the core's
//! provider traits, and the pure helpers a front end needs to build and
//! check credentials.
//!
//! # Browser Support
//!
//! Passkeys need WebAuthn (every evergreen browser) and a secure context.
//! Wallet signing needs an injected EIP-1193 provider such as MetaMask or
//! Rabby.
//!
//! # Quick Start
//!
//! ```javascript
//! import init, { createPasskey, passkeySignTx, createKeyHash } from 'wallet-signer-wasm';
//!
//! await init();
//!
//! // Register a passkey (must be triggered by user gesture)
//! const { key, key_hash } = JSON.parse(await createPasskey("Sign up to Dango"));
//!
//! // Sign a transaction
//! const signed = JSON.parse(await passkeySignTx(JSON.stringify(signDoc)));
//! ```
//!
//! # API Reference
//!
//! - [`createPasskey(challenge)`](create_passkey) - Register a new passkey
//! - [`passkeySignTx(signDocJson)`](passkey_sign_tx) - Sign with a passkey
//! - [`walletSignTx(signDocJson)`](wallet_sign_tx) - Sign with the injected wallet
//! - [`createKeyHash(keyJson)`](key_hash_of) - Key hash of an on-chain key
//! - [`credentialKeyHash(credentialId)`](credential_key_hash) - Key hash of a passkey
//! - [`computeAddress(deployer, codeHash, salt)`](compute_address) - Predict a contract address
//! - [`hashTypedData(typedDataJson)`](hash_typed_data) - EIP-712 signing hash
//! - [`composeTxTypedData(signDocJson)`](compose_tx_typed_data) - Typed data a wallet signs
//! - [`parseDerSignature(derHex)`](parse_der_signature) - Convert a DER signature to compact low-S
//! - [`decodeAttestationPublicKey(attestationObject)`](decode_attestation_public_key) - Passkey public key

pub mod error;
pub mod provider;
pub mod webauthn;

pub use error::{WasmError, WasmResult};
pub use provider::InjectedProvider;
pub use webauthn::BrowserWebAuthn;

use std::rc::Rc;

use wasm_bindgen::prelude::*;

use wallet_signer_core::address::{self, Address};
use wallet_signer_core::auth::Key;
use wallet_signer_core::cbor;
use wallet_signer_core::config::SignerConfig;
use wallet_signer_core::connector::{self, Connector, SignTxExtra, Transports};
use wallet_signer_core::crypto;
use wallet_signer_core::eip712::Eip712Domain;
use wallet_signer_core::eip1193::Eip1193Provider;
use wallet_signer_core::encoding::{decode_base64url, decode_hex, decode_hex_array, encode_hex_prefixed};
use wallet_signer_core::key_hash::{KeyHash, KeyHashInput, create_key_hash};
use wallet_signer_core::typed_data::{self, TxTypedMessage, TypedDataParameter};
use wallet_signer_core::{SignDoc, TypedData};

/// Initializes the WASM module.
#[wasm_bindgen(start)]
#[expect(clippy::missing_const_for_fn, reason = "not a stable API function")]
pub fn init() {
    // Nothing to initialize for now
}

/// Checks if WebAuthn is available in the current browser.
#[wasm_bindgen(js_name = "isWebAuthnSupported")]
pub fn is_webauthn_supported() -> bool {
    BrowserWebAuthn::new().is_ok()
}

/// Checks if an injected wallet is installed.
#[wasm_bindgen(js_name = "isWalletInstalled")]
pub fn is_wallet_installed() -> bool {
    InjectedProvider::detect().is_some()
}

/// Returns the library version.
#[wasm_bindgen(js_name = "getVersion")]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Configuration for the current page: its hostname drives the relying
/// party id and the transaction domain name.
fn page_config() -> WasmResult<SignerConfig> {
    let window = web_sys::window().ok_or(WasmError::NoWindow)?;
    let hostname = window.location().hostname()?;
    Ok(SignerConfig {
        hostname,
        ..SignerConfig::default()
    })
}

/// Registers a new passkey and returns the key and its key hash as JSON.
///
/// # Errors
///
/// Fails if WebAuthn is unavailable or the user cancels.
#[wasm_bindgen(js_name = "createPasskey")]
pub async fn create_passkey(challenge: Option<String>) -> Result<String, JsValue> {
    let connector = connector::passkey(BrowserWebAuthn::new()?, Transports::new(), page_config()?);
    let new_key = connector.create_new_key(challenge).await.map_err(WasmError::from)?;
    Ok(serde_json::to_string(&new_key).map_err(WasmError::from)?)
}

/// Signs a sign doc with a passkey and returns the signed doc as JSON.
///
/// # Errors
///
/// Fails if the sign doc does not parse, WebAuthn is unavailable or the
/// user cancels.
#[wasm_bindgen(js_name = "passkeySignTx")]
pub async fn passkey_sign_tx(sign_doc_json: String) -> Result<String, JsValue> {
    let sign_doc: SignDoc = serde_json::from_str(&sign_doc_json).map_err(WasmError::from)?;
    let connector = connector::passkey(BrowserWebAuthn::new()?, Transports::new(), page_config()?);
    let signed = connector
        .sign_tx(sign_doc, SignTxExtra::default())
        .await
        .map_err(WasmError::from)?;
    Ok(serde_json::to_string(&signed).map_err(WasmError::from)?)
}

/// Signs a sign doc with the injected wallet and returns the signed doc as
/// JSON.
///
/// # Errors
///
/// Fails if the sign doc does not parse, no wallet is installed or the user
/// rejects the request.
#[wasm_bindgen(js_name = "walletSignTx")]
pub async fn wallet_sign_tx(sign_doc_json: String) -> Result<String, JsValue> {
    let sign_doc: SignDoc = serde_json::from_str(&sign_doc_json).map_err(WasmError::from)?;
    let connector = connector::eip1193(
        "injected",
        "Injected wallet",
        || InjectedProvider::detect().map(|p| Rc::new(p) as Rc<dyn Eip1193Provider>),
        Transports::new(),
        page_config()?,
    );
    let signed = connector
        .sign_tx(sign_doc, SignTxExtra::default())
        .await
        .map_err(WasmError::from)?;
    Ok(serde_json::to_string(&signed).map_err(WasmError::from)?)
}

/// Returns the key hash of an on-chain key given as JSON, e.g.
/// `{"secp256k1": "<base64>"}`.
///
/// # Errors
///
/// Fails if the key does not parse.
#[wasm_bindgen(js_name = "createKeyHash")]
pub fn key_hash_of(key_json: &str) -> Result<String, JsValue> {
    let key: Key = serde_json::from_str(key_json).map_err(WasmError::from)?;
    Ok(KeyHash::of_key(&key).to_string())
}

/// Returns the key hash of a passkey from its base64url credential id.
///
/// # Errors
///
/// Fails if the id is not base64url.
#[wasm_bindgen(js_name = "credentialKeyHash")]
pub fn credential_key_hash(credential_id: &str) -> Result<String, JsValue> {
    let id = decode_base64url(credential_id).map_err(WasmError::from)?;
    Ok(create_key_hash(&KeyHashInput::CredentialId(id)).to_string())
}

/// Predicts the address of a contract instantiated by `deployer`.
///
/// # Errors
///
/// Fails if an argument is not valid hex of the right length.
#[wasm_bindgen(js_name = "computeAddress")]
pub fn compute_address(deployer: &str, code_hash: &str, salt: &str) -> Result<String, JsValue> {
    let deployer = Address::from_hex(deployer).map_err(WasmError::from)?;
    let code_hash = decode_hex_array::<32>(code_hash).map_err(WasmError::from)?;
    let salt = decode_hex(salt).map_err(WasmError::from)?;
    Ok(address::compute_address(&deployer, &code_hash, &salt).to_checksum_hex())
}

/// Returns the EIP-712 signing hash of typed data JSON.
///
/// # Errors
///
/// Fails if the typed data is malformed.
#[wasm_bindgen(js_name = "hashTypedData")]
pub fn hash_typed_data(typed_data_json: &str) -> Result<String, JsValue> {
    let typed_data = TypedData::from_json(typed_data_json).map_err(WasmError::from)?;
    let hash = typed_data.signing_hash().map_err(WasmError::from)?;
    Ok(encode_hex_prefixed(hash.as_slice()))
}

/// Returns the typed data JSON a wallet signs for a sign doc, with the
/// schema inferred from its messages.
///
/// # Errors
///
/// Fails if the sign doc does not parse or its messages have no common
/// schema.
#[wasm_bindgen(js_name = "composeTxTypedData")]
pub fn compose_tx_typed_data(sign_doc_json: &str) -> Result<String, JsValue> {
    let sign_doc: SignDoc = serde_json::from_str(sign_doc_json).map_err(WasmError::from)?;
    let param = TypedDataParameter::for_messages(&sign_doc.messages).map_err(WasmError::from)?;
    let domain = Eip712Domain {
        name: Some(page_config()?.tx_domain_name()),
        verifying_contract: Some(sign_doc.sender),
        ..Eip712Domain::default()
    };
    let typed_data =
        typed_data::compose_tx_typed_data(&TxTypedMessage::from(&sign_doc), domain, &param)
            .map_err(WasmError::from)?;
    Ok(typed_data.to_json().map_err(WasmError::from)?)
}

/// Converts a DER ECDSA signature into compact `r || s` hex.
///
/// # Errors
///
/// Fails if the signature is not valid DER.
#[wasm_bindgen(js_name = "parseDerSignature")]
pub fn parse_der_signature(der_hex: &str) -> Result<String, JsValue> {
    let der = decode_hex(der_hex).map_err(WasmError::from)?;
    let compact = crypto::der_to_compact(&der).map_err(WasmError::from)?;
    Ok(encode_hex_prefixed(&compact))
}

/// Extracts the uncompressed P-256 public key from a base64url attestation
/// object.
///
/// # Errors
///
/// Fails if the attestation object is malformed.
#[wasm_bindgen(js_name = "decodeAttestationPublicKey")]
pub fn decode_attestation_public_key(attestation_object: &str) -> Result<String, JsValue> {
    let bytes = decode_base64url(attestation_object).map_err(WasmError::from)?;
    let public_key = cbor::decode_attestation_public_key(&bytes).map_err(WasmError::from)?;
    Ok(encode_hex_prefixed(&public_key))
}
