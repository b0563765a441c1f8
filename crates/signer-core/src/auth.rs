//! On-chain keys, signatures and credentials, and their verification.
//!
//! These are the envelopes a signed transaction carries. Every byte field is
//! standard base64 on the wire and every enum is externally tagged in
//! snake_case, matching what the account contracts deserialize.
//!
//! [`verify_signature`] and [`verify_credential`] repeat the checks the chain
//! performs, so a credential can be validated end to end before it is
//! broadcast.
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::address::Address;
//! use wallet_signer_core::auth::{Credential, Key, StandardCredential, sign_with, verify_credential};
//! use wallet_signer_core::key_hash::KeyHash;
//! use wallet_signer_core::keys::{KeyAlgo, KeyPair};
//! use wallet_signer_core::sign_doc::{Message, Metadata, SignDoc};
//!
//! let key_pair = KeyPair::make(KeyAlgo::Secp256k1).unwrap();
//! let key = Key::Secp256k1(key_pair.public_key());
//!
//! let doc = SignDoc {
//!     sender: Address::new([1u8; 20]),
//!     gas_limit: 100_000,
//!     messages: vec![Message::execute(Address::new([2u8; 20]), serde_json::json!({}))],
//!     data: Metadata::new("alice", "dev-1", 0),
//! };
//!
//! let credential = Credential::Standard(StandardCredential {
//!     key_hash: KeyHash::of_key(&key),
//!     signature: sign_with(&key_pair, &doc.sign_hash().unwrap()).unwrap(),
//! });
//!
//! verify_credential(&key, &credential, &doc).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::address::Address;
use crate::crypto::sha256;
use crate::eip712::{Eip712Domain, TypedData};
use crate::encoding::{base64_bytes, canonical_json_bytes};
use crate::error::{Error, Result};
use crate::key_hash::KeyHash;
use crate::keys::{KeyAlgo, KeyPair, recover_pub_key};
use crate::sign_doc::SignDoc;
use crate::signature::RecoverableSignature;
use crate::webauthn::verify_passkey_signature;

/// Salt tag for [`Key::Ethereum`], which has no [`KeyAlgo`] of its own.
pub const ETHEREUM_KEY_TAG: u8 = 3;

/// A key associated with a username on chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// A compressed secp256r1 public key held by a passkey.
    Secp256r1(#[serde(with = "base64_bytes")] Vec<u8>),
    /// A compressed secp256k1 public key.
    Secp256k1(#[serde(with = "base64_bytes")] Vec<u8>),
    /// An Ed25519 public key.
    Ed25519(#[serde(with = "base64_bytes")] Vec<u8>),
    /// An Ethereum wallet address, for wallets that never reveal their key.
    Ethereum(Address),
}

impl Key {
    /// Returns the signature algorithm behind this key.
    #[must_use]
    pub const fn algo(&self) -> KeyAlgo {
        match self {
            Self::Secp256r1(_) => KeyAlgo::Secp256r1,
            Self::Secp256k1(_) | Self::Ethereum(_) => KeyAlgo::Secp256k1,
            Self::Ed25519(_) => KeyAlgo::Ed25519,
        }
    }

    /// Returns the one-byte tag used in account salts.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Ethereum(_) => ETHEREUM_KEY_TAG,
            other => other.algo().tag(),
        }
    }

    /// Returns the raw key bytes (the address bytes for [`Key::Ethereum`]).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Secp256r1(pk) | Self::Secp256k1(pk) | Self::Ed25519(pk) => pk,
            Self::Ethereum(address) => address.as_bytes(),
        }
    }
}

/// A secp256r1 signature produced by a passkey, with the WebAuthn data the
/// authenticator actually signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasskeySignature {
    /// Compact low-S `r || s`.
    #[serde(with = "base64_bytes")]
    pub sig: Vec<u8>,
    /// The `clientDataJSON` bytes.
    #[serde(with = "base64_bytes")]
    pub client_data: Vec<u8>,
    /// The raw authenticator data.
    #[serde(with = "base64_bytes")]
    pub authenticator_data: Vec<u8>,
}

/// A signature over EIP-712 typed data, from an injected wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Signature {
    /// `r || s`, optionally followed by the recovery byte.
    #[serde(with = "base64_bytes")]
    pub sig: Vec<u8>,
    /// The JSON typed data exactly as the wallet signed it.
    #[serde(with = "base64_bytes")]
    pub typed_data: Vec<u8>,
}

/// A signature in any of the forms the chain accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signature {
    /// A raw `{r, s, v}` triple.
    Standard(RecoverableSignature),
    /// A compact 64-byte secp256k1 signature over `sha256(sign bytes)`.
    Secp256k1(#[serde(with = "base64_bytes")] Vec<u8>),
    /// An EIP-712 signature.
    Eip712(Eip712Signature),
    /// A passkey assertion.
    Passkey(PasskeySignature),
}

/// A signature together with the key hash that identifies its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardCredential {
    /// Which of the user's keys signed.
    pub key_hash: KeyHash,
    /// The signature over the sign doc or session info.
    pub signature: Signature,
}

/// A delegated session key and the signatures that bind it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Compressed secp256k1 public key of the session.
    #[serde(with = "base64_bytes")]
    pub session_key: Vec<u8>,
    /// Expiry, as the chain's decimal timestamp string.
    pub expire_at: String,
}

impl SessionInfo {
    /// Returns the canonical JSON the primary key signs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if serialization fails.
    pub fn sign_bytes(&self) -> Result<Vec<u8>> {
        canonical_json_bytes(self)
    }
}

/// A session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    /// The session being used.
    pub session_info: SessionInfo,
    /// The session key's compact signature over `sha256(sign bytes)`.
    #[serde(with = "base64_bytes")]
    pub session_signature: Vec<u8>,
    /// The primary key's signature over `session_info`.
    pub authorization: StandardCredential,
}

/// The credential attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    /// Signed directly by one of the user's keys.
    Standard(StandardCredential),
    /// Signed by a session key.
    Session(SessionCredential),
}

impl Credential {
    /// Returns the key hash of the user's key behind this credential.
    #[must_use]
    pub const fn key_hash(&self) -> &KeyHash {
        match self {
            Self::Standard(c) => &c.key_hash,
            Self::Session(c) => &c.authorization.key_hash,
        }
    }
}

/// The `clientDataJSON` fields checked during passkey verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientData {
    /// `webauthn.get` for assertions.
    #[serde(rename = "type")]
    pub ty: String,
    /// The base64url (unpadded) challenge.
    pub challenge: String,
    /// The page origin.
    pub origin: String,
    /// Whether the call was cross-origin.
    #[serde(default, rename = "crossOrigin", skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,
}

/// What a signature is expected to cover.
#[derive(Debug, Clone, Copy)]
pub enum VerifyData<'a> {
    /// A transaction.
    Standard(&'a SignDoc),
    /// A session authorization.
    Session(&'a SessionInfo),
}

impl VerifyData<'_> {
    /// Returns the canonical JSON bytes of the signed data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if serialization fails.
    pub fn sign_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Standard(doc) => doc.sign_bytes(),
            Self::Session(info) => info.sign_bytes(),
        }
    }

    /// Rebuilds the EIP-712 message and verifying contract the signer must
    /// have seen.
    fn typed_message(&self) -> Result<(Option<Address>, Value)> {
        match self {
            Self::Standard(doc) => {
                let mut metadata = Map::new();
                metadata.insert("username".into(), json!(doc.data.username));
                metadata.insert("chain_id".into(), json!(doc.data.chain_id));
                metadata.insert("nonce".into(), json!(doc.data.nonce));
                if let Some(ref expiry) = doc.data.expiry {
                    metadata.insert("expiry".into(), json!(expiry));
                }
                let message = json!({
                    "gas_limit": doc.gas_limit,
                    "metadata": metadata,
                    "messages": serde_json::to_value(&doc.messages)?,
                });
                Ok((Some(doc.sender), message))
            }
            Self::Session(info) => Ok((None, serde_json::to_value(info)?)),
        }
    }
}

/// Signs a 32-byte hash with a client-held key and wraps the result in the
/// [`Signature`] variant the chain expects for that algorithm.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the hash length is out of range.
pub fn sign_with(key_pair: &KeyPair, hash: &[u8]) -> Result<Signature> {
    match key_pair {
        KeyPair::Secp256k1(kp) => Ok(Signature::Secp256k1(kp.sign(hash)?.to_vec())),
        KeyPair::Ed25519(kp) => {
            let sig = kp.sign(hash)?;
            let (r, s) = sig.split_at(32);
            let mut r_bytes = [0u8; 32];
            let mut s_bytes = [0u8; 32];
            r_bytes.copy_from_slice(r);
            s_bytes.copy_from_slice(s);
            Ok(Signature::Standard(RecoverableSignature::new(r_bytes, s_bytes, 0)))
        }
    }
}

/// Verifies that `signature` by `key` covers `data`.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the signature does not verify or
/// its kind does not match the key, and [`Error::InvalidTypedData`] or
/// [`Error::JsonError`] if embedded typed data or client data is malformed.
pub fn verify_signature(key: &Key, signature: &Signature, data: &VerifyData<'_>) -> Result<()> {
    match (key, signature) {
        (Key::Secp256k1(_) | Key::Ethereum(_), Signature::Eip712(cred)) => {
            let hash = eip712_hash(cred, data)?;
            verify_eip712(key, &hash, &cred.sig)
        }
        (Key::Secp256r1(pk), Signature::Passkey(cred)) => {
            verify_passkey_signature(pk, cred, &data.sign_bytes()?)
        }
        (Key::Secp256k1(pk), Signature::Secp256k1(sig)) => {
            check(KeyAlgo::Secp256k1, &sha256(&data.sign_bytes()?), sig, pk)
        }
        (Key::Secp256k1(pk), Signature::Standard(sig)) => check(
            KeyAlgo::Secp256k1,
            &sha256(&data.sign_bytes()?),
            &sig.to_compact(),
            pk,
        ),
        (Key::Ed25519(pk), Signature::Standard(sig)) => check(
            KeyAlgo::Ed25519,
            &sha256(&data.sign_bytes()?),
            &sig.to_compact(),
            pk,
        ),
        _ => Err(Error::InvalidSignature(format!(
            "{} key cannot verify this signature kind",
            key.algo()
        ))),
    }
}

/// Verifies a transaction credential against the key its key hash resolves
/// to.
///
/// A session credential is checked twice: the authorization over the
/// session info with `key`, then the session signature over the sign doc
/// with the session key.
///
/// # Errors
///
/// See [`verify_signature`].
pub fn verify_credential(key: &Key, credential: &Credential, sign_doc: &SignDoc) -> Result<()> {
    match credential {
        Credential::Standard(c) => {
            verify_signature(key, &c.signature, &VerifyData::Standard(sign_doc))
        }
        Credential::Session(c) => {
            verify_signature(
                key,
                &c.authorization.signature,
                &VerifyData::Session(&c.session_info),
            )?;
            verify_signature(
                &Key::Secp256k1(c.session_info.session_key.clone()),
                &Signature::Secp256k1(c.session_signature.clone()),
                &VerifyData::Standard(sign_doc),
            )
        }
    }
}

/// Re-hashes the signed typed data with the message rebuilt from `data`.
///
/// Only the schema and the domain name are taken from the signed JSON; the
/// message and verifying contract come from the data being authorized.
fn eip712_hash(cred: &Eip712Signature, data: &VerifyData<'_>) -> Result<[u8; 32]> {
    let signed = TypedData::from_slice(&cred.typed_data)?;
    let (verifying_contract, message) = data.typed_message()?;

    let rebuilt = TypedData {
        types: signed.types,
        primary_type: "Message".to_string(),
        domain: Eip712Domain {
            name: signed.domain.name,
            verifying_contract,
            ..Eip712Domain::default()
        },
        message,
    };
    Ok(rebuilt.signing_hash()?.0)
}

fn verify_eip712(key: &Key, hash: &[u8; 32], sig: &[u8]) -> Result<()> {
    match key {
        Key::Ethereum(address) => {
            let recoverable = RecoverableSignature::from_slice(sig)?;
            let public_key = recover_pub_key(hash, &recoverable, false)?;
            let recovered = Address::from_public_key(&public_key)?;
            if recovered != *address {
                return Err(Error::InvalidSignature(format!(
                    "signature recovers to {recovered}, expected {address}"
                )));
            }
            Ok(())
        }
        Key::Secp256k1(pk) => {
            let compact = sig.get(..64).ok_or_else(|| {
                Error::InvalidSignature(format!("expected at least 64 bytes, got {}", sig.len()))
            })?;
            check(KeyAlgo::Secp256k1, hash, compact, pk)
        }
        _ => Err(Error::InvalidSignature(format!(
            "{} key cannot verify typed data",
            key.algo()
        ))),
    }
}

fn check(algo: KeyAlgo, hash: &[u8], sig: &[u8], pk: &[u8]) -> Result<()> {
    if KeyPair::verify(algo, hash, sig, pk) {
        Ok(())
    } else {
        Err(Error::InvalidSignature(format!("{algo} signature does not verify")))
    }
}
