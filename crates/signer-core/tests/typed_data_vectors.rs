//! Typed-data vectors.
//!
//! Transaction vectors are composed from their sign doc, hashed, and where a
//! signature was captured from chain, verified end to end as a credential.
//! Arbitrary vectors are hashed as given.

use serde::Deserialize;
use serde_json::Value;
use wallet_signer_core::address::Address;
use wallet_signer_core::auth::{
    Credential, Eip712Signature, Key, SessionInfo, Signature, StandardCredential, VerifyData,
    verify_credential, verify_signature,
};
use wallet_signer_core::eip712::{Eip712Domain, TypedData};
use wallet_signer_core::encoding::decode_base64;
use wallet_signer_core::key_hash::KeyHash;
use wallet_signer_core::sign_doc::{Message, Metadata, SignDoc};
use wallet_signer_core::typed_data::{TxTypedMessage, TypedDataParameter, compose_tx_typed_data};

const VECTORS: &str = include_str!("vectors/typed_data.json");

#[derive(Deserialize)]
struct Vectors {
    transactions: Vec<TxVector>,
    arbitrary: Vec<ArbitraryVector>,
    key_hashes: Vec<KeyHashVector>,
}

#[derive(Deserialize)]
struct KeyHashVector {
    name: String,
    key: Key,
    key_hash: String,
}

#[derive(Deserialize)]
struct TxVector {
    name: String,
    sender: Address,
    gas_limit: u64,
    metadata: Metadata,
    messages: Vec<Message>,
    domain_name: String,
    encode_type: String,
    domain_separator: String,
    message_hash: String,
    signing_hash: String,
    public_key: Option<String>,
    signature: Option<String>,
}

#[derive(Deserialize)]
struct ArbitraryVector {
    name: String,
    typed_data: Value,
    encode_type: String,
    domain_separator: String,
    message_hash: String,
    signing_hash: String,
    public_key: Option<String>,
    signature: Option<String>,
}

fn load() -> Vectors {
    serde_json::from_str(VECTORS).expect("vectors parse")
}

impl TxVector {
    fn sign_doc(&self) -> SignDoc {
        SignDoc {
            sender: self.sender,
            gas_limit: self.gas_limit,
            messages: self.messages.clone(),
            data: self.metadata.clone(),
        }
    }

    fn compose(&self) -> TypedData {
        let doc = self.sign_doc();
        let param = TypedDataParameter::for_messages(&doc.messages).unwrap();
        let domain = Eip712Domain {
            name: Some(self.domain_name.clone()),
            verifying_contract: Some(doc.sender),
            ..Eip712Domain::default()
        };
        compose_tx_typed_data(&TxTypedMessage::from(&doc), domain, &param).unwrap()
    }
}

#[test]
fn transaction_vectors_hash() {
    for vector in load().transactions {
        let typed_data = vector.compose();

        assert_eq!(
            typed_data.encode_type("Message").unwrap(),
            vector.encode_type,
            "{}: encodeType",
            vector.name
        );
        assert_eq!(
            hex::encode(typed_data.domain.separator_hash().unwrap()),
            vector.domain_separator,
            "{}: domain separator",
            vector.name
        );
        assert_eq!(
            hex::encode(typed_data.message_hash().unwrap()),
            vector.message_hash,
            "{}: message hash",
            vector.name
        );
        assert_eq!(
            hex::encode(typed_data.signing_hash().unwrap()),
            vector.signing_hash,
            "{}: signing hash",
            vector.name
        );
    }
}

#[test]
fn transaction_vectors_survive_json_roundtrip() {
    for vector in load().transactions {
        let typed_data = vector.compose();
        let reparsed = TypedData::from_json(&typed_data.to_json().unwrap()).unwrap();
        assert_eq!(
            hex::encode(reparsed.signing_hash().unwrap()),
            vector.signing_hash,
            "{}",
            vector.name
        );
    }
}

#[test]
fn key_hashes_match_chain_records() {
    let vectors = load().key_hashes;
    assert!(!vectors.is_empty());
    for vector in vectors {
        assert_eq!(KeyHash::of_key(&vector.key).to_string(), vector.key_hash, "{}", vector.name);
    }
}

#[test]
fn captured_transaction_signatures_verify() {
    let mut verified = 0;
    for vector in load().transactions {
        let (Some(public_key), Some(signature)) = (&vector.public_key, &vector.signature) else {
            continue;
        };
        let key = Key::Secp256k1(decode_base64(public_key).unwrap());
        let doc = vector.sign_doc();
        let credential = Credential::Standard(StandardCredential {
            key_hash: KeyHash::of_key(&key),
            signature: Signature::Eip712(Eip712Signature {
                sig: decode_base64(signature).unwrap(),
                typed_data: vector.compose().to_json().unwrap().into_bytes(),
            }),
        });

        verify_credential(&key, &credential, &doc).unwrap();

        // Consuming a different nonce invalidates the signature.
        let mut replayed = doc.clone();
        replayed.data.nonce += 1;
        assert!(verify_credential(&key, &credential, &replayed).is_err());
        verified += 1;
    }
    assert!(verified > 0);
}

#[test]
fn arbitrary_vectors_hash() {
    for vector in load().arbitrary {
        let typed_data: TypedData = serde_json::from_value(vector.typed_data.clone()).unwrap();

        assert_eq!(
            typed_data.encode_type(&typed_data.primary_type).unwrap(),
            vector.encode_type,
            "{}",
            vector.name
        );
        assert_eq!(
            hex::encode(typed_data.domain.separator_hash().unwrap()),
            vector.domain_separator,
            "{}",
            vector.name
        );
        assert_eq!(
            hex::encode(typed_data.message_hash().unwrap()),
            vector.message_hash,
            "{}",
            vector.name
        );
        assert_eq!(
            hex::encode(typed_data.signing_hash().unwrap()),
            vector.signing_hash,
            "{}",
            vector.name
        );
    }
}

#[test]
fn captured_session_authorization_verifies() {
    let vector = load()
        .arbitrary
        .into_iter()
        .find(|v| v.signature.is_some())
        .expect("a signed arbitrary vector");

    let key = Key::Secp256k1(decode_base64(vector.public_key.as_deref().unwrap()).unwrap());
    let info: SessionInfo = serde_json::from_value(vector.typed_data["message"].clone()).unwrap();
    let signature = Signature::Eip712(Eip712Signature {
        sig: decode_base64(vector.signature.as_deref().unwrap()).unwrap(),
        typed_data: serde_json::to_vec(&vector.typed_data).unwrap(),
    });

    verify_signature(&key, &signature, &VerifyData::Session(&info)).unwrap();

    let extended = SessionInfo {
        expire_at: format!("{}0", info.expire_at),
        ..info
    };
    assert!(verify_signature(&key, &signature, &VerifyData::Session(&extended)).is_err());
}
