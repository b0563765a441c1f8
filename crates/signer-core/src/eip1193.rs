//! Injected wallet (EIP-1193) boundary.
//!
//! Browser wallets expose `window.ethereum.request({ method, params })`.
//! [`Eip1193Provider`] is that call; the helpers below wrap the three
//! methods the connectors use and decode their results.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::address::Address;
use crate::encoding::{decode_hex, encode_hex_prefixed};
use crate::error::{Error, Result};
use crate::signature::RecoverableSignature;

/// Requests account access.
pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";

/// Signs a message with the EIP-191 prefix.
pub const PERSONAL_SIGN: &str = "personal_sign";

/// Signs EIP-712 typed data given as a JSON string.
pub const ETH_SIGN_TYPED_DATA_V4: &str = "eth_signTypedData_v4";

/// An EIP-1193 provider.
///
/// Implementations map a missing provider or a rejected request to
/// [`Error::ProviderUnavailable`] and [`Error::Assertion`] respectively.
#[async_trait(?Send)]
pub trait Eip1193Provider {
    /// Forwards a JSON-RPC request to the wallet.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// Asks the wallet for its accounts and returns the first one.
///
/// # Errors
///
/// Returns [`Error::ProviderUnavailable`] if the wallet exposes no account,
/// or [`Error::InvalidInput`] if the account is not a hex address.
pub async fn request_address(provider: &dyn Eip1193Provider) -> Result<Address> {
    let accounts = provider.request(ETH_REQUEST_ACCOUNTS, json!([])).await?;
    let first = accounts
        .as_array()
        .and_then(|accounts| accounts.first())
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ProviderUnavailable("wallet exposed no accounts".to_string()))?;
    Address::from_hex(first)
}

/// `personal_sign`s `message` with `address`.
///
/// # Errors
///
/// Propagates the provider's error, or [`Error::InvalidSignature`] if the
/// wallet returns something other than a 65-byte hex signature.
pub async fn personal_sign(
    provider: &dyn Eip1193Provider,
    message: &[u8],
    address: &Address,
) -> Result<RecoverableSignature> {
    let result = provider
        .request(
            PERSONAL_SIGN,
            json!([encode_hex_prefixed(message), address.to_hex()]),
        )
        .await?;
    decode_signature(&result)
}

/// `eth_signTypedData_v4`s the typed data JSON with `address`.
///
/// # Errors
///
/// See [`personal_sign`].
pub async fn sign_typed_data(
    provider: &dyn Eip1193Provider,
    address: &Address,
    typed_data_json: &str,
) -> Result<RecoverableSignature> {
    let result = provider
        .request(
            ETH_SIGN_TYPED_DATA_V4,
            json!([address.to_hex(), typed_data_json]),
        )
        .await?;
    decode_signature(&result)
}

fn decode_signature(result: &Value) -> Result<RecoverableSignature> {
    let hex = result.as_str().ok_or_else(|| {
        Error::InvalidSignature(format!("wallet returned a non-string signature: {result}"))
    })?;
    let bytes = decode_hex(hex)?;
    if bytes.len() != RecoverableSignature::BYTE_LEN {
        return Err(Error::InvalidSignature(format!(
            "expected a {}-byte signature, got {}",
            RecoverableSignature::BYTE_LEN,
            bytes.len()
        )));
    }
    RecoverableSignature::from_slice(&bytes)
}

/// A software wallet backed by a secp256k1 key, answering the methods the
/// connectors use.
#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::{ETH_REQUEST_ACCOUNTS, ETH_SIGN_TYPED_DATA_V4, Eip1193Provider, PERSONAL_SIGN};
    use crate::address::Address;
    use crate::crypto::eth_hash_message;
    use crate::eip712::TypedData;
    use crate::encoding::{decode_hex, encode_hex_prefixed};
    use crate::error::{Error, Result};
    use crate::keys::Secp256k1KeyPair;

    pub(crate) struct MockWallet {
        pub(crate) key: Secp256k1KeyPair,
        pub(crate) reject: bool,
        pub(crate) calls: RefCell<Vec<String>>,
    }

    impl MockWallet {
        pub(crate) fn new(secret: [u8; 32]) -> Self {
            Self {
                key: Secp256k1KeyPair::from_bytes(&secret).unwrap(),
                reject: false,
                calls: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn address(&self) -> Address {
            Address::from_public_key(&self.key.public_key(false)).unwrap()
        }
    }

    #[async_trait(?Send)]
    impl Eip1193Provider for MockWallet {
        async fn request(&self, method: &str, params: Value) -> Result<Value> {
            self.calls.borrow_mut().push(method.to_string());
            if self.reject {
                return Err(Error::Assertion("user rejected the request".to_string()));
            }
            match method {
                ETH_REQUEST_ACCOUNTS => Ok(json!([self.address().to_checksum_hex()])),
                PERSONAL_SIGN => {
                    let message = decode_hex(params[0].as_str().unwrap()).unwrap();
                    let sig = self.key.sign_recoverable(&eth_hash_message(&message))?;
                    Ok(json!(encode_hex_prefixed(&sig.to_bytes())))
                }
                ETH_SIGN_TYPED_DATA_V4 => {
                    let typed_data = TypedData::from_json(params[1].as_str().unwrap())?;
                    let sig = self.key.sign_recoverable(&typed_data.signing_hash()?.0)?;
                    Ok(json!(encode_hex_prefixed(&sig.to_bytes())))
                }
                other => Err(Error::Transport(format!("unsupported method {other}"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockWallet;
    use super::*;
    use crate::crypto::eth_hash_message;
    use crate::keys::recover_pub_key;

    #[tokio::test]
    async fn request_address_takes_the_first_account() {
        let wallet = MockWallet::new([3u8; 32]);
        assert_eq!(request_address(&wallet).await.unwrap(), wallet.address());
    }

    #[tokio::test]
    async fn personal_sign_recovers_to_the_wallet() {
        let wallet = MockWallet::new([3u8; 32]);
        let address = wallet.address();
        let sig = personal_sign(&wallet, b"hello", &address).await.unwrap();

        let public_key = recover_pub_key(&eth_hash_message(b"hello"), &sig, false).unwrap();
        assert_eq!(Address::from_public_key(&public_key).unwrap(), address);
    }

    #[tokio::test]
    async fn rejected_requests_propagate() {
        let mut wallet = MockWallet::new([3u8; 32]);
        wallet.reject = true;
        let err = request_address(&wallet).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!(matches!(
            decode_signature(&json!(42)),
            Err(Error::InvalidSignature(_))
        ));
        assert!(matches!(
            decode_signature(&json!("0xdeadbeef")),
            Err(Error::InvalidSignature(_))
        ));
    }
}
