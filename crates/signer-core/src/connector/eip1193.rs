use std::rc::Rc;

use async_trait::async_trait;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, info};

use super::{
    ArbitraryPayload, ConnectParams, Connector, ConnectorCore, ConnectorKind, NewKey,
    SignTxExtra, SignedDoc, SignedPayload, Transports,
};
use crate::account::Account;
use crate::address::Address;
use crate::auth::{Credential, Eip712Signature, Key, Signature, StandardCredential};
use crate::config::SignerConfig;
use crate::crypto::eth_hash_message;
use crate::eip712::{Eip712Domain, TypedData};
use crate::eip1193::{Eip1193Provider, personal_sign, request_address, sign_typed_data};
use crate::error::{Error, Result};
use crate::key_hash::KeyHash;
use crate::keys::recover_pub_key;
use crate::sign_doc::SignDoc;
use crate::signature::RecoverableSignature;
use crate::typed_data::{
    ArbitraryTypedMessage, TxTypedMessage, TypedDataParameter, compose_arbitrary_typed_data,
    compose_tx_typed_data,
};

/// Looks up the wallet's provider, `None` while no wallet is installed.
pub type ProviderSource = Box<dyn Fn() -> Option<Rc<dyn Eip1193Provider>>>;

/// How a wallet's key is registered on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eip1193Kind {
    /// The recovered secp256k1 public key is registered.
    Injected,
    /// Only the wallet address is registered.
    Embedded,
}

/// Signs with an EIP-1193 wallet, through `eth_signTypedData_v4`.
pub struct Eip1193Connector {
    core: ConnectorCore,
    wallet: Eip1193Kind,
    source: ProviderSource,
}

impl Eip1193Connector {
    pub(crate) fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        wallet: Eip1193Kind,
        source: impl Fn() -> Option<Rc<dyn Eip1193Provider>> + 'static,
        transports: Transports,
        config: SignerConfig,
    ) -> Self {
        let kind = match wallet {
            Eip1193Kind::Injected => ConnectorKind::Eip1193,
            Eip1193Kind::Embedded => ConnectorKind::Embedded,
        };
        Self {
            core: ConnectorCore::new(id, name, kind, transports, config),
            wallet,
            source: Box::new(source),
        }
    }

    /// How this wallet's key is registered.
    #[must_use]
    pub const fn wallet(&self) -> Eip1193Kind {
        self.wallet
    }

    fn provider(&self) -> Result<Rc<dyn Eip1193Provider>> {
        (self.source)().ok_or_else(|| {
            Error::ProviderUnavailable(format!("{} is not installed", self.core.name()))
        })
    }

    /// Returns the on-chain key behind a signature by `address` over `hash`.
    fn key_for(
        &self,
        address: &Address,
        hash: &[u8; 32],
        signature: &RecoverableSignature,
    ) -> Result<Key> {
        let public_key = recover_pub_key(hash, signature, true)?;
        let recovered = Address::from_public_key(&public_key)?;
        if recovered != *address {
            return Err(Error::InvalidSignature(format!(
                "wallet signature recovers to {recovered}, expected {address}"
            )));
        }
        Ok(match self.wallet {
            Eip1193Kind::Injected => Key::Secp256k1(public_key),
            Eip1193Kind::Embedded => Key::Ethereum(*address),
        })
    }

    /// Has the wallet `personal_sign` `challenge` and returns its key.
    async fn sign_challenge(&self, challenge: &[u8]) -> Result<Key> {
        let provider = self.provider()?;
        let address = request_address(provider.as_ref()).await?;
        let signature = personal_sign(provider.as_ref(), challenge, &address).await?;
        self.key_for(&address, &eth_hash_message(challenge), &signature)
    }

    /// Has the wallet sign `typed_data` and wraps the result in the
    /// credential the chain verifies.
    async fn sign_typed(&self, typed_data: &TypedData) -> Result<StandardCredential> {
        let provider = self.provider()?;
        let address = request_address(provider.as_ref()).await?;
        let json = typed_data.to_json()?;
        let signature = sign_typed_data(provider.as_ref(), &address, &json).await?;

        let key = self.key_for(&address, &typed_data.signing_hash()?.0, &signature)?;
        let key_hash = KeyHash::of_key(&key);
        self.core.check_signer(&key_hash)?;

        let sig = match self.wallet {
            Eip1193Kind::Injected => signature.to_compact().to_vec(),
            Eip1193Kind::Embedded => signature.to_bytes().to_vec(),
        };
        Ok(StandardCredential {
            key_hash,
            signature: Signature::Eip712(Eip712Signature {
                sig,
                typed_data: json.into_bytes(),
            }),
        })
    }
}

#[async_trait(?Send)]
impl Connector for Eip1193Connector {
    forward_to_core!();

    async fn connect(&self, params: ConnectParams) -> Result<()> {
        self.core
            .connect(params, |challenge| async move {
                let key = self.sign_challenge(challenge.as_bytes()).await?;
                Ok(KeyHash::of_key(&key))
            })
            .await
    }

    async fn disconnect(&self) -> Result<()> {
        self.core.disconnect();
        Ok(())
    }

    async fn get_accounts(&self) -> Result<Vec<Account>> {
        self.core.get_accounts().await
    }

    async fn is_authorized(&self) -> bool {
        self.core.is_authorized()
    }

    async fn get_key_hash(&self) -> Result<KeyHash> {
        let mut challenge = [0u8; 32];
        OsRng.fill_bytes(&mut challenge);
        let key = self.sign_challenge(&challenge).await?;
        Ok(KeyHash::of_key(&key))
    }

    async fn create_new_key(&self, challenge: Option<String>) -> Result<NewKey> {
        let challenge = challenge.unwrap_or_else(|| self.core.config().default_challenge.clone());
        let key = self.sign_challenge(challenge.as_bytes()).await?;
        let key_hash = KeyHash::of_key(&key);
        info!(connector = %self.core.id(), %key_hash, "derived wallet key");
        Ok(NewKey { key, key_hash })
    }

    async fn sign_tx(&self, sign_doc: SignDoc, extra: SignTxExtra) -> Result<SignedDoc> {
        let param = match extra.typed_data {
            Some(param) => param,
            None => TypedDataParameter::for_messages(&sign_doc.messages)?,
        };
        let domain = Eip712Domain {
            name: Some(self.core.config().tx_domain_name()),
            verifying_contract: Some(sign_doc.sender),
            ..Eip712Domain::default()
        };
        let typed_data = compose_tx_typed_data(&TxTypedMessage::from(&sign_doc), domain, &param)?;
        debug!(connector = %self.core.id(), sender = %sign_doc.sender, "signing transaction");

        let credential = self.sign_typed(&typed_data).await?;
        Ok(SignedDoc {
            credential: Credential::Standard(credential),
            sign_doc,
        })
    }

    async fn sign_arbitrary(&self, payload: ArbitraryPayload) -> Result<SignedPayload> {
        let (Some(types), Some(primary_type)) = (&payload.types, &payload.primary_type) else {
            return Err(Error::InvalidInput(
                "wallets sign arbitrary payloads as typed data and need types and a primary type"
                    .to_string(),
            ));
        };
        let typed_data = compose_arbitrary_typed_data(
            &ArbitraryTypedMessage {
                message: payload.message.clone(),
                types: types.clone(),
                primary_type: primary_type.clone(),
            },
            self.core.config().arbitrary_domain_name.clone(),
        );

        let credential = self.sign_typed(&typed_data).await?;
        Ok(SignedPayload {
            credential,
            payload,
        })
    }
}
