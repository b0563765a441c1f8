use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    ArbitraryPayload, ConnectParams, Connector, ConnectorCore, ConnectorKind, NewKey,
    SignTxExtra, SignedDoc, SignedPayload, Transports,
};
use crate::account::Account;
use crate::auth::{
    Credential, Key, SessionCredential, SessionInfo, Signature, StandardCredential,
};
use crate::config::SignerConfig;
use crate::crypto::sha256;
use crate::eip712::{TypeField, Types};
use crate::encoding::canonical_json_bytes;
use crate::error::{Error, Result};
use crate::key_hash::KeyHash;
use crate::keys::Secp256k1KeyPair;
use crate::sign_doc::SignDoc;

/// A session key with the primary key's authorization.
struct SessionKey {
    key_pair: Secp256k1KeyPair,
    info: SessionInfo,
    authorization: StandardCredential,
}

/// Signs with an ephemeral secp256k1 key.
///
/// Connecting generates the key and has the primary connector authorize it
/// once; transactions are then signed without prompting. The session is
/// keyed by the primary key's hash, which must be registered for the user.
pub struct SessionConnector {
    core: ConnectorCore,
    primary: Rc<dyn Connector>,
    expire_at: String,
    key: Mutex<Option<SessionKey>>,
}

impl SessionConnector {
    pub(crate) fn new(
        primary: Rc<dyn Connector>,
        expire_at: impl Into<String>,
        transports: Transports,
        config: SignerConfig,
    ) -> Self {
        Self {
            core: ConnectorCore::new(
                ConnectorKind::Session.as_str(),
                "Session",
                ConnectorKind::Session,
                transports,
                config,
            ),
            primary,
            expire_at: expire_at.into(),
            key: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionKey>> {
        self.key.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The active session's info, if connected.
    #[must_use]
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.lock().as_ref().map(|key| key.info.clone())
    }

    /// The EIP-712 schema of [`SessionInfo`].
    fn session_types() -> Types {
        Types::from([(
            "Message".to_string(),
            vec![
                TypeField::new("session_key", "string"),
                TypeField::new("expire_at", "string"),
            ],
        )])
    }

    /// Creates a session key and has the primary connector sign its info.
    async fn authorize(&self) -> Result<SessionKey> {
        let key_pair = Secp256k1KeyPair::make();
        let info = SessionInfo {
            session_key: key_pair.public_key(true),
            expire_at: self.expire_at.clone(),
        };

        let payload = ArbitraryPayload::typed(
            serde_json::to_value(&info)?,
            Self::session_types(),
            "Message",
        );
        let signed = self.primary.sign_arbitrary(payload).await?;
        debug!(primary = %self.primary.id(), key_hash = %signed.credential.key_hash, "session authorized");

        Ok(SessionKey {
            key_pair,
            info,
            authorization: signed.credential,
        })
    }

    fn sign_with_session<T>(&self, f: impl FnOnce(&SessionKey) -> Result<T>) -> Result<T> {
        match self.lock().as_ref() {
            Some(key) => f(key),
            None => Err(Error::NotConnected),
        }
    }
}

#[async_trait(?Send)]
impl Connector for SessionConnector {
    forward_to_core!();

    /// Authorizes a new session key with the primary connector. A key hash
    /// in `params` is ignored: the session is keyed by whichever key
    /// authorized it. A live session key is replaced only on success.
    async fn connect(&self, params: ConnectParams) -> Result<()> {
        let session_key = self.authorize().await?;
        let key_hash = session_key.authorization.key_hash;

        let params = params.with_key_hash(key_hash);
        self.core
            .connect(params, |_| async move { Ok(key_hash) })
            .await?;

        info!(expire_at = %session_key.info.expire_at, "session key active");
        *self.lock() = Some(session_key);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.lock() = None;
        self.core.disconnect();
        Ok(())
    }

    async fn get_accounts(&self) -> Result<Vec<Account>> {
        self.core.get_accounts().await
    }

    async fn is_authorized(&self) -> bool {
        self.core.is_authorized() && self.lock().is_some()
    }

    async fn get_key_hash(&self) -> Result<KeyHash> {
        self.sign_with_session(|key| Ok(key.authorization.key_hash))
    }

    async fn create_new_key(&self, challenge: Option<String>) -> Result<NewKey> {
        self.primary.create_new_key(challenge).await
    }

    async fn sign_tx(&self, sign_doc: SignDoc, _extra: SignTxExtra) -> Result<SignedDoc> {
        let hash = sha256(&sign_doc.sign_bytes()?);
        let credential = self.sign_with_session(|key| {
            Ok(Credential::Session(SessionCredential {
                session_info: key.info.clone(),
                session_signature: key.key_pair.sign(&hash)?.to_vec(),
                authorization: key.authorization.clone(),
            }))
        })?;
        Ok(SignedDoc {
            credential,
            sign_doc,
        })
    }

    /// Signs with the session key itself, so the credential carries the
    /// session key's hash.
    async fn sign_arbitrary(&self, payload: ArbitraryPayload) -> Result<SignedPayload> {
        let hash = sha256(&canonical_json_bytes::<Value>(&payload.message)?);
        let credential = self.sign_with_session(|key| {
            let public_key = Key::Secp256k1(key.info.session_key.clone());
            Ok(StandardCredential {
                key_hash: KeyHash::of_key(&public_key),
                signature: Signature::Secp256k1(key.key_pair.sign(&hash)?.to_vec()),
            })
        })?;
        Ok(SignedPayload {
            credential,
            payload,
        })
    }
}
