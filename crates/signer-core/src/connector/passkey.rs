use async_trait::async_trait;
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, info};

use super::{
    ArbitraryPayload, ConnectParams, Connector, ConnectorCore, ConnectorKind, NewKey,
    SignTxExtra, SignedDoc, SignedPayload, Transports,
};
use crate::account::Account;
use crate::auth::{Credential, Key, PasskeySignature, Signature, StandardCredential};
use crate::cbor::decode_attestation_public_key;
use crate::config::SignerConfig;
use crate::crypto::sha256;
use crate::encoding::canonical_json_bytes;
use crate::error::Result;
use crate::key_hash::{KeyHash, KeyHashInput, create_key_hash};
use crate::keys::secp256r1;
use crate::sign_doc::SignDoc;
use crate::webauthn::{
    CreationOptions, ES256, RelyingParty, RequestOptions, UserEntity, WebAuthnProvider,
};

/// Signs with a WebAuthn passkey.
///
/// Passkey keys are identified by their credential id, so every assertion
/// also tells which key signed.
pub struct PasskeyConnector {
    core: ConnectorCore,
    provider: Box<dyn WebAuthnProvider>,
}

impl PasskeyConnector {
    pub(crate) fn new(
        provider: impl WebAuthnProvider + 'static,
        transports: Transports,
        config: SignerConfig,
    ) -> Self {
        Self {
            core: ConnectorCore::new(
                ConnectorKind::Passkey.as_str(),
                "Passkey",
                ConnectorKind::Passkey,
                transports,
                config,
            ),
            provider: Box::new(provider),
        }
    }

    /// Runs an assertion over `challenge` and returns the key hash of the
    /// credential that answered, with its signature.
    async fn assert(&self, challenge: Vec<u8>) -> Result<(KeyHash, PasskeySignature)> {
        let config = self.core.config();
        let assertion = self
            .provider
            .get(RequestOptions {
                challenge,
                rp_id: config.rp_id(),
                user_verification: config.passkey.user_verification,
                allow_credentials: Vec::new(),
                timeout_ms: config.passkey.timeout_ms,
            })
            .await?;

        let key_hash = create_key_hash(&KeyHashInput::CredentialId(
            assertion.credential_id.clone(),
        ));
        Ok((key_hash, assertion.to_passkey_signature()?))
    }

    /// Signs `sign_bytes` the way the chain verifies passkeys: the challenge
    /// is their SHA-256.
    async fn sign_bytes(&self, sign_bytes: &[u8]) -> Result<StandardCredential> {
        let (key_hash, signature) = self.assert(sha256(sign_bytes).to_vec()).await?;
        self.core.check_signer(&key_hash)?;
        Ok(StandardCredential {
            key_hash,
            signature: Signature::Passkey(signature),
        })
    }
}

#[async_trait(?Send)]
impl Connector for PasskeyConnector {
    forward_to_core!();

    async fn connect(&self, params: ConnectParams) -> Result<()> {
        self.core
            .connect(params, |challenge| async move {
                let (key_hash, _) = self.assert(challenge.into_bytes()).await?;
                Ok(key_hash)
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
        let mut challenge = vec![0u8; 32];
        OsRng.fill_bytes(&mut challenge);
        let (key_hash, _) = self.assert(challenge).await?;
        Ok(key_hash)
    }

    async fn create_new_key(&self, challenge: Option<String>) -> Result<NewKey> {
        let config = self.core.config();
        let challenge = challenge.unwrap_or_else(|| config.default_challenge.clone());
        let user_name = self
            .core
            .session()
            .username
            .unwrap_or_else(|| config.passkey.rp_name.clone());

        let mut user_id = vec![0u8; 32];
        OsRng.fill_bytes(&mut user_id);

        let attestation = self
            .provider
            .create(CreationOptions {
                challenge: challenge.into_bytes(),
                rp: RelyingParty {
                    id: config.rp_id(),
                    name: config.passkey.rp_name.clone(),
                },
                user: UserEntity {
                    id: user_id,
                    name: user_name.clone(),
                    display_name: user_name,
                },
                algorithms: vec![ES256],
                resident_key: config.passkey.resident_key,
                user_verification: config.passkey.user_verification,
                timeout_ms: config.passkey.timeout_ms,
            })
            .await?;

        let public_key = decode_attestation_public_key(&attestation.attestation_object)?;
        let key = Key::Secp256r1(secp256r1::compress_public_key(&public_key)?);
        let key_hash = create_key_hash(&KeyHashInput::CredentialId(attestation.credential_id));
        info!(%key_hash, "created passkey");

        Ok(NewKey { key, key_hash })
    }

    async fn sign_tx(&self, sign_doc: SignDoc, _extra: SignTxExtra) -> Result<SignedDoc> {
        debug!(sender = %sign_doc.sender, messages = sign_doc.messages.len(), "signing transaction with passkey");
        let credential = self.sign_bytes(&sign_doc.sign_bytes()?).await?;
        Ok(SignedDoc {
            credential: Credential::Standard(credential),
            sign_doc,
        })
    }

    async fn sign_arbitrary(&self, payload: ArbitraryPayload) -> Result<SignedPayload> {
        let credential = self
            .sign_bytes(&canonical_json_bytes(&payload.message)?)
            .await?;
        Ok(SignedPayload {
            credential,
            payload,
        })
    }
}
