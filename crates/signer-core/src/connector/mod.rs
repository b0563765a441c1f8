//! Connectors: pluggable signing and account-discovery backends.
//!
//! A [`Connector`] wraps one way of proving control of a username's key:
//!
//! - [`PasskeyConnector`]: a WebAuthn passkey (secp256r1);
//! - [`Eip1193Connector`]: an injected browser wallet, or an embedded
//!   wallet that only reveals its address ([`Eip1193Kind`]);
//! - [`SessionConnector`]: an ephemeral secp256k1 key authorized once by a
//!   primary connector.
//!
//! All of them share the same connect flow. The key hash is either given or
//! derived by having the backend sign a challenge. It must be among the
//! username's registered keys. The accounts are then fetched and the
//! session becomes `Connected`. A failure at any step leaves the connector
//! `Disconnected`, or with its previous session if it had one.
//!
//! # Example
//!
//! ```no_run
//! # async fn example(
//! #     provider: impl wallet_signer_core::webauthn::WebAuthnProvider + 'static,
//! #     transports: wallet_signer_core::connector::Transports,
//! # ) -> wallet_signer_core::Result<()> {
//! use wallet_signer_core::config::SignerConfig;
//! use wallet_signer_core::connector::{self, ConnectParams, Connector};
//!
//! let passkey = connector::passkey(provider, transports, SignerConfig::default());
//! passkey
//!     .connect(ConnectParams::new("javier", "dev-6").with_challenge("hello"))
//!     .await?;
//! assert!(passkey.is_authorized().await);
//! # Ok(())
//! # }
//! ```

/// Implements the session accessors of [`Connector`] by forwarding to a
/// `core: ConnectorCore` field.
macro_rules! forward_to_core {
    () => {
        fn id(&self) -> &str {
            self.core.id()
        }

        fn name(&self) -> &str {
            self.core.name()
        }

        fn kind(&self) -> $crate::connector::ConnectorKind {
            self.core.kind()
        }

        fn state(&self) -> $crate::connector::ConnectionState {
            self.core.state()
        }

        fn session(&self) -> $crate::connector::Session {
            self.core.session()
        }

        fn events(&self) -> ::tokio::sync::broadcast::Receiver<$crate::connector::ConnectorEvent> {
            self.core.events()
        }
    };
}

mod eip1193;
mod passkey;
mod session;

use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub use self::eip1193::{Eip1193Connector, Eip1193Kind, ProviderSource};
pub use self::passkey::PasskeyConnector;
pub use self::session::SessionConnector;
use crate::account::Account;
use crate::auth::{Credential, Key, StandardCredential};
use crate::config::SignerConfig;
use crate::eip1193::Eip1193Provider;
use crate::eip712::Types;
use crate::error::{Error, Result};
use crate::key_hash::KeyHash;
use crate::sign_doc::SignDoc;
use crate::transport::{Transport, get_accounts_by_username, get_keys_by_username};
use crate::typed_data::TypedDataParameter;
use crate::webauthn::WebAuthnProvider;

/// Transports by chain id.
pub type Transports = HashMap<String, Arc<dyn Transport>>;

/// Lifecycle of a connector's session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,
    /// `connect` is in progress.
    Connecting,
    /// Connected and authorized.
    Connected,
}

/// The backend family of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    /// WebAuthn passkey.
    Passkey,
    /// Injected EIP-1193 wallet.
    Eip1193,
    /// Embedded wallet exposing an EIP-1193 provider.
    Embedded,
    /// Delegated session key.
    Session,
}

impl ConnectorKind {
    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passkey => "passkey",
            Self::Eip1193 => "eip1193",
            Self::Embedded => "embedded",
            Self::Session => "session",
        }
    }
}

/// Events a connector broadcasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    Connect {
        accounts: Vec<Account>,
        chain_id: String,
        username: String,
        key_hash: KeyHash,
    },
    Disconnect,
    /// The user's accounts changed.
    Change { accounts: Vec<Account> },
}

/// Arguments of [`Connector::connect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub username: String,
    pub chain_id: String,
    /// A challenge for the backend to sign when no key hash is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    /// A known key hash, skipping the signing prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_hash: Option<KeyHash>,
}

impl ConnectParams {
    /// Creates parameters with neither a challenge nor a key hash.
    #[must_use]
    pub fn new(username: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            chain_id: chain_id.into(),
            challenge: None,
            key_hash: None,
        }
    }

    /// Sets the challenge to sign.
    #[must_use]
    pub fn with_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.challenge = Some(challenge.into());
        self
    }

    /// Sets a known key hash.
    #[must_use]
    pub const fn with_key_hash(mut self, key_hash: KeyHash) -> Self {
        self.key_hash = Some(key_hash);
        self
    }
}

/// Backend-specific extras for [`Connector::sign_tx`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignTxExtra {
    /// Schema for wallets that sign typed data. Inferred from the messages
    /// when absent.
    pub typed_data: Option<TypedDataParameter>,
}

/// A sign doc with its credential, ready to broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDoc {
    pub credential: Credential,
    /// Unmodified.
    pub sign_doc: SignDoc,
}

/// An off-chain payload to sign.
///
/// Passkeys and session keys sign `sha256` of the payload's canonical JSON.
/// Wallets that sign typed data need `types` and `primary_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitraryPayload {
    pub message: Value,
    /// EIP-712 struct definitions for `message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Types>,
    /// The root struct of `message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_type: Option<String>,
}

impl ArbitraryPayload {
    /// A payload without a schema.
    #[must_use]
    pub const fn new(message: Value) -> Self {
        Self {
            message,
            types: None,
            primary_type: None,
        }
    }

    /// A payload with its EIP-712 schema.
    #[must_use]
    pub fn typed(message: Value, types: Types, primary_type: impl Into<String>) -> Self {
        Self {
            message,
            types: Some(types),
            primary_type: Some(primary_type.into()),
        }
    }
}

/// An arbitrary payload with its credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub credential: StandardCredential,
    pub payload: ArbitraryPayload,
}

/// A key created by [`Connector::create_new_key`], ready to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKey {
    pub key: Key,
    pub key_hash: KeyHash,
}

/// The session state of a connector, mutated only by `connect` and
/// `disconnect`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub state: ConnectionState,
    pub username: Option<String>,
    pub chain_id: Option<String>,
    pub key_hash: Option<KeyHash>,
    /// As of the last fetch.
    pub accounts: Vec<Account>,
    /// Whether the key hash was found among the user's keys.
    pub authorized: bool,
}

/// A signing and account-discovery backend.
#[async_trait(?Send)]
pub trait Connector {
    /// Unique connector id.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Backend family.
    fn kind(&self) -> ConnectorKind;

    /// Current lifecycle state.
    fn state(&self) -> ConnectionState;

    /// A snapshot of the session.
    fn session(&self) -> Session;

    /// Subscribes to connector events.
    fn events(&self) -> broadcast::Receiver<ConnectorEvent>;

    /// Connects as a username.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownChain`] without a transport for the chain,
    /// [`Error::InvalidInput`] with neither a key hash nor a challenge,
    /// [`Error::NotAuthorized`] if the key is not registered for the
    /// username, or the backend's error. After an error the connector is
    /// `Disconnected`, unless it was already connected, in which case the
    /// live session is kept.
    async fn connect(&self, params: ConnectParams) -> Result<()>;

    /// Ends the session. Disconnecting a disconnected connector is a no-op.
    async fn disconnect(&self) -> Result<()>;

    /// Refetches the connected user's accounts.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] without a session, or the transport's error.
    async fn get_accounts(&self) -> Result<Vec<Account>>;

    /// Whether the connector holds an authorized session. Never fails.
    async fn is_authorized(&self) -> bool;

    /// Prompts the backend for the key hash of the key it would sign with.
    ///
    /// # Errors
    ///
    /// The backend's error.
    async fn get_key_hash(&self) -> Result<KeyHash>;

    /// Creates a new key to register for a user.
    ///
    /// # Errors
    ///
    /// The backend's error.
    async fn create_new_key(&self, challenge: Option<String>) -> Result<NewKey>;

    /// Signs a transaction.
    ///
    /// # Errors
    ///
    /// The backend's error, or [`Error::NotAuthorized`] if a connected
    /// session's key is not the key that signed.
    async fn sign_tx(&self, sign_doc: SignDoc, extra: SignTxExtra) -> Result<SignedDoc>;

    /// Signs an off-chain payload.
    ///
    /// # Errors
    ///
    /// The backend's error.
    async fn sign_arbitrary(&self, payload: ArbitraryPayload) -> Result<SignedPayload>;
}

/// State and flow shared by every backend.
pub(crate) struct ConnectorCore {
    id: String,
    name: String,
    kind: ConnectorKind,
    config: SignerConfig,
    transports: Transports,
    session: Mutex<Session>,
    events: broadcast::Sender<ConnectorEvent>,
}

impl ConnectorCore {
    pub(crate) fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ConnectorKind,
        transports: Transports,
        config: SignerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            config,
            transports,
            session: Mutex::new(Session::default()),
            events,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn kind(&self) -> ConnectorKind {
        self.kind
    }

    pub(crate) const fn config(&self) -> &SignerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn session(&self) -> Session {
        self.lock().clone()
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub(crate) fn events(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.events.subscribe()
    }

    pub(crate) fn is_authorized(&self) -> bool {
        let session = self.lock();
        session.state == ConnectionState::Connected && session.authorized
    }

    fn emit(&self, event: ConnectorEvent) {
        // Sending only fails when nobody listens.
        let _ = self.events.send(event);
    }

    fn transport(&self, chain_id: &str) -> Result<Arc<dyn Transport>> {
        self.transports
            .get(chain_id)
            .cloned()
            .ok_or_else(|| Error::UnknownChain(chain_id.to_string()))
    }

    /// Returns the connected key hash.
    pub(crate) fn key_hash(&self) -> Result<KeyHash> {
        let session = self.lock();
        match (session.state, session.key_hash) {
            (ConnectionState::Connected, Some(key_hash)) => Ok(key_hash),
            _ => Err(Error::NotConnected),
        }
    }

    /// Rejects a signature by a key other than the connected one. Without a
    /// session any key may sign.
    pub(crate) fn check_signer(&self, key_hash: &KeyHash) -> Result<()> {
        let session = self.lock();
        if session.state != ConnectionState::Connected {
            return Ok(());
        }
        match (&session.username, &session.key_hash) {
            (Some(username), Some(expected)) if expected != key_hash => {
                warn!(connector = %self.id, %username, %key_hash, "signed with a different key");
                Err(Error::NotAuthorized {
                    username: username.clone(),
                    key_hash: key_hash.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Runs the shared connect flow. `derive` turns the challenge into a key
    /// hash when none is given. A live session is only replaced once the new
    /// one has been validated.
    pub(crate) async fn connect<F, Fut>(&self, params: ConnectParams, derive: F) -> Result<()>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<KeyHash>>,
    {
        let reconnecting = {
            let mut session = self.lock();
            let live = session.state == ConnectionState::Connected;
            if !live {
                session.state = ConnectionState::Connecting;
            }
            live
        };
        debug!(connector = %self.id, username = %params.username, chain_id = %params.chain_id, reconnecting, "connecting");

        match self.establish(params, derive).await {
            Ok((session, event)) => {
                let previous = std::mem::replace(&mut *self.lock(), session);
                if previous.state == ConnectionState::Connected {
                    debug!(connector = %self.id, "replaced previous session");
                    self.emit(ConnectorEvent::Disconnect);
                }
                self.emit(event);
                Ok(())
            }
            Err(err) => {
                if !reconnecting {
                    *self.lock() = Session::default();
                }
                match &err {
                    Error::NotAuthorized { username, key_hash } => {
                        warn!(connector = %self.id, %username, %key_hash, "key not authorized");
                    }
                    other => debug!(connector = %self.id, error = %other, "connect failed"),
                }
                Err(err)
            }
        }
    }

    /// Validates `params` against the chain without touching the session.
    async fn establish<F, Fut>(
        &self,
        params: ConnectParams,
        derive: F,
    ) -> Result<(Session, ConnectorEvent)>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<KeyHash>>,
    {
        let ConnectParams {
            username,
            chain_id,
            challenge,
            key_hash,
        } = params;
        let transport = self.transport(&chain_id)?;

        let key_hash = match (key_hash, challenge) {
            (Some(key_hash), _) => key_hash,
            (None, Some(challenge)) => derive(challenge).await?,
            (None, None) => {
                return Err(Error::InvalidInput(
                    "connect needs either a key hash or a challenge".to_string(),
                ));
            }
        };

        let keys = get_keys_by_username(transport.as_ref(), &username).await?;
        if !keys.contains_key(&key_hash) {
            return Err(Error::NotAuthorized {
                username,
                key_hash: key_hash.to_string(),
            });
        }
        let accounts = get_accounts_by_username(transport.as_ref(), &username).await?;
        info!(connector = %self.id, %username, %chain_id, %key_hash, accounts = accounts.len(), "connected");

        let session = Session {
            state: ConnectionState::Connected,
            username: Some(username.clone()),
            chain_id: Some(chain_id.clone()),
            key_hash: Some(key_hash),
            accounts: accounts.clone(),
            authorized: true,
        };
        let event = ConnectorEvent::Connect {
            accounts,
            chain_id,
            username,
            key_hash,
        };
        Ok((session, event))
    }

    pub(crate) fn disconnect(&self) {
        let previous = std::mem::take(&mut *self.lock());
        if previous.state != ConnectionState::Disconnected {
            info!(connector = %self.id, "disconnected");
            self.emit(ConnectorEvent::Disconnect);
        }
    }

    pub(crate) async fn get_accounts(&self) -> Result<Vec<Account>> {
        let (username, chain_id) = {
            let session = self.lock();
            match (&session.state, &session.username, &session.chain_id) {
                (ConnectionState::Connected, Some(username), Some(chain_id)) => {
                    (username.clone(), chain_id.clone())
                }
                _ => return Err(Error::NotConnected),
            }
        };

        let transport = self.transport(&chain_id)?;
        let accounts = get_accounts_by_username(transport.as_ref(), &username).await?;

        let changed = {
            let mut session = self.lock();
            let still_connected = session.state == ConnectionState::Connected
                && session.username.as_deref() == Some(username.as_str());
            let changed = still_connected && session.accounts != accounts;
            if changed {
                session.accounts = accounts.clone();
            }
            changed
        };
        if changed {
            debug!(connector = %self.id, accounts = accounts.len(), "accounts changed");
            self.emit(ConnectorEvent::Change {
                accounts: accounts.clone(),
            });
        }
        Ok(accounts)
    }
}

/// Creates a passkey connector.
pub fn passkey(
    provider: impl WebAuthnProvider + 'static,
    transports: Transports,
    config: SignerConfig,
) -> PasskeyConnector {
    PasskeyConnector::new(provider, transports, config)
}

/// Creates a connector for an injected EIP-1193 wallet. `source` is asked
/// for the provider on every call, so a wallet installed after startup is
/// picked up.
pub fn eip1193(
    id: impl Into<String>,
    name: impl Into<String>,
    source: impl Fn() -> Option<Rc<dyn Eip1193Provider>> + 'static,
    transports: Transports,
    config: SignerConfig,
) -> Eip1193Connector {
    Eip1193Connector::new(id, name, Eip1193Kind::Injected, source, transports, config)
}

/// Creates a connector for an embedded wallet, identified by its address.
pub fn embedded(
    name: impl Into<String>,
    source: impl Fn() -> Option<Rc<dyn Eip1193Provider>> + 'static,
    transports: Transports,
    config: SignerConfig,
) -> Eip1193Connector {
    Eip1193Connector::new(
        ConnectorKind::Embedded.as_str(),
        name,
        Eip1193Kind::Embedded,
        source,
        transports,
        config,
    )
}

/// Creates a session-key connector authorized by `primary`. `expire_at` is
/// the session's expiry as the chain's timestamp string.
pub fn session(
    primary: Rc<dyn Connector>,
    expire_at: impl Into<String>,
    transports: Transports,
    config: SignerConfig,
) -> SessionConnector {
    SessionConnector::new(primary, expire_at, transports, config)
}


#[cfg(test)]
mod tests {
    use std::future::ready;

    use super::testing::{CHAIN_ID, USERNAME, transports};
    use super::*;
    use crate::address::Address;

    fn core(keys: &[Key]) -> ConnectorCore {
        let keys: Vec<_> = keys.iter().map(|key| (KeyHash::of_key(key), key.clone())).collect();
        ConnectorCore::new(
            "test",
            "Test",
            ConnectorKind::Passkey,
            transports(&keys),
            SignerConfig::default(),
        )
    }

    async fn never_asked(_challenge: String) -> Result<KeyHash> {
        unreachable!("no challenge to sign")
    }

    fn registered() -> Key {
        Key::Ethereum(Address::new([9u8; 20]))
    }

    #[tokio::test]
    async fn connect_with_known_key_hash() {
        let core = core(&[registered()]);
        let mut events = core.events();
        let key_hash = KeyHash::of_key(&registered());

        core.connect(
            ConnectParams::new(USERNAME, CHAIN_ID).with_key_hash(key_hash),
            never_asked,
        )
        .await
        .unwrap();

        assert_eq!(core.state(), ConnectionState::Connected);
        assert!(core.is_authorized());
        assert_eq!(core.key_hash().unwrap(), key_hash);

        match events.try_recv().unwrap() {
            ConnectorEvent::Connect {
                accounts,
                chain_id,
                username,
                key_hash: connected,
            } => {
                assert_eq!(accounts.len(), 1);
                assert_eq!(chain_id, CHAIN_ID);
                assert_eq!(username, USERNAME);
                assert_eq!(connected, key_hash);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_key_hash_is_not_authorized() {
        let core = core(&[registered()]);
        let err = core
            .connect(
                ConnectParams::new(USERNAME, CHAIN_ID).with_challenge("hi"),
                |_| ready(Ok(KeyHash::new([1u8; 32]))),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotAuthorized { ref username, .. } if username == USERNAME));
        assert!(!core.is_authorized());
        assert_eq!(core.session(), Session::default());
    }

    #[tokio::test]
    async fn connect_input_errors_roll_back() {
        let core = core(&[registered()]);

        let err = core
            .connect(ConnectParams::new(USERNAME, "dev-1"), |_| {
                ready(Ok(KeyHash::new([0u8; 32])))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownChain(chain) if chain == "dev-1"));

        let err = core
            .connect(ConnectParams::new(USERNAME, CHAIN_ID), |_| {
                ready(Ok(KeyHash::new([0u8; 32])))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = core
            .connect(
                ConnectParams::new(USERNAME, CHAIN_ID).with_challenge("hi"),
                |_| ready(Err(Error::Assertion("cancelled".to_string()))),
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(core.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn failed_reconnect_keeps_the_live_session() {
        let second = Key::Ethereum(Address::new([7u8; 20]));
        let core = core(&[registered(), second.clone()]);
        core.connect(
            ConnectParams::new(USERNAME, CHAIN_ID).with_key_hash(KeyHash::of_key(&registered())),
            never_asked,
        )
        .await
        .unwrap();
        let live = core.session();
        let mut events = core.events();

        let err = core
            .connect(
                ConnectParams::new(USERNAME, CHAIN_ID).with_key_hash(KeyHash::new([1u8; 32])),
                never_asked,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
        assert_eq!(core.session(), live);
        assert!(core.is_authorized());
        assert!(events.try_recv().is_err());

        core.connect(
            ConnectParams::new(USERNAME, CHAIN_ID).with_key_hash(KeyHash::of_key(&second)),
            never_asked,
        )
        .await
        .unwrap();
        assert_eq!(core.key_hash().unwrap(), KeyHash::of_key(&second));
        assert_eq!(events.try_recv().unwrap(), ConnectorEvent::Disconnect);
        assert!(matches!(
            events.try_recv().unwrap(),
            ConnectorEvent::Connect { key_hash, .. } if key_hash == KeyHash::of_key(&second)
        ));
    }

    #[tokio::test]
    async fn disconnect_and_accounts() {
        let core = core(&[registered()]);
        assert!(matches!(core.get_accounts().await, Err(Error::NotConnected)));

        core.connect(
            ConnectParams::new(USERNAME, CHAIN_ID).with_key_hash(KeyHash::of_key(&registered())),
            never_asked,
        )
        .await
        .unwrap();
        let mut events = core.events();

        // Unchanged accounts emit nothing.
        assert_eq!(core.get_accounts().await.unwrap().len(), 1);
        assert!(events.try_recv().is_err());

        core.disconnect();
        assert_eq!(events.try_recv().unwrap(), ConnectorEvent::Disconnect);
        assert_eq!(core.state(), ConnectionState::Disconnected);

        // A second disconnect is silent.
        core.disconnect();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn check_signer_only_binds_connected_sessions() {
        let core = core(&[registered()]);
        let other = KeyHash::new([2u8; 32]);
        core.check_signer(&other).unwrap();

        core.connect(
            ConnectParams::new(USERNAME, CHAIN_ID).with_key_hash(KeyHash::of_key(&registered())),
            never_asked,
        )
        .await
        .unwrap();
        assert!(matches!(
            core.check_signer(&other),
            Err(Error::NotAuthorized { .. })
        ));
        core.check_signer(&KeyHash::of_key(&registered())).unwrap();
    }

    #[test]
    fn connect_params_wire_format() {
        let params = ConnectParams::new("javier", "dev-6").with_challenge("hi");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({"username": "javier", "chainId": "dev-6", "challenge": "hi"}));
    }
}
