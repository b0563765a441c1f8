//! The chain transport boundary.
//!
//! The wire framing (JSON-RPC over HTTP, GraphQL over WebSocket) lives
//! outside this crate. Everything here talks to the chain through
//! [`Transport`], which exposes a request/response call and a push
//! subscription.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::account::{Account, AccountInfo};
use crate::address::Address;
use crate::auth::Key;
use crate::error::Result;
use crate::key_hash::KeyHash;

/// Method name of the keys-by-username query.
pub const GET_KEYS_BY_USERNAME: &str = "get_keys_by_username";

/// Method name of the accounts-by-username query.
pub const GET_ACCOUNTS_BY_USERNAME: &str = "get_accounts_by_username";

/// Callback a transport invokes for every pushed event.
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// The streams a transport can push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Finalized blocks.
    Block,
    /// Changes to one account.
    Account,
    /// OHLC candles of a trading pair.
    Candles,
    /// Trades of a trading pair.
    Trades,
    /// Contract events emitted for an address.
    EventsByAddress,
    /// Progress of a submitted transaction.
    SubmitTx,
}

impl Channel {
    /// Returns the snake_case channel name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Account => "account",
            Self::Candles => "candles",
            Self::Trades => "trades",
            Self::EventsByAddress => "events_by_address",
            Self::SubmitTx => "submit_tx",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle that ends a subscription. Consuming it runs the teardown once.
///
/// Dropping the handle without calling [`Unsubscribe::unsubscribe`] leaves
/// the subscription running.
#[must_use = "dropping the handle keeps the subscription alive"]
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send>>);

impl Unsubscribe {
    /// Wraps a teardown closure.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(teardown)))
    }

    /// A handle with nothing to tear down.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Runs the teardown.
    pub fn unsubscribe(mut self) {
        if let Some(teardown) = self.0.take() {
            teardown();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unsubscribe")
            .field(&self.0.as_ref().map(|_| "FnOnce"))
            .finish()
    }
}

/// A connection to one chain.
///
/// Implementations map wire and server failures to
/// [`Error::Transport`](crate::Error::Transport).
#[async_trait(?Send)]
pub trait Transport: Send + Sync {
    /// Sends a request and returns the decoded JSON result.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    /// Opens a push subscription. `on_event` is called for every event
    /// until the returned handle is consumed.
    async fn subscribe(
        &self,
        channel: Channel,
        params: Value,
        on_event: EventCallback,
    ) -> Result<Unsubscribe>;
}

/// Returns the keys registered for `username`, by key hash.
///
/// # Errors
///
/// Returns the transport's error, or [`crate::Error::JsonError`] if the
/// response is not a key-hash-to-key map.
pub async fn get_keys_by_username(
    transport: &dyn Transport,
    username: &str,
) -> Result<BTreeMap<KeyHash, Key>> {
    let response = transport
        .request(GET_KEYS_BY_USERNAME, json!({ "username": username }))
        .await?;
    let keys: BTreeMap<KeyHash, Key> = serde_json::from_value(response)?;
    debug!(username, count = keys.len(), "fetched keys");
    Ok(keys)
}

/// Returns the accounts owned by `username`, ordered by address.
///
/// # Errors
///
/// Returns the transport's error, or [`crate::Error::JsonError`] if the
/// response is not an address-to-account map.
pub async fn get_accounts_by_username(
    transport: &dyn Transport,
    username: &str,
) -> Result<Vec<Account>> {
    let response = transport
        .request(GET_ACCOUNTS_BY_USERNAME, json!({ "username": username }))
        .await?;
    let infos: BTreeMap<Address, AccountInfo> = serde_json::from_value(response)?;
    debug!(username, count = infos.len(), "fetched accounts");

    Ok(infos
        .into_iter()
        .map(|(address, info)| Account::from_info(address, username, info))
        .collect())
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::testing::MockTransport;
    use super::*;
    use crate::account::AccountType;

    #[test]
    fn channel_names() {
        assert_eq!(Channel::EventsByAddress.as_str(), "events_by_address");
        assert_eq!(
            serde_json::to_value(Channel::SubmitTx).unwrap(),
            json!("submit_tx")
        );
        let parsed: Channel = serde_json::from_value(json!("candles")).unwrap();
        assert_eq!(parsed, Channel::Candles);
    }

    #[test]
    fn unsubscribe_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        Unsubscribe::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unsubscribe();
        Unsubscribe::noop().unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keys_and_accounts_by_username() {
        let key_hash = KeyHash::new([7u8; 32]);
        let transport = MockTransport::default()
            .with_response(
                GET_KEYS_BY_USERNAME,
                json!({ key_hash.to_string(): { "secp256k1": "A3MlOYAl3r0JKo7EVRvicIjDrgYoJ922s5Kpz2zaQxtH" } }),
            )
            .with_response(
                GET_ACCOUNTS_BY_USERNAME,
                json!({
                    "0x2222222222222222222222222222222222222222": {
                        "index": 9,
                        "params": { "spot": { "owner": "javier" } }
                    },
                    "0x1111111111111111111111111111111111111111": {
                        "index": 3,
                        "params": { "margin": { "owner": "javier" } }
                    }
                }),
            );

        let keys = get_keys_by_username(&transport, "javier").await.unwrap();
        assert!(matches!(keys.get(&key_hash), Some(Key::Secp256k1(pk)) if pk.len() == 33));

        let accounts = get_accounts_by_username(&transport, "javier").await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].index, 3);
        assert_eq!(accounts[0].account_type, AccountType::Margin);
        assert_eq!(accounts[1].username, "javier");
    }

    #[tokio::test]
    async fn malformed_responses_are_json_errors() {
        let transport =
            MockTransport::default().with_response(GET_KEYS_BY_USERNAME, json!(["not", "a", "map"]));
        assert!(matches!(
            get_keys_by_username(&transport, "javier").await,
            Err(crate::Error::JsonError(_))
        ));
        assert!(matches!(
            get_accounts_by_username(&transport, "javier").await,
            Err(crate::Error::Transport(_))
        ));
    }
}
