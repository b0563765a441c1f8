//! Subscription multiplexer.
//!
//! Many parts of an application listen to the same stream, for example
//! the latest block. [`SubscriptionStore`] keys every subscription by the
//! canonical JSON of its channel and parameters, opens at most one
//! transport subscription per key and fans every event out to all
//! listeners of that key. The transport subscription is torn down when the
//! last listener leaves.
//!
//! # Example
//!
//! ```no_run
//! # async fn example(transport: std::sync::Arc<dyn wallet_signer_core::transport::Transport>) -> wallet_signer_core::Result<()> {
//! use std::sync::Arc;
//!
//! use serde_json::{Value, json};
//! use wallet_signer_core::subscription::SubscriptionStore;
//! use wallet_signer_core::transport::Channel;
//!
//! let store = SubscriptionStore::new(transport);
//! let first = store
//!     .subscribe(Channel::Block, json!({}), Arc::new(|block: &Value| println!("{block}")))
//!     .await?;
//! let second = store
//!     .subscribe(Channel::Block, json!({}), Arc::new(|_: &Value| {}))
//!     .await?;
//! assert_eq!(store.active_subscriptions(), 1);
//!
//! first.unsubscribe();
//! second.unsubscribe();
//! assert_eq!(store.active_subscriptions(), 0);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::debug;

use crate::encoding::to_canonical_json;
use crate::error::{Error, Result};
use crate::transport::{Channel, EventCallback, Transport, Unsubscribe};

/// A listener attached to a subscription key.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Outcome of opening the transport subscription of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Opening {
    Pending,
    Open,
    Failed(String),
}

/// One registry slot. `teardown` is `None` while the transport
/// subscription is still being opened; `opening` tells joiners how the
/// open ended.
struct Entry {
    teardown: Option<Unsubscribe>,
    listeners: BTreeMap<u64, Listener>,
    opening: watch::Receiver<Opening>,
}

enum Role {
    Opener(watch::Sender<Opening>),
    Joiner(watch::Receiver<Opening>),
}

struct Inner {
    transport: Arc<dyn Transport>,
    registry: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshots the listeners of `key` so they can run without the lock.
    fn listeners(&self, key: &str) -> Vec<Listener> {
        self.registry()
            .get(key)
            .map(|entry| entry.listeners.values().cloned().collect())
            .unwrap_or_default()
    }

    fn dispatch(&self, key: &str, event: &Value) -> usize {
        let listeners = self.listeners(key);
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    /// Removes a listener, returning the transport teardown if it was the
    /// last one of an open subscription.
    fn remove_listener(&self, key: &str, id: u64) -> Option<Unsubscribe> {
        let mut registry = self.registry();
        let entry = registry.get_mut(key)?;
        entry.listeners.remove(&id);
        if !entry.listeners.is_empty() || entry.teardown.is_none() {
            return None;
        }
        registry.remove(key).and_then(|entry| entry.teardown)
    }

    /// Drops a pending entry whose opener went away without a result.
    fn discard_abandoned(&self, key: &str) {
        let mut registry = self.registry();
        let abandoned = registry
            .get(key)
            .is_some_and(|entry| entry.teardown.is_none() && entry.opening.has_changed().is_err());
        if abandoned {
            registry.remove(key);
        }
    }
}

/// Deduplicating, ref-counted registry of live subscriptions.
///
/// Cloning the store yields another handle to the same registry.
#[derive(Clone)]
pub struct SubscriptionStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for SubscriptionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionStore")
            .field("active_subscriptions", &self.active_subscriptions())
            .finish_non_exhaustive()
    }
}

impl SubscriptionStore {
    /// Creates an empty store over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                registry: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the registry key of a `(channel, params)` pair: its
    /// canonical JSON, so parameter key order never splits a subscription.
    #[must_use]
    pub fn key(channel: Channel, params: &Value) -> String {
        to_canonical_json(&json!({ "channel": channel.as_str(), "params": params }))
    }

    /// Adds `listener` to the subscription for `(channel, params)`, opening
    /// the transport subscription if this is the first listener.
    ///
    /// The registry lock is released while the transport subscribes; a
    /// placeholder entry reserves the key so concurrent subscribers join it
    /// instead of opening a second transport subscription. Joiners wait
    /// until the open has finished and share its outcome.
    ///
    /// # Errors
    ///
    /// The caller that opened the entry gets the transport's `subscribe`
    /// error. Callers that joined the pending entry get
    /// [`Error::Transport`] with the same message. In both cases the entry
    /// and every listener attached to it are removed.
    pub async fn subscribe(
        &self,
        channel: Channel,
        params: Value,
        listener: Listener,
    ) -> Result<Unsubscribe> {
        let key = Self::key(channel, &params);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let role = {
            let mut registry = self.inner.registry();
            if let Some(entry) = registry.get_mut(&key) {
                entry.listeners.insert(id, listener);
                Role::Joiner(entry.opening.clone())
            } else {
                let (opened, opening) = watch::channel(Opening::Pending);
                registry.insert(
                    key.clone(),
                    Entry {
                        teardown: None,
                        listeners: BTreeMap::from([(id, listener)]),
                        opening,
                    },
                );
                Role::Opener(opened)
            }
        };

        match role {
            Role::Opener(opened) => self.open(channel, params, &key, opened).await?,
            Role::Joiner(mut opening) => {
                debug!(%channel, key = %key, "joined existing subscription");
                let outcome = opening
                    .wait_for(|state| *state != Opening::Pending)
                    .await
                    .map(|state| (*state).clone());
                if !matches!(outcome, Ok(Opening::Open)) {
                    self.inner.remove_listener(&key, id);
                    self.inner.discard_abandoned(&key);
                    let reason = match outcome {
                        Ok(Opening::Failed(reason)) => reason,
                        _ => "subscription was abandoned while opening".to_string(),
                    };
                    return Err(Error::Transport(reason));
                }
            }
        }

        let inner = Arc::downgrade(&self.inner);
        Ok(Unsubscribe::new(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if let Some(teardown) = inner.remove_listener(&key, id) {
                debug!(key = %key, "last listener left, tearing down");
                teardown.unsubscribe();
            }
        }))
    }

    /// Opens the transport subscription of a freshly reserved entry and
    /// publishes the outcome to joiners.
    async fn open(
        &self,
        channel: Channel,
        params: Value,
        key: &str,
        opened: watch::Sender<Opening>,
    ) -> Result<()> {
        debug!(%channel, key = %key, "opening transport subscription");
        let on_event = self.event_callback(key.to_string());
        match self.inner.transport.subscribe(channel, params, on_event).await {
            Ok(teardown) => {
                let orphaned = match self.inner.registry().get_mut(key) {
                    Some(entry) => {
                        entry.teardown = Some(teardown);
                        None
                    }
                    None => Some(teardown),
                };
                if let Some(teardown) = orphaned {
                    teardown.unsubscribe();
                }
                opened.send_replace(Opening::Open);
                Ok(())
            }
            Err(err) => {
                self.inner.registry().remove(key);
                debug!(%channel, key = %key, error = %err, "transport subscription failed");
                let reason = match &err {
                    Error::Transport(reason) => reason.clone(),
                    other => other.to_string(),
                };
                opened.send_replace(Opening::Failed(reason));
                Err(err)
            }
        }
    }

    /// Delivers `event` to the current listeners of `(channel, params)`
    /// without going through the transport. Returns how many listeners ran.
    pub fn emit(&self, channel: Channel, params: &Value, event: &Value) -> usize {
        self.inner.dispatch(&Self::key(channel, params), event)
    }

    /// Returns the number of listeners attached to `(channel, params)`.
    #[must_use]
    pub fn listener_count(&self, channel: Channel, params: &Value) -> usize {
        self.inner
            .registry()
            .get(&Self::key(channel, params))
            .map_or(0, |entry| entry.listeners.len())
    }

    /// Returns the number of distinct subscription keys, including ones
    /// still being opened.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.inner.registry().len()
    }

    fn event_callback(&self, key: String) -> EventCallback {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Arc::new(move |event: &Value| {
            if let Some(inner) = inner.upgrade() {
                inner.dispatch(&key, event);
            }
        })
    }
}
