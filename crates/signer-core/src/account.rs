//! Accounts, account salts and address prediction.
//!
//! The account factory instantiates every account from a per-type code hash
//! and a salt, so an account's address is known before it exists. The first
//! account of a new user is salted with the registering key; every later
//! account is salted with the factory's global account index.
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::account::{AccountSalt, predict_account_address};
//! use wallet_signer_core::address::Address;
//!
//! let factory = Address::new([0x18; 20]);
//! let code_hash = [0xaa; 32];
//!
//! let first = predict_account_address(&factory, &code_hash, &AccountSalt::Index(7)).unwrap();
//! let again = predict_account_address(&factory, &code_hash, &AccountSalt::Index(7)).unwrap();
//! assert_eq!(first, again);
//! ```

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::{Address, compute_address};
use crate::auth::Key;
use crate::error::{Error, Result};
use crate::key_hash::KeyHash;

/// The kinds of accounts the factory can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// A single-owner spot account.
    Spot,
    /// A single-owner margin account.
    Margin,
    /// A multisig account.
    Multi,
}

impl AccountType {
    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Margin => "margin",
            Self::Multi => "multi",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a single-owner account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleParams {
    /// The owning username.
    pub owner: String,
}

/// Parameters of a multisig account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiParams {
    /// Voting power per member username.
    pub members: BTreeMap<String, u32>,
    /// How long a proposal stays open, as the chain's duration string.
    pub voting_period: String,
    /// Voting power needed to pass a proposal.
    pub threshold: u32,
}

/// Type-specific account parameters, tagged by account type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountParams {
    /// Spot account.
    Spot(SingleParams),
    /// Margin account.
    Margin(SingleParams),
    /// Multisig account.
    Multi(MultiParams),
}

impl AccountParams {
    /// Returns the account type these parameters belong to.
    #[must_use]
    pub const fn account_type(&self) -> AccountType {
        match self {
            Self::Spot(_) => AccountType::Spot,
            Self::Margin(_) => AccountType::Margin,
            Self::Multi(_) => AccountType::Multi,
        }
    }
}

/// An account as the factory reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Global account index.
    pub index: u32,
    /// Type-specific parameters.
    pub params: AccountParams,
}

/// An account owned (or co-owned) by a connected user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// The account address.
    pub address: Address,
    /// Global account index.
    pub index: u32,
    /// The username the account was looked up by.
    pub username: String,
    /// The account type, taken from the parameters' tag.
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Type-specific parameters.
    pub params: AccountParams,
}

impl Account {
    /// Builds an account from a factory response entry.
    #[must_use]
    pub fn from_info(address: Address, username: impl Into<String>, info: AccountInfo) -> Self {
        Self {
            address,
            index: info.index,
            username: username.into(),
            account_type: info.params.account_type(),
            params: info.params,
        }
    }
}

/// Salt of the first account of a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserSalt {
    /// The key being registered.
    pub key: Key,
    /// The key's hash.
    pub key_hash: KeyHash,
    /// The new username.
    pub username: String,
}

/// The salt an account is instantiated with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountSalt {
    /// First account of a new user.
    NewUser(NewUserSalt),
    /// Any later account, salted with the global account index.
    Index(u32),
}

impl AccountSalt {
    /// Serializes the salt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a new user's username is longer
    /// than 255 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::NewUser(salt) => create_account_salt(salt),
            Self::Index(index) => Ok(index.to_be_bytes().to_vec()),
        }
    }
}

/// Serializes a new user's salt:
/// `key_hash (32) || len(username) (1) || username || key tag (1) || key bytes`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the username is longer than 255 bytes.
pub fn create_account_salt(salt: &NewUserSalt) -> Result<Vec<u8>> {
    let username = salt.username.as_bytes();
    let username_len = u8::try_from(username.len()).map_err(|_| {
        Error::InvalidInput(format!(
            "username must be at most 255 bytes, got {}",
            username.len()
        ))
    })?;
    let key = salt.key.as_bytes();

    let mut bytes = Vec::with_capacity(KeyHash::BYTE_LEN + 2 + username.len() + key.len());
    bytes.extend_from_slice(salt.key_hash.as_bytes());
    bytes.push(username_len);
    bytes.extend_from_slice(username);
    bytes.push(salt.key.tag());
    bytes.extend_from_slice(key);
    Ok(bytes)
}

/// Predicts the address the factory will give an account.
///
/// # Errors
///
/// See [`AccountSalt::to_bytes`].
pub fn predict_account_address(
    factory: &Address,
    code_hash: &[u8; 32],
    salt: &AccountSalt,
) -> Result<Address> {
    Ok(compute_address(factory, code_hash, &salt.to_bytes()?))
}
