//! Error types for the wallet signer core.
//!
//! This module provides a single error type [`enum@Error`] covering every
//! failure mode of the library: malformed inputs, authorization failures,
//! platform (WebAuthn / injected wallet) failures, key derivation, typed-data
//! hashing and transport errors.
//!
//! # Error Categories
//!
//! - **Input errors**: wrong lengths, malformed hex/base64, bad signatures
//! - **Authorization errors**: the key hash is not registered for the user
//! - **Platform errors**: credential creation, assertion, missing providers
//! - **Derivation errors**: BIP-39 / BIP-32 failures
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::Error;
//!
//! let err = Error::InvalidInput("hash must be 1..=32 bytes".to_string());
//! assert!(!err.is_retryable());
//! ```

use core::result::Result as CoreResult;

use base64::DecodeError as Base64DecodeError;
use hex::FromHexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// The main error type for the wallet signer core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Malformed hash, signature, key length or encoded string.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The public key is invalid or malformed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The signature is invalid or malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    /// The key hash is not among the username's authorized keys.
    #[error("not authorized: key {key_hash} is not registered for `{username}`")]
    NotAuthorized {
        /// The username that was being connected.
        username: String,
        /// The key hash that was not found.
        key_hash: String,
    },

    /// The connector has no active session.
    #[error("connector is not connected")]
    NotConnected,

    // =========================================================================
    // Platform Errors
    // =========================================================================
    /// WebAuthn credential creation failed or the attestation is malformed.
    #[error("credential creation failed: {0}")]
    CredentialCreation(String),

    /// WebAuthn assertion failed or the assertion is malformed.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// The expected injected wallet provider is missing.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    // =========================================================================
    // Key Derivation Errors
    // =========================================================================
    /// HD derivation produced no usable private key.
    #[error("key derivation failed: {0}")]
    Derivation(String),

    // =========================================================================
    // EIP-712 Errors
    // =========================================================================
    /// The EIP-712 typed data is invalid.
    #[error("invalid EIP-712 typed data: {0}")]
    InvalidTypedData(String),

    /// A type referenced in the typed data is not defined.
    #[error("undefined type in EIP-712 data: {0}")]
    UndefinedType(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// No transport is configured for the requested chain.
    #[error("no transport configured for chain `{0}`")]
    UnknownChain(String),

    /// A transport request or subscription failed.
    #[error("transport error: {0}")]
    Transport(String),

    // =========================================================================
    // Configuration and Serialization Errors
    // =========================================================================
    /// The configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed to parse hex data.
    #[error("hex decoding failed: {0}")]
    HexDecodeFailed(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(String),
}

impl Error {
    /// Returns `true` if a user-initiated retry of the operation may succeed.
    ///
    /// Platform prompts that were cancelled, a wallet that is not yet
    /// installed and transient transport failures are retryable. Malformed
    /// input, authorization and derivation failures are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CredentialCreation(_)
                | Self::Assertion(_)
                | Self::ProviderUnavailable(_)
                | Self::Transport(_)
        )
    }
}

impl From<FromHexError> for Error {
    fn from(err: FromHexError) -> Self {
        Error::HexDecodeFailed(err.to_string())
    }
}

impl From<SerdeJsonError> for Error {
    fn from(err: SerdeJsonError) -> Self {
        Error::JsonError(err.to_string())
    }
}

impl From<Base64DecodeError> for Error {
    fn from(err: Base64DecodeError) -> Self {
        Error::InvalidInput(format!("base64: {err}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// A specialized [`Result`] type for signer core operations.
pub type Result<T> = CoreResult<T, Error>;
