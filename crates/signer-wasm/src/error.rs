//! JavaScript-friendly error types for WASM bindings.
//!
//! Every binding returns `Result<_, JsValue>`; [`WasmError`] converts into a
//! JavaScript `Error` whose message is the [`fmt::Display`] output. Browser
//! providers that implement core traits convert back into
//! [`CoreError`], keeping retryable failures retryable.
//!
//! # Example
//!
//! ```ignore
//! use wallet_signer_wasm::error::WasmError;
//!
//! async fn create() -> Result<(), WasmError> {
//!     Err(WasmError::WebAuthnNotSupported)
//! }
//! ```

use std::{error, fmt};

use js_sys::Error as JsError;
use wasm_bindgen::prelude::*;
use wallet_signer_core::error::Error as CoreError;

/// Error type for WASM operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WasmError {
    /// There is no `window`, e.g. inside a worker.
    NoWindow,

    /// `navigator.credentials` is not available.
    WebAuthnNotSupported,

    /// No `window.ethereum` provider is installed.
    ProviderNotFound,

    /// The authenticator refused or failed to create a credential.
    CredentialCreation(String),

    /// The authenticator refused or failed to sign.
    Assertion(String),

    /// The wallet rejected or failed a request.
    Provider(String),

    /// An argument from JavaScript could not be parsed.
    InvalidInput(String),

    /// Core library error.
    CoreError(String),

    /// JavaScript exception.
    JsError(String),
}

impl fmt::Display for WasmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWindow => write!(f, "No window object available"),
            Self::WebAuthnNotSupported => {
                write!(f, "WebAuthn is not supported in this browser")
            }
            Self::ProviderNotFound => write!(f, "No Ethereum provider found"),
            Self::CredentialCreation(msg) => write!(f, "Credential creation failed: {msg}"),
            Self::Assertion(msg) => write!(f, "Assertion failed: {msg}"),
            Self::Provider(msg) => write!(f, "Wallet error: {msg}"),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Self::CoreError(msg) => write!(f, "Core error: {msg}"),
            Self::JsError(msg) => write!(f, "JavaScript error: {msg}"),
        }
    }
}

impl error::Error for WasmError {}

impl From<WasmError> for JsValue {
    fn from(error: WasmError) -> Self {
        JsError::new(&error.to_string()).into()
    }
}

impl From<CoreError> for WasmError {
    fn from(error: CoreError) -> Self {
        Self::CoreError(error.to_string())
    }
}

impl From<serde_json::Error> for WasmError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidInput(error.to_string())
    }
}

impl From<JsValue> for WasmError {
    fn from(value: JsValue) -> Self {
        Self::JsError(js_message(&value))
    }
}

impl From<WasmError> for CoreError {
    fn from(error: WasmError) -> Self {
        match error {
            WasmError::NoWindow | WasmError::WebAuthnNotSupported | WasmError::ProviderNotFound => {
                Self::ProviderUnavailable(error.to_string())
            }
            WasmError::CredentialCreation(msg) => Self::CredentialCreation(msg),
            WasmError::Assertion(msg) | WasmError::Provider(msg) => Self::Assertion(msg),
            WasmError::InvalidInput(msg) => Self::InvalidInput(msg),
            WasmError::CoreError(msg) | WasmError::JsError(msg) => Self::Transport(msg),
        }
    }
}

/// Extracts a readable message from a thrown JavaScript value.
pub(crate) fn js_message(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        s
    } else if let Some(err) = value.dyn_ref::<JsError>() {
        err.message().into()
    } else {
        format!("{value:?}")
    }
}

/// Result type for WASM operations.
pub type WasmResult<T> = Result<T, WasmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            WasmError::ProviderNotFound.to_string(),
            "No Ethereum provider found"
        );
        assert_eq!(
            WasmError::Assertion("cancelled".to_string()).to_string(),
            "Assertion failed: cancelled"
        );
    }

    #[test]
    fn browser_failures_stay_retryable_in_core() {
        let core: CoreError = WasmError::Assertion("timed out".to_string()).into();
        assert!(core.is_retryable());
        let core: CoreError = WasmError::ProviderNotFound.into();
        assert!(matches!(core, CoreError::ProviderUnavailable(_)));
        let core: CoreError = WasmError::InvalidInput("bad".to_string()).into();
        assert!(!core.is_retryable());
    }

    #[test]
    fn core_errors_keep_their_message() {
        let error: WasmError = CoreError::NotConnected.into();
        assert!(error.to_string().starts_with("Core error: "));
    }
}
