//! EIP-1193 over `window.ethereum`.

use async_trait::async_trait;
use js_sys::{Function, JSON, Object, Promise, Reflect};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use wallet_signer_core::eip1193::Eip1193Provider;
use wallet_signer_core::error::Result as CoreResult;

use crate::error::{WasmError, WasmResult, js_message};

/// EIP-1193 error code for a request the user rejected.
const USER_REJECTED: i32 = 4001;

/// An injected wallet.
#[derive(Debug, Clone)]
pub struct InjectedProvider {
    ethereum: JsValue,
    request: Function,
}

impl InjectedProvider {
    /// Returns `window.ethereum`, or `None` if no wallet is installed.
    #[must_use]
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        let ethereum = Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
        Self::from_js(ethereum).ok()
    }

    /// Wraps an EIP-1193 provider object, such as one announced through
    /// EIP-6963.
    ///
    /// # Errors
    ///
    /// [`WasmError::ProviderNotFound`] if the object has no `request`
    /// function.
    pub fn from_js(ethereum: JsValue) -> WasmResult<Self> {
        if ethereum.is_undefined() || ethereum.is_null() {
            return Err(WasmError::ProviderNotFound);
        }
        let request = Reflect::get(&ethereum, &JsValue::from_str("request"))?
            .dyn_into::<Function>()
            .map_err(|_| WasmError::ProviderNotFound)?;
        Ok(Self { ethereum, request })
    }

    async fn call(&self, method: &str, params: &Value) -> WasmResult<Value> {
        let args = Object::new();
        Reflect::set(&args, &JsValue::from_str("method"), &JsValue::from_str(method))?;
        Reflect::set(&args, &JsValue::from_str("params"), &to_js(params)?)?;

        let promise: Promise = self
            .request
            .call1(&self.ethereum, &args)
            .map_err(provider_error)?
            .dyn_into()
            .map_err(|_| WasmError::Provider(format!("{method} did not return a promise")))?;
        let result = JsFuture::from(promise).await.map_err(provider_error)?;
        from_js(&result)
    }
}

#[async_trait(?Send)]
impl Eip1193Provider for InjectedProvider {
    async fn request(&self, method: &str, params: Value) -> CoreResult<Value> {
        Ok(self.call(method, &params).await?)
    }
}

fn provider_error(error: JsValue) -> WasmError {
    let code = Reflect::get(&error, &JsValue::from_str("code"))
        .ok()
        .and_then(|code| code.as_f64());
    let message = Reflect::get(&error, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| js_message(&error));
    match code {
        Some(code) if code as i32 == USER_REJECTED => {
            WasmError::Provider(format!("user rejected the request: {message}"))
        }
        _ => WasmError::Provider(message),
    }
}

fn to_js(value: &Value) -> WasmResult<JsValue> {
    Ok(JSON::parse(&serde_json::to_string(value)?)?)
}

fn from_js(value: &JsValue) -> WasmResult<Value> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    let json: String = JSON::stringify(value)?.into();
    Ok(serde_json::from_str(&json)?)
}
