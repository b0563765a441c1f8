//! WebAuthn over `navigator.credentials`.
//!
//! Options are built as plain JavaScript objects, and results are read back
//! by property name. This keeps the binding independent of which
//! `PublicKeyCredential` typings the browser ships.

use async_trait::async_trait;
use js_sys::{Array, ArrayBuffer, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CredentialCreationOptions, CredentialRequestOptions, CredentialsContainer};

use wallet_signer_core::error::Result as CoreResult;
use wallet_signer_core::webauthn::{
    AssertionResponse, AttestationResponse, CreationOptions, RequestOptions, WebAuthnProvider,
};

use crate::error::{WasmError, WasmResult, js_message};

/// The platform authenticator of the current page.
#[derive(Debug, Clone)]
pub struct BrowserWebAuthn {
    credentials: CredentialsContainer,
}

impl BrowserWebAuthn {
    /// Returns the page's credentials container.
    ///
    /// # Errors
    ///
    /// - [`WasmError::NoWindow`] outside a window context
    /// - [`WasmError::WebAuthnNotSupported`] if the browser lacks WebAuthn
    pub fn new() -> WasmResult<Self> {
        let window = web_sys::window().ok_or(WasmError::NoWindow)?;
        let navigator = window.navigator();
        if !Reflect::has(&navigator, &JsValue::from_str("credentials")).unwrap_or(false) {
            return Err(WasmError::WebAuthnNotSupported);
        }
        Ok(Self {
            credentials: navigator.credentials(),
        })
    }

    async fn create_credential(&self, options: &CreationOptions) -> WasmResult<AttestationResponse> {
        let public_key = Object::new();
        set(&public_key, "challenge", &bytes(&options.challenge))?;

        let rp = Object::new();
        set(&rp, "id", &options.rp.id.as_str().into())?;
        set(&rp, "name", &options.rp.name.as_str().into())?;
        set(&public_key, "rp", &rp)?;

        let user = Object::new();
        set(&user, "id", &bytes(&options.user.id))?;
        set(&user, "name", &options.user.name.as_str().into())?;
        set(&user, "displayName", &options.user.display_name.as_str().into())?;
        set(&public_key, "user", &user)?;

        let params = Array::new();
        for alg in &options.algorithms {
            let param = Object::new();
            set(&param, "type", &"public-key".into())?;
            set(&param, "alg", &JsValue::from(*alg))?;
            params.push(&param);
        }
        set(&public_key, "pubKeyCredParams", &params)?;

        let selection = Object::new();
        set(&selection, "residentKey", &options.resident_key.as_str().into())?;
        set(&selection, "userVerification", &options.user_verification.as_str().into())?;
        set(&public_key, "authenticatorSelection", &selection)?;
        set(&public_key, "attestation", &"none".into())?;
        set(&public_key, "timeout", &JsValue::from(options.timeout_ms))?;

        let request = Object::new();
        set(&request, "publicKey", &public_key)?;
        let request: CredentialCreationOptions = request.unchecked_into();

        let promise = self
            .credentials
            .create_with_options(&request)
            .map_err(|e| WasmError::CredentialCreation(js_message(&e)))?;
        let credential = JsFuture::from(promise)
            .await
            .map_err(|e| WasmError::CredentialCreation(js_message(&e)))?;
        if credential.is_null() {
            return Err(WasmError::CredentialCreation("no credential returned".to_string()));
        }

        let response = get(&credential, "response")?;
        Ok(AttestationResponse {
            credential_id: buffer(&credential, "rawId")?,
            attestation_object: buffer(&response, "attestationObject")?,
            client_data_json: buffer(&response, "clientDataJSON")?,
        })
    }

    async fn get_assertion(&self, options: &RequestOptions) -> WasmResult<AssertionResponse> {
        let public_key = Object::new();
        set(&public_key, "challenge", &bytes(&options.challenge))?;
        set(&public_key, "rpId", &options.rp_id.as_str().into())?;
        set(&public_key, "userVerification", &options.user_verification.as_str().into())?;
        set(&public_key, "timeout", &JsValue::from(options.timeout_ms))?;

        if !options.allow_credentials.is_empty() {
            let allowed = Array::new();
            for id in &options.allow_credentials {
                let descriptor = Object::new();
                set(&descriptor, "type", &"public-key".into())?;
                set(&descriptor, "id", &bytes(id))?;
                allowed.push(&descriptor);
            }
            set(&public_key, "allowCredentials", &allowed)?;
        }

        let request = Object::new();
        set(&request, "publicKey", &public_key)?;
        let request: CredentialRequestOptions = request.unchecked_into();

        let promise = self
            .credentials
            .get_with_options(&request)
            .map_err(|e| WasmError::Assertion(js_message(&e)))?;
        let credential = JsFuture::from(promise)
            .await
            .map_err(|e| WasmError::Assertion(js_message(&e)))?;
        if credential.is_null() {
            return Err(WasmError::Assertion("no credential returned".to_string()));
        }

        let response = get(&credential, "response")?;
        Ok(AssertionResponse {
            credential_id: buffer(&credential, "rawId")?,
            authenticator_data: buffer(&response, "authenticatorData")?,
            client_data_json: buffer(&response, "clientDataJSON")?,
            signature: buffer(&response, "signature")?,
        })
    }
}

#[async_trait(?Send)]
impl WebAuthnProvider for BrowserWebAuthn {
    async fn create(&self, options: CreationOptions) -> CoreResult<AttestationResponse> {
        Ok(self.create_credential(&options).await?)
    }

    async fn get(&self, options: RequestOptions) -> CoreResult<AssertionResponse> {
        Ok(self.get_assertion(&options).await?)
    }
}

fn set(target: &Object, key: &str, value: &JsValue) -> WasmResult<()> {
    Reflect::set(target, &JsValue::from_str(key), value)?;
    Ok(())
}

fn get(target: &JsValue, key: &str) -> WasmResult<JsValue> {
    let value = Reflect::get(target, &JsValue::from_str(key))?;
    if value.is_undefined() {
        return Err(WasmError::JsError(format!("credential has no `{key}`")));
    }
    Ok(value)
}

fn bytes(data: &[u8]) -> JsValue {
    Uint8Array::from(data).into()
}

fn buffer(target: &JsValue, key: &str) -> WasmResult<Vec<u8>> {
    let value = get(target, key)?;
    let buffer = value
        .dyn_into::<ArrayBuffer>()
        .map_err(|_| WasmError::JsError(format!("`{key}` is not an ArrayBuffer")))?;
    Ok(Uint8Array::new(&buffer).to_vec())
}
