//! WebAuthn (passkey) boundary and assertion verification.
//!
//! The browser's `navigator.credentials` is reached through the
//! [`WebAuthnProvider`] trait so connectors can be driven by a real
//! authenticator in the browser and by a software authenticator in tests.
//!
//! A passkey signs `sha256(authenticator_data || sha256(client_data_json))`,
//! where the client data embeds the challenge as unpadded base64url. For
//! transactions the challenge is `sha256(sign bytes)`.

use std::net::IpAddr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::{ClientData, PasskeySignature};
use crate::crypto::{der_to_compact, sha256};
use crate::encoding::encode_base64url;
use crate::error::{Error, Result};
use crate::keys::secp256r1;

/// COSE algorithm identifier for ES256 (ECDSA P-256 with SHA-256).
pub const ES256: i32 = -7;

/// How strongly the authenticator should verify the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    /// Must verify.
    Required,
    /// Verify when possible.
    #[default]
    Preferred,
    /// Do not verify.
    Discouraged,
}

impl UserVerification {
    /// Returns the WebAuthn string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::Discouraged => "discouraged",
        }
    }
}

/// Whether the credential should be discoverable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKey {
    /// Must be discoverable.
    Required,
    /// Discoverable when possible.
    #[default]
    Preferred,
    /// Server-side credential.
    Discouraged,
}

impl ResidentKey {
    /// Returns the WebAuthn string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::Discouraged => "discouraged",
        }
    }
}

/// The relying party a credential is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingParty {
    /// The RP id, a registrable domain suffix of the page's origin.
    pub id: String,
    /// Human-readable RP name.
    pub name: String,
}

/// The user entity stored with a new credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntity {
    /// Opaque user handle.
    pub id: Vec<u8>,
    /// Account name shown by the authenticator.
    pub name: String,
    /// Display name shown by the authenticator.
    pub display_name: String,
}

/// Options for `navigator.credentials.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationOptions {
    /// Challenge bytes.
    pub challenge: Vec<u8>,
    /// The relying party.
    pub rp: RelyingParty,
    /// The user.
    pub user: UserEntity,
    /// COSE algorithm identifiers, in order of preference.
    pub algorithms: Vec<i32>,
    /// Discoverable credential requirement.
    pub resident_key: ResidentKey,
    /// User verification requirement.
    pub user_verification: UserVerification,
    /// Ceremony timeout in milliseconds.
    pub timeout_ms: u32,
}

/// Options for `navigator.credentials.get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Challenge bytes.
    pub challenge: Vec<u8>,
    /// The relying party id.
    pub rp_id: String,
    /// User verification requirement.
    pub user_verification: UserVerification,
    /// Credential ids to restrict the ceremony to; empty lets the user pick.
    pub allow_credentials: Vec<Vec<u8>>,
    /// Ceremony timeout in milliseconds.
    pub timeout_ms: u32,
}

/// The result of a successful registration ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationResponse {
    /// Raw credential id.
    pub credential_id: Vec<u8>,
    /// CBOR attestation object.
    pub attestation_object: Vec<u8>,
    /// `clientDataJSON` bytes.
    pub client_data_json: Vec<u8>,
}

/// The result of a successful authentication ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResponse {
    /// Raw credential id.
    pub credential_id: Vec<u8>,
    /// Raw authenticator data.
    pub authenticator_data: Vec<u8>,
    /// `clientDataJSON` bytes.
    pub client_data_json: Vec<u8>,
    /// DER-encoded ECDSA signature.
    pub signature: Vec<u8>,
}

impl AssertionResponse {
    /// Converts the assertion into the on-chain passkey signature: the DER
    /// signature becomes compact `r || s` with low S.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Assertion`] if the DER signature is malformed.
    pub fn to_passkey_signature(&self) -> Result<PasskeySignature> {
        let compact = der_to_compact(&self.signature)
            .and_then(|sig| secp256r1::normalize_s(&sig))
            .map_err(|e| Error::Assertion(format!("malformed assertion signature: {e}")))?;

        Ok(PasskeySignature {
            sig: compact.to_vec(),
            client_data: self.client_data_json.clone(),
            authenticator_data: self.authenticator_data.clone(),
        })
    }
}

/// Access to a platform authenticator.
///
/// Implementations map platform failures to [`Error::CredentialCreation`]
/// and [`Error::Assertion`].
#[async_trait(?Send)]
pub trait WebAuthnProvider {
    /// Runs a registration ceremony.
    async fn create(&self, options: CreationOptions) -> Result<AttestationResponse>;

    /// Runs an authentication ceremony.
    async fn get(&self, options: RequestOptions) -> Result<AssertionResponse>;
}

/// Returns the challenge string a passkey must have embedded for `sign_bytes`.
#[must_use]
pub fn expected_challenge(sign_bytes: &[u8]) -> String {
    encode_base64url(&sha256(sign_bytes))
}

/// Verifies a passkey signature over `sign_bytes`.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the embedded challenge is not
/// `base64url(sha256(sign_bytes))` or the P-256 signature does not verify,
/// and [`Error::JsonError`] if the client data is not JSON.
pub fn verify_passkey_signature(
    public_key: &[u8],
    signature: &PasskeySignature,
    sign_bytes: &[u8],
) -> Result<()> {
    let client_data: ClientData = serde_json::from_slice(&signature.client_data)?;

    let expected = expected_challenge(sign_bytes);
    if client_data.challenge != expected {
        return Err(Error::InvalidSignature(format!(
            "incorrect challenge: expecting {expected}, got {}",
            client_data.challenge
        )));
    }

    let mut signed_data = signature.authenticator_data.clone();
    signed_data.extend_from_slice(&sha256(&signature.client_data));

    if !secp256r1::verify(&sha256(&signed_data), &signature.sig, public_key) {
        return Err(Error::InvalidSignature(
            "passkey signature does not verify".to_string(),
        ));
    }
    Ok(())
}

/// Returns the registrable root of a hostname: its last two DNS labels.
///
/// Single-label hosts and IP literals are returned unchanged.
///
/// # Example
///
/// ```
/// use wallet_signer_core::webauthn::root_domain;
///
/// assert_eq!(root_domain("app.dango.exchange"), "dango.exchange");
/// assert_eq!(root_domain("localhost"), "localhost");
/// assert_eq!(root_domain("127.0.0.1"), "127.0.0.1");
/// ```
#[must_use]
pub fn root_domain(hostname: &str) -> String {
    let host = hostname.trim_end_matches('.');
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return host.to_string();
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host.to_string();
    }
    labels[labels.len() - 2..].join(".")
}

#[cfg(test)]
pub(crate) mod tests {
    use p256::ecdsa::{Signature as P256Signature, SigningKey, signature::hazmat::PrehashSigner};

    use super::*;

    /// Builds a passkey signature the way an authenticator would.
    pub(crate) fn sign_assertion(
        key: &SigningKey,
        sign_bytes: &[u8],
        authenticator_data: &[u8],
    ) -> (Vec<u8>, Vec<u8>) {
        let client_data = serde_json::to_vec(&ClientData {
            ty: "webauthn.get".to_string(),
            challenge: expected_challenge(sign_bytes),
            origin: "https://dango.exchange".to_string(),
            cross_origin: Some(false),
        })
        .unwrap();

        let mut signed = authenticator_data.to_vec();
        signed.extend_from_slice(&sha256(&client_data));
        let sig: P256Signature = key.sign_prehash(&sha256(&signed)).unwrap();

        (sig.to_der().as_bytes().to_vec(), client_data)
    }

    #[test]
    fn passkey_signature_roundtrip() {
        let key = SigningKey::from_slice(&[0x42; 32]).unwrap();
        let public_key = key.verifying_key().to_encoded_point(true).as_bytes().to_vec();
        let sign_bytes = br#"{"sender":"0x00"}"#;
        let authenticator_data = [0x49u8; 37];

        let (der, client_data) = sign_assertion(&key, sign_bytes, &authenticator_data);
        let assertion = AssertionResponse {
            credential_id: b"cred".to_vec(),
            authenticator_data: authenticator_data.to_vec(),
            client_data_json: client_data,
            signature: der,
        };
        let passkey = assertion.to_passkey_signature().unwrap();

        assert_eq!(passkey.sig.len(), 64);
        verify_passkey_signature(&public_key, &passkey, sign_bytes).unwrap();

        // Different sign bytes fail the challenge check.
        let err = verify_passkey_signature(&public_key, &passkey, b"other").unwrap_err();
        assert!(err.to_string().contains("incorrect challenge"));

        // Tampered authenticator data fails the signature check.
        let mut tampered = passkey;
        tampered.authenticator_data[0] ^= 1;
        assert!(verify_passkey_signature(&public_key, &tampered, sign_bytes).is_err());
    }

    #[test]
    fn malformed_der_is_an_assertion_error() {
        let assertion = AssertionResponse {
            credential_id: vec![],
            authenticator_data: vec![],
            client_data_json: vec![],
            signature: vec![0x30, 0x02, 0x01],
        };
        assert!(matches!(
            assertion.to_passkey_signature(),
            Err(Error::Assertion(_))
        ));
    }

    #[test]
    fn root_domain_rules() {
        assert_eq!(root_domain("a.b.c.example.com"), "example.com");
        assert_eq!(root_domain("example.com"), "example.com");
        assert_eq!(root_domain("example.com."), "example.com");
        assert_eq!(root_domain("localhost"), "localhost");
        assert_eq!(root_domain("192.168.1.10"), "192.168.1.10");
        assert_eq!(root_domain("[::1]"), "[::1]");
    }
}
