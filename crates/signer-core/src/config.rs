//! Signer configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration.
//!
//! # Example
//!
//! ```
//! use wallet_signer_core::config::SignerConfig;
//!
//! let config = SignerConfig::from_toml_str(
//!     r#"
//!     hostname = "app.dango.exchange"
//!
//!     [passkey]
//!     rp_name = "Dango"
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.rp_id(), "dango.exchange");
//! assert_eq!(config.coin_type, 60);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys::DEFAULT_COIN_TYPE;
use crate::webauthn::{ResidentKey, UserVerification, root_domain};

/// Challenge signed on connect when the caller supplies none.
pub const DEFAULT_CHALLENGE: &str = "Please sign this message to confirm your identity.";

/// EIP-712 domain name for arbitrary payloads.
pub const DEFAULT_ARBITRARY_DOMAIN_NAME: &str = "ArbitraryMessage";

/// Passkey ceremony settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasskeyConfig {
    /// Relying party id. Defaults to the root domain of the hostname.
    pub rp_id: Option<String>,
    /// Relying party name shown by the authenticator.
    pub rp_name: String,
    /// User verification requirement.
    pub user_verification: UserVerification,
    /// Discoverable credential requirement for new keys.
    pub resident_key: ResidentKey,
    /// Ceremony timeout in milliseconds.
    pub timeout_ms: u32,
}

impl Default for PasskeyConfig {
    fn default() -> Self {
        Self {
            rp_id: None,
            rp_name: "Wallet".to_string(),
            user_verification: UserVerification::Preferred,
            resident_key: ResidentKey::Preferred,
            timeout_ms: 60_000,
        }
    }
}

/// Configuration shared by all connectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Hostname of the page the signer runs on.
    pub hostname: String,
    /// BIP-44 coin type for mnemonic derivation.
    pub coin_type: u32,
    /// Challenge signed on connect when the caller supplies none.
    pub default_challenge: String,
    /// EIP-712 domain name for arbitrary payloads.
    pub arbitrary_domain_name: String,
    /// Capacity of each connector's event channel.
    pub event_capacity: usize,
    /// Passkey ceremony settings.
    pub passkey: PasskeyConfig,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            coin_type: DEFAULT_COIN_TYPE,
            default_challenge: DEFAULT_CHALLENGE.to_string(),
            arbitrary_domain_name: DEFAULT_ARBITRARY_DOMAIN_NAME.to_string(),
            event_capacity: 16,
            passkey: PasskeyConfig::default(),
        }
    }
}

impl SignerConfig {
    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid TOML or has
    /// fields of the wrong type.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Returns the relying party id: the configured one, or the root
    /// domain of the hostname.
    #[must_use]
    pub fn rp_id(&self) -> String {
        self.passkey
            .rp_id
            .clone()
            .unwrap_or_else(|| root_domain(&self.hostname))
    }

    /// Returns the EIP-712 domain name for transactions: the root domain of
    /// the hostname.
    #[must_use]
    pub fn tx_domain_name(&self) -> String {
        root_domain(&self.hostname)
    }

    fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be positive".to_string()));
        }
        if self.hostname.is_empty() {
            return Err(Error::Config("hostname must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(SignerConfig::from_toml_str("").unwrap(), SignerConfig::default());
    }

    #[test]
    fn defaults() {
        let config = SignerConfig::default();
        assert_eq!(config.coin_type, 60);
        assert_eq!(config.default_challenge, DEFAULT_CHALLENGE);
        assert_eq!(config.arbitrary_domain_name, "ArbitraryMessage");
        assert_eq!(config.event_capacity, 16);
        assert_eq!(config.rp_id(), "localhost");
        assert_eq!(config.passkey.user_verification, UserVerification::Preferred);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = SignerConfig::default();
        config.hostname = "app.dango.exchange".to_string();
        config.passkey.rp_id = Some("dango.exchange".to_string());
        config.passkey.user_verification = UserVerification::Required;

        let toml = config.to_toml_string().unwrap();
        assert!(toml.contains("user_verification = \"required\""));
        assert_eq!(SignerConfig::from_toml_str(&toml).unwrap(), config);
    }

    #[test]
    fn explicit_rp_id_wins() {
        let config = SignerConfig::from_toml_str(
            r#"
            hostname = "app.dango.exchange"
            [passkey]
            rp_id = "dango.zone"
            "#,
        )
        .unwrap();
        assert_eq!(config.rp_id(), "dango.zone");
        assert_eq!(config.tx_domain_name(), "dango.exchange");
    }

    #[test]
    fn invalid_documents_are_config_errors() {
        assert!(matches!(
            SignerConfig::from_toml_str("coin_type = \"sixty\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SignerConfig::from_toml_str("event_capacity = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SignerConfig::load_from_file("/nonexistent/signer.toml"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!("signer-config-{}.toml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "coin_type = 118").unwrap();
        drop(file);

        let config = SignerConfig::load_from_file(&path).unwrap();
        assert_eq!(config.coin_type, 118);
        fs::remove_file(path).unwrap();
    }
}
