//! BIP-39 mnemonics and hierarchical key derivation.
//!
//! secp256k1 keys follow BIP-32/BIP-44 at `m/44'/{coin_type}'/0'/0/0`.
//! Ed25519 has no public derivation, so its keys follow SLIP-10 with every
//! path element hardened: `m/44'/{coin_type}'/0'/0'/0'`.

use core::str::FromStr;

use bip32::{DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha512;
use zeroize::Zeroizing;

use super::PRIVATE_KEY_LEN;
use crate::error::{Error, Result};

type HmacSha512 = Hmac<Sha512>;

/// SLIP-44 coin type used when none is configured (Ethereum).
pub const DEFAULT_COIN_TYPE: u32 = 60;

/// Offset of hardened child indices.
const HARDENED: u32 = 1 << 31;

/// Generates a fresh English mnemonic.
///
/// # Arguments
///
/// * `words` - 12 or 24
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for any other word count.
pub fn generate_mnemonic(words: usize) -> Result<String> {
    let entropy_len = match words {
        12 => 16,
        24 => 32,
        other => {
            return Err(Error::InvalidInput(format!(
                "mnemonic must have 12 or 24 words, got {other}"
            )));
        }
    };

    let mut entropy = Zeroizing::new(vec![0u8; entropy_len]);
    OsRng.fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| Error::Derivation(format!("failed to build mnemonic: {e}")))?;
    Ok(mnemonic.to_string())
}

/// Converts a mnemonic to its 64-byte BIP-39 seed (empty passphrase).
///
/// # Errors
///
/// Returns [`Error::Derivation`] if the phrase is not a valid English
/// mnemonic (unknown word, bad checksum or bad length).
pub fn mnemonic_to_seed(phrase: &str) -> Result<Zeroizing<[u8; 64]>> {
    let mnemonic = Mnemonic::parse_in(Language::English, phrase)
        .map_err(|e| Error::Derivation(format!("invalid mnemonic: {e}")))?;
    Ok(Zeroizing::new(mnemonic.to_seed("")))
}

/// Derives the secp256k1 private key at `m/44'/{coin_type}'/0'/0/0`.
pub(crate) fn derive_secp256k1(
    phrase: &str,
    coin_type: u32,
) -> Result<Zeroizing<[u8; PRIVATE_KEY_LEN]>> {
    let seed = mnemonic_to_seed(phrase)?;
    let path = DerivationPath::from_str(&format!("m/44'/{coin_type}'/0'/0/0"))
        .map_err(|e| Error::Derivation(format!("invalid derivation path: {e}")))?;
    let xprv = XPrv::derive_from_path(seed.as_ref(), &path)
        .map_err(|e| Error::Derivation(e.to_string()))?;
    Ok(Zeroizing::new(xprv.to_bytes()))
}

/// Derives the Ed25519 private key at `m/44'/{coin_type}'/0'/0'/0'` (SLIP-10).
pub(crate) fn derive_ed25519(
    phrase: &str,
    coin_type: u32,
) -> Result<Zeroizing<[u8; PRIVATE_KEY_LEN]>> {
    let seed = mnemonic_to_seed(phrase)?;
    slip10_ed25519(seed.as_ref(), &[44, coin_type, 0, 0, 0])
}

/// SLIP-10 ed25519 derivation. Every index is hardened.
fn slip10_ed25519(seed: &[u8], path: &[u32]) -> Result<Zeroizing<[u8; PRIVATE_KEY_LEN]>> {
    let (mut key, mut chain_code) = slip10_split(b"ed25519 seed", seed)?;

    for &index in path {
        if index >= HARDENED {
            return Err(Error::Derivation(format!("path index {index} out of range")));
        }
        let mut data = Zeroizing::new(Vec::with_capacity(1 + PRIVATE_KEY_LEN + 4));
        data.push(0x00);
        data.extend_from_slice(key.as_ref());
        data.extend_from_slice(&(index | HARDENED).to_be_bytes());
        (key, chain_code) = slip10_split(chain_code.as_ref(), &data)?;
    }

    Ok(key)
}

type KeyAndChainCode = (
    Zeroizing<[u8; PRIVATE_KEY_LEN]>,
    Zeroizing<[u8; PRIVATE_KEY_LEN]>,
);

fn slip10_split(mac_key: &[u8], data: &[u8]) -> Result<KeyAndChainCode> {
    let mut mac = HmacSha512::new_from_slice(mac_key)
        .map_err(|e| Error::Derivation(format!("hmac init failed: {e}")))?;
    mac.update(data);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());

    let mut key = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    let mut chain_code = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
    key.copy_from_slice(&out[..32]);
    chain_code.copy_from_slice(&out[32..]);
    Ok((key, chain_code))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon about";

    #[test]
    fn generated_mnemonics_parse() {
        for words in [12, 24] {
            let phrase = generate_mnemonic(words).unwrap();
            assert_eq!(phrase.split_whitespace().count(), words);
            assert!(mnemonic_to_seed(&phrase).is_ok());
        }
        assert!(generate_mnemonic(15).is_err());
    }

    #[test]
    fn invalid_mnemonic_is_rejected() {
        let bad_checksum = ABANDON.replace("about", "abandon");
        assert!(matches!(
            mnemonic_to_seed(&bad_checksum),
            Err(Error::Derivation(_))
        ));
        assert!(mnemonic_to_seed("not a mnemonic").is_err());
    }

    #[test]
    fn bip44_ethereum_vector() {
        let key = derive_secp256k1(ABANDON, DEFAULT_COIN_TYPE).unwrap();
        assert_eq!(
            hex::encode(key.as_ref()),
            "1ab42cc412b618bdea3a599e3c9bae199ebf030895b039e9db1e30dafb12b727"
        );
    }

    #[test]
    fn coin_type_changes_keys() {
        let eth = derive_secp256k1(ABANDON, 60).unwrap();
        let atom = derive_secp256k1(ABANDON, 118).unwrap();
        assert_ne!(eth.as_ref(), atom.as_ref());

        let a = derive_ed25519(ABANDON, 60).unwrap();
        let b = derive_ed25519(ABANDON, 60).unwrap();
        let c = derive_ed25519(ABANDON, 501).unwrap();
        assert_eq!(a.as_ref(), b.as_ref());
        assert_ne!(a.as_ref(), c.as_ref());
    }

    #[test]
    fn slip10_master_key_vector() {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let (key, chain_code) = slip10_split(b"ed25519 seed", &seed).unwrap();
        assert_eq!(
            hex::encode(key.as_ref()),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(chain_code.as_ref()),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );
    }

    #[test]
    fn slip10_hardened_chain_vector() {
        // SLIP-10 ed25519 test vector 1.
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let path = [0, 1, 2, 2, 1_000_000_000];
        let expected = [
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7",
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3",
            "b1d0bad404bf35da785a64ca1ac54b2617211d2777696fbffaf208f746ae84f2",
            "92a5b23c0b8a99e37d07df3fb9966917f5d06e02ddbd909c7e184371463e9fc9",
            "30d1dc7e5fc04c31219ab25a27ae00b50f6fd66622f6e9c913253d6511d1e662",
            "8f94d394a8e8fd6b1bc2f3f49f5c47e385281d5c17e65324b0f62483e37e8793",
        ];

        for (depth, key) in expected.iter().enumerate() {
            let derived = slip10_ed25519(&seed, &path[..depth]).unwrap();
            assert_eq!(hex::encode(derived.as_ref()), *key, "depth {depth}");
        }
    }

    #[test]
    fn slip10_rejects_pre_hardened_indices() {
        assert!(matches!(
            slip10_ed25519(&[0; 16], &[HARDENED]),
            Err(Error::Derivation(_))
        ));
    }

    #[test]
    fn ed25519_mnemonic_vector() {
        let key = derive_ed25519(ABANDON, DEFAULT_COIN_TYPE).unwrap();
        assert_eq!(
            hex::encode(key.as_ref()),
            "4e578ced277a96ec9507366a159f9ce5b70789bbe8f934d2bc8ef43c9c2bca77"
        );
    }
}
