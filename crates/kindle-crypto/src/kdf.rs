use std::fmt;

use aes_gcm::{Aes256Gcm, Key, aead::KeyInit};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::keys::{ENTROPY_LEN, entropy_from_hex, random_salt};

/// HKDF info string. Binds every derived key to this protocol version.
pub const KDF_INFO: &[u8] = b"kindle/e2ee/aes-256-gcm/v1";

pub const KEY_LEN: usize = 32;

/// A 256-bit AES-GCM key that lives for exactly one seal or open.
///
/// The key bytes are wiped on drop and are never exposed; the only thing a
/// caller can do with it is hand it back to this crate's cipher.
pub struct DerivedKey {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl DerivedKey {
    pub(crate) fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.key.as_slice()))
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Derive a key from raw entropy.
///
/// With `salt = None` a fresh 32-byte salt is generated (sealing); with
/// `Some(salt)` the salt is used verbatim (opening). The salt actually used is
/// returned alongside the key.
pub fn derive(entropy: &[u8], salt: Option<&[u8]>) -> Result<(DerivedKey, Vec<u8>), CryptoError> {
    if entropy.len() != ENTROPY_LEN {
        return Err(CryptoError::KeyDerivationInputInvalid(format!(
            "entropy must be {} bytes, got {}",
            ENTROPY_LEN,
            entropy.len()
        )));
    }

    let salt = match salt {
        Some(s) => s.to_vec(),
        None => random_salt().to_vec(),
    };

    let hk = Hkdf::<Sha256>::new(Some(&salt), entropy);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(KDF_INFO, key.as_mut_slice())
        .map_err(|e| CryptoError::KeyDerivationInputInvalid(format!("HKDF expand: {}", e)))?;

    Ok((DerivedKey { key }, salt))
}

/// Same as [`derive`], taking the entropy in its hex transport form.
pub fn derive_from_hex(entropy_hex: &str, salt: Option<&[u8]>) -> Result<(DerivedKey, Vec<u8>), CryptoError> {
    let entropy = Zeroizing::new(entropy_from_hex(entropy_hex)?);
    derive(entropy.as_slice(), salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SALT_LEN;

    fn entropy() -> Vec<u8> {
        (1..=32).collect()
    }

    #[test]
    fn same_inputs_same_key() {
        let salt = [7u8; SALT_LEN];
        let (a, _) = derive(&entropy(), Some(&salt)).unwrap();
        let (b, _) = derive(&entropy(), Some(&salt)).unwrap();
        assert_eq!(*a.key, *b.key);
    }

    #[test]
    fn different_salt_different_key() {
        let (a, _) = derive(&entropy(), Some(&[1u8; SALT_LEN])).unwrap();
        let (b, _) = derive(&entropy(), Some(&[2u8; SALT_LEN])).unwrap();
        assert_ne!(*a.key, *b.key);
    }

    #[test]
    fn generated_salt_is_returned_and_reusable() {
        let (a, salt) = derive(&entropy(), None).unwrap();
        assert_eq!(salt.len(), SALT_LEN);

        let (b, echoed) = derive(&entropy(), Some(&salt)).unwrap();
        assert_eq!(echoed, salt);
        assert_eq!(*a.key, *b.key);
    }

    #[test]
    fn fresh_salts_differ() {
        let (_, s1) = derive(&entropy(), None).unwrap();
        let (_, s2) = derive(&entropy(), None).unwrap();
        assert_ne!(s1, s2);
    }

    #[test]
    fn wrong_entropy_length_rejected() {
        for len in [0usize, 16, 31, 33, 64] {
            let result = derive(&vec![0xAB; len], None);
            assert!(matches!(result, Err(CryptoError::KeyDerivationInputInvalid(_))));
        }
    }

    #[test]
    fn hex_path_matches_raw_path() {
        let salt = [9u8; SALT_LEN];
        let (a, _) = derive(&entropy(), Some(&salt)).unwrap();
        let (b, _) = derive_from_hex(&hex::encode(entropy()), Some(&salt)).unwrap();
        assert_eq!(*a.key, *b.key);
    }

    #[test]
    fn debug_does_not_leak_key() {
        let (key, _) = derive(&entropy(), None).unwrap();
        assert_eq!(format!("{:?}", key), "DerivedKey(<redacted>)");
    }
}
