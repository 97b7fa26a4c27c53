use aes_gcm::{
    Nonce,
    aead::{Aead, OsRng, rand_core::RngCore},
};

use crate::envelope::{EncryptedEnvelope, EncryptedFile, FileMetadata, IV_LEN};
use crate::error::CryptoError;
use crate::kdf::derive_from_hex;

/// Seal `plaintext` under a key derived from `entropy_hex` and a fresh salt.
/// The IV is random per call.
pub fn encrypt(plaintext: &[u8], entropy_hex: &str) -> Result<EncryptedEnvelope, CryptoError> {
    let (key, salt) = derive_from_hex(entropy_hex, None)?;

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok(EncryptedEnvelope::from_parts(&ciphertext, &iv, &salt))
}

/// Open an envelope sealed by [`encrypt`] with the same entropy value.
pub fn decrypt(envelope: &EncryptedEnvelope, entropy_hex: &str) -> Result<Vec<u8>, CryptoError> {
    let ciphertext = envelope.ciphertext_bytes()?;
    let iv = envelope.iv_bytes()?;
    let salt = envelope.salt_bytes()?;

    let (key, _) = derive_from_hex(entropy_hex, Some(&salt))?;

    key.cipher()
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptionIntegrityFailure)
}

pub fn encrypt_text(text: &str, entropy_hex: &str) -> Result<EncryptedEnvelope, CryptoError> {
    encrypt(text.as_bytes(), entropy_hex)
}

pub fn decrypt_text(envelope: &EncryptedEnvelope, entropy_hex: &str) -> Result<String, CryptoError> {
    let plaintext = decrypt(envelope, entropy_hex)?;
    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::TransportEncodingError("plaintext is not UTF-8".into()))
}

/// Seal a file body. `mime_type` and the plaintext size ride along in clear.
pub fn encrypt_file(bytes: &[u8], entropy_hex: &str, mime_type: &str) -> Result<EncryptedFile, CryptoError> {
    let envelope = encrypt(bytes, entropy_hex)?;
    Ok(EncryptedFile {
        envelope,
        metadata: FileMetadata {
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
        },
    })
}

pub fn decrypt_file(file: &EncryptedFile, entropy_hex: &str) -> Result<Vec<u8>, CryptoError> {
    decrypt(&file.envelope, entropy_hex)
}
