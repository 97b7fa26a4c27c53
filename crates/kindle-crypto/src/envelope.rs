use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// AES-GCM nonce length.
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length, appended to the ciphertext.
pub const TAG_LEN: usize = 16;

/// Everything needed, besides the entropy value, to open a sealed payload.
/// All fields are standard base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
}

impl EncryptedEnvelope {
    pub fn from_parts(ciphertext: &[u8], iv: &[u8], salt: &[u8]) -> Self {
        Self {
            ciphertext: BASE64.encode(ciphertext),
            iv: BASE64.encode(iv),
            salt: BASE64.encode(salt),
        }
    }

    pub fn ciphertext_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        decode_field("ciphertext", &self.ciphertext)
    }

    pub fn iv_bytes(&self) -> Result<[u8; IV_LEN], CryptoError> {
        let iv = decode_field("iv", &self.iv)?;
        let len = iv.len();
        iv.try_into().map_err(|_| {
            CryptoError::TransportEncodingError(format!("iv must be {} bytes, got {}", IV_LEN, len))
        })
    }

    pub fn salt_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        decode_field("salt", &self.salt)
    }

    /// Check that every field decodes and has a usable shape, without
    /// decrypting. Used by the record store before persisting envelopes.
    pub fn validate(&self) -> Result<(), CryptoError> {
        let ciphertext = self.ciphertext_bytes()?;
        if ciphertext.len() < TAG_LEN {
            return Err(CryptoError::TransportEncodingError(format!(
                "ciphertext shorter than the {}-byte tag",
                TAG_LEN
            )));
        }
        self.iv_bytes()?;
        if self.salt_bytes()?.is_empty() {
            return Err(CryptoError::TransportEncodingError("salt is empty".into()));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::TransportEncodingError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json).map_err(|e| CryptoError::TransportEncodingError(e.to_string()))
    }
}

/// Unencrypted file metadata. Travels beside the envelope and is not
/// covered by the authentication tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFile {
    pub envelope: EncryptedEnvelope,
    pub metadata: FileMetadata,
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    BASE64
        .decode(value)
        .map_err(|e| CryptoError::TransportEncodingError(format!("{} is not base64: {}", name, e)))
}
