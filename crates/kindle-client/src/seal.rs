use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kindle_crypto::{EncryptedEnvelope, EncryptedFile, FileMetadata};
use kindle_types::api::{CreateFileRequest, StoreMessageRequest};
use kindle_types::models::EntropySource;

use crate::cache::EntropyCache;
use crate::error::ClientError;
use crate::issuer::EntropyIssuer;

/// A sealed message together with its entropy provenance.
///
/// The entropy value travels by value: the reader has no session shared
/// with the writer, only this record. `source` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedMessage {
    #[serde(flatten)]
    pub envelope: EncryptedEnvelope,
    pub entropy_hex: String,
    pub source: EntropySource,
}

impl SealedMessage {
    pub fn into_store_request(self, room_id: Uuid) -> StoreMessageRequest {
        StoreMessageRequest {
            room_id,
            ciphertext: self.envelope.ciphertext,
            iv: self.envelope.iv,
            salt: self.envelope.salt,
            entropy_hex: self.entropy_hex,
            source: self.source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedFile {
    pub file: EncryptedFile,
    pub entropy_hex: String,
    pub source: EntropySource,
}

impl SealedFile {
    /// Metadata half of the upload; the ciphertext goes to the object store.
    pub fn create_request(&self) -> CreateFileRequest {
        CreateFileRequest {
            iv: self.file.envelope.iv.clone(),
            salt: self.file.envelope.salt.clone(),
            entropy_hex: self.entropy_hex.clone(),
            source: self.source,
            mime_type: self.file.metadata.mime_type.clone(),
            size: self.file.metadata.size,
        }
    }

    /// Raw ciphertext bytes for the object store.
    pub fn ciphertext(&self) -> Result<Vec<u8>, ClientError> {
        Ok(self.file.envelope.ciphertext_bytes()?)
    }

    /// Rebuild a sealed file from stored metadata and downloaded ciphertext.
    pub fn from_parts(
        ciphertext: &[u8],
        iv: &str,
        salt: &str,
        metadata: FileMetadata,
        entropy_hex: String,
        source: EntropySource,
    ) -> Result<Self, ClientError> {
        let probe = EncryptedEnvelope {
            ciphertext: String::new(),
            iv: iv.to_string(),
            salt: salt.to_string(),
        };
        let envelope = EncryptedEnvelope::from_parts(ciphertext, &probe.iv_bytes()?, &probe.salt_bytes()?);
        Ok(Self {
            file: EncryptedFile { envelope, metadata },
            entropy_hex,
            source,
        })
    }
}

/// Encrypt a text message with entropy from `cache`. Never blocks on the
/// issuer beyond the cache's fetch timeout.
pub async fn seal_text<I: EntropyIssuer>(cache: &EntropyCache<I>, text: &str) -> Result<SealedMessage, ClientError> {
    let entropy = cache.fetch().await.entropy;
    let envelope = kindle_crypto::encrypt_text(text, &entropy.entropy_hex)?;
    Ok(SealedMessage {
        envelope,
        entropy_hex: entropy.entropy_hex,
        source: entropy.source,
    })
}

pub fn open_text(sealed: &SealedMessage) -> Result<String, ClientError> {
    Ok(kindle_crypto::decrypt_text(&sealed.envelope, &sealed.entropy_hex)?)
}

pub async fn seal_file<I: EntropyIssuer>(
    cache: &EntropyCache<I>,
    bytes: &[u8],
    mime_type: &str,
) -> Result<SealedFile, ClientError> {
    let entropy = cache.fetch().await.entropy;
    let file = kindle_crypto::encrypt_file(bytes, &entropy.entropy_hex, mime_type)?;
    Ok(SealedFile {
        file,
        entropy_hex: entropy.entropy_hex,
        source: entropy.source,
    })
}

pub fn open_file(sealed: &SealedFile) -> Result<Vec<u8>, ClientError> {
    Ok(kindle_crypto::decrypt_file(&sealed.file, &sealed.entropy_hex)?)
}
