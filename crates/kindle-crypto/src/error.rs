use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key derivation input: {0}")]
    KeyDerivationInputInvalid(String),

    /// Authentication tag mismatch. Tampering, corruption, or the wrong
    /// entropy value; the plaintext is never returned.
    #[error("cannot decrypt: integrity check failed")]
    DecryptionIntegrityFailure,

    #[error("malformed envelope: {0}")]
    TransportEncodingError(String),

    #[error("encryption failed")]
    EncryptionFailed,
}
