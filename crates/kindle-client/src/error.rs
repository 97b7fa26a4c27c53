use thiserror::Error;

use kindle_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The issuer could not be reached, timed out, or answered with an
    /// error. Recoverable: callers fall back to software entropy.
    #[error("entropy unavailable: {0}")]
    EntropyUnavailable(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl ClientError {
    /// True when the payload could not be authenticated. Must be shown to
    /// the user as "cannot decrypt", never swallowed.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, ClientError::Crypto(CryptoError::DecryptionIntegrityFailure))
    }
}
