use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;

use crate::error::CryptoError;

/// Raw entropy length in bytes. Hex form is twice that.
pub const ENTROPY_LEN: usize = 32;

/// Salt length used when a fresh salt is generated.
pub const SALT_LEN: usize = 32;

/// 32 bytes from the OS CSPRNG, used when no hardware sample is available.
pub fn generate_software_entropy() -> [u8; ENTROPY_LEN] {
    let mut entropy = [0u8; ENTROPY_LEN];
    OsRng.fill_bytes(&mut entropy);
    entropy
}

pub fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Lowercase hex, the canonical digest form stored in the entropy log.
pub fn entropy_to_hex(entropy: &[u8]) -> String {
    hex::encode(entropy)
}

/// Decode a hex entropy value. Anything that is not exactly 32 bytes of hex
/// is unusable as key material.
pub fn entropy_from_hex(encoded: &str) -> Result<[u8; ENTROPY_LEN], CryptoError> {
    let bytes = hex::decode(encoded)
        .map_err(|e| CryptoError::KeyDerivationInputInvalid(format!("entropy is not hex: {}", e)))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| {
        CryptoError::KeyDerivationInputInvalid(format!(
            "entropy must be {} bytes, got {}",
            ENTROPY_LEN, len
        ))
    })
}

/// All-zero or all-one payloads come from a stuck or disconnected source.
pub fn is_degenerate(entropy: &[u8]) -> bool {
    !entropy.is_empty()
        && (entropy.iter().all(|&b| b == 0x00) || entropy.iter().all(|&b| b == 0xFF))
}
