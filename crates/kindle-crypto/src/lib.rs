//! Kindle Crypto Library
//!
//! Turns a 32-byte entropy value into an AES-256-GCM key with HKDF-SHA256 and
//! seals messages and files into transport envelopes.
//!
//! Every envelope gets a fresh random salt and a fresh random IV, so two
//! envelopes sealed with the same entropy value never share a key/IV pair.
//! Anyone holding the entropy value and the envelope can re-derive the key;
//! the entropy issuer is therefore a trusted party.
//!
//! Nothing here touches the network or disk.

pub mod envelope;
pub mod error;
pub mod keys;

#[cfg(feature = "client")]
pub mod encrypt;
#[cfg(feature = "client")]
pub mod kdf;

pub use envelope::{EncryptedEnvelope, EncryptedFile, FileMetadata};
pub use error::CryptoError;

#[cfg(feature = "client")]
pub use encrypt::{decrypt, decrypt_file, decrypt_text, encrypt, encrypt_file, encrypt_text};
