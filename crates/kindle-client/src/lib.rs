//! Client side of the entropy protocol.
//!
//! [`EntropyCache`] memoizes issued entropy for a short TTL and falls back to
//! local software entropy whenever the issuer is slow or unreachable, so the
//! encrypt path never stalls. The `seal_*`/`open_*` helpers bind each
//! envelope to the entropy value that produced it.

pub mod cache;
pub mod error;
pub mod issuer;
pub mod seal;

pub use cache::{CacheConfig, CachedEntropy, EntropyCache};
pub use error::ClientError;
pub use issuer::{EntropyIssuer, HttpIssuer};
pub use seal::{SealedFile, SealedMessage, open_file, open_text, seal_file, seal_text};
