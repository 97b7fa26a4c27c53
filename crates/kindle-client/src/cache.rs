use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};

use kindle_crypto::keys::{entropy_to_hex, generate_software_entropy};
use kindle_types::api::IssuedEntropy;
use kindle_types::models::EntropySource;

use crate::error::ClientError;
use crate::issuer::EntropyIssuer;

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// How long an issued value is reused locally.
    pub ttl: Duration,
    /// Upper bound on one issuer round-trip.
    pub fetch_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(25),
            fetch_timeout: Duration::from_secs(5),
        }
    }
}

/// An entropy value plus how long ago it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntropy {
    pub entropy: IssuedEntropy,
    pub age_ms: u64,
}

struct Slot {
    entropy: IssuedEntropy,
    fetched_at: Instant,
}

/// Short-TTL memo in front of an [`EntropyIssuer`].
///
/// A hardware sample is single-use at the issuer, but a cached value is
/// reused here for every seal until it expires. That is fine because every
/// envelope derives its key with a fresh random salt.
///
/// The slot lock is never held across an await. Concurrent callers that miss
/// together each fetch; nothing depends on deduplicating them.
pub struct EntropyCache<I> {
    issuer: I,
    config: CacheConfig,
    slot: Mutex<Option<Slot>>,
}

impl<I: EntropyIssuer> EntropyCache<I> {
    pub fn new(issuer: I, config: CacheConfig) -> Self {
        Self {
            issuer,
            config,
            slot: Mutex::new(None),
        }
    }

    /// Cached value if still within the TTL, otherwise a live fetch. If the
    /// issuer fails or times out, returns local software entropy instead;
    /// the fallback is not cached so the next call retries the issuer.
    pub async fn fetch(&self) -> CachedEntropy {
        match self.try_fetch().await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Falling back to local software entropy: {}", e);
                CachedEntropy {
                    entropy: IssuedEntropy {
                        source: EntropySource::Software,
                        entropy_hex: entropy_to_hex(&generate_software_entropy()),
                        timestamp: Utc::now(),
                    },
                    age_ms: 0,
                }
            }
        }
    }

    /// Like [`fetch`](Self::fetch) but surfaces `EntropyUnavailable` instead
    /// of falling back.
    pub async fn try_fetch(&self) -> Result<CachedEntropy, ClientError> {
        if let Some(hit) = self.cached() {
            return Ok(hit);
        }

        let issued = tokio::time::timeout(self.config.fetch_timeout, self.issuer.fetch_entropy())
            .await
            .map_err(|_| {
                ClientError::EntropyUnavailable(format!(
                    "issuer did not answer within {:?}",
                    self.config.fetch_timeout
                ))
            })??;

        self.store(issued.clone());
        Ok(CachedEntropy {
            entropy: issued,
            age_ms: 0,
        })
    }

    /// Drop the cached value, e.g. on logout.
    pub fn invalidate(&self) {
        *self.lock() = None;
        debug!("Entropy cache invalidated");
    }

    fn cached(&self) -> Option<CachedEntropy> {
        let guard = self.lock();
        let slot = guard.as_ref()?;
        let age = slot.fetched_at.elapsed();
        if age >= self.config.ttl {
            return None;
        }
        Some(CachedEntropy {
            entropy: slot.entropy.clone(),
            age_ms: age.as_millis() as u64,
        })
    }

    fn store(&self, entropy: IssuedEntropy) {
        *self.lock() = Some(Slot {
            entropy,
            fetched_at: Instant::now(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Slot>> {
        // The slot holds plain data; a panic elsewhere cannot leave it half-written
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Clone, Copy)]
    enum Mode {
        Hardware,
        Fail,
        Hang,
    }

    struct FakeIssuer {
        calls: Arc<AtomicUsize>,
        mode: Mode,
    }

    impl EntropyIssuer for FakeIssuer {
        async fn fetch_entropy(&self) -> Result<IssuedEntropy, ClientError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Hardware => Ok(IssuedEntropy {
                    source: EntropySource::Hardware,
                    entropy_hex: format!("{:02x}", n as u8 + 1).repeat(32),
                    timestamp: Utc::now(),
                }),
                Mode::Fail => Err(ClientError::EntropyUnavailable("connection refused".into())),
                Mode::Hang => std::future::pending().await,
            }
        }
    }

    fn cache(mode: Mode) -> (EntropyCache<FakeIssuer>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let issuer = FakeIssuer {
            calls: calls.clone(),
            mode,
        };
        (EntropyCache::new(issuer, CacheConfig::default()), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn reuses_value_within_ttl() {
        let (cache, calls) = cache(Mode::Hardware);

        let first = cache.fetch().await;
        assert_eq!(first.age_ms, 0);
        assert_eq!(first.entropy.source, EntropySource::Hardware);

        tokio::time::advance(Duration::from_secs(10)).await;
        let second = cache.fetch().await;
        assert_eq!(second.entropy, first.entropy);
        assert_eq!(second.age_ms, 10_000);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_after_ttl() {
        let (cache, calls) = cache(Mode::Hardware);

        let first = cache.fetch().await;
        tokio::time::advance(Duration::from_secs(25)).await;
        let second = cache.fetch().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_ne!(second.entropy.entropy_hex, first.entropy.entropy_hex);
        assert_eq!(second.age_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_refetch() {
        let (cache, calls) = cache(Mode::Hardware);

        cache.fetch().await;
        cache.invalidate();
        cache.fetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_falls_back_without_caching() {
        let (cache, calls) = cache(Mode::Fail);

        let a = cache.fetch().await;
        let b = cache.fetch().await;
        assert_eq!(a.entropy.source, EntropySource::Software);
        assert_eq!(a.entropy.entropy_hex.len(), 64);
        assert_ne!(a.entropy.entropy_hex, b.entropy.entropy_hex);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(matches!(
            cache.try_fetch().await,
            Err(ClientError::EntropyUnavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_issuer_times_out_to_software() {
        let (cache, _) = cache(Mode::Hang);

        let start = Instant::now();
        let got = cache.fetch().await;
        assert_eq!(got.entropy.source, EntropySource::Software);
        assert!(start.elapsed() >= CacheConfig::default().fetch_timeout);
    }
}
