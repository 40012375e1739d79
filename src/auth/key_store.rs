//! Signing key pair lifecycle
//!
//! The pair is created lazily on first use and read back from the secret
//! store afterwards, so it survives restarts. The load, completeness check,
//! delete, generate and persist steps all run inside a single
//! [`SecretTransaction`], which is the store's critical section: concurrent
//! cold-start callers (in this process or any other sharing the store) end
//! up with exactly one persisted pair.
//!
//! Once loaded, the pair is served from a versioned in-process cache entry.
//! An entry older than the revalidation interval is checked against the
//! stored public key record before it is used again. A pair replaced by
//! another instance sharing the store is reloaded, and every replacement
//! bumps the generation. If the store is unreachable during revalidation the
//! cached pair keeps serving until the next interval.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::keys::{KeyDecodeError, KeyPair, PRIVATE_KEY_ID, PUBLIC_KEY_ID};
use crate::store::{SecretStore, SecretTransaction, StoreError};

/// 缓存条目与存储重新核对的默认间隔
pub const DEFAULT_REVALIDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Fatal key store failures. These surface as 500s, never as 401s.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("Secret store error: {0}")]
    Store(#[from] StoreError),

    #[error("Secret store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Key encoding failed: {0}")]
    KeyEncoding(String),
}

/// Cache entry: the pair plus the generation it was installed at
#[derive(Debug, Clone)]
pub struct CachedKeyPair {
    pub generation: u64,
    pub key_pair: Arc<KeyPair>,
    /// 存储中公钥记录的原始字节
    public_der: Vec<u8>,
    checked_at: Instant,
}

impl CachedKeyPair {
    fn is_fresh(&self, interval: Duration) -> bool {
        self.checked_at.elapsed() < interval
    }
}

pub struct KeyStore {
    store: Arc<dyn SecretStore>,
    timeout: Duration,
    revalidate_interval: Duration,
    cache: RwLock<Option<CachedKeyPair>>,
    generation: AtomicU64,
}

impl KeyStore {
    pub fn new(store: Arc<dyn SecretStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            revalidate_interval: DEFAULT_REVALIDATE_INTERVAL,
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// How long a cached pair is trusted before it is checked against the
    /// store again. `Duration::ZERO` checks on every call.
    pub fn with_revalidate_interval(mut self, interval: Duration) -> Self {
        self.revalidate_interval = interval;
        self
    }

    /// Returns the current key pair, creating and persisting one if the store
    /// holds no complete, usable pair.
    pub async fn get_or_create(&self) -> Result<Arc<KeyPair>, KeyStoreError> {
        let stale = match self.cache.read().await.as_ref() {
            Some(entry) if entry.is_fresh(self.revalidate_interval) => {
                return Ok(entry.key_pair.clone());
            }
            Some(entry) => Some((entry.generation, entry.key_pair.clone())),
            None => None,
        };

        match (self.load_or_regenerate(false).await, stale) {
            (Ok(key_pair), _) => Ok(key_pair),
            (Err(e), Some((generation, key_pair))) => {
                tracing::warn!(error = %e, generation, "Signing key revalidation failed, serving cached pair");
                self.defer_revalidation(generation).await;
                Ok(key_pair)
            }
            (Err(e), None) => Err(e),
        }
    }

    /// Discards the stored pair and persists a fresh one. Every token issued
    /// before this call stops verifying.
    pub async fn regenerate(&self) -> Result<Arc<KeyPair>, KeyStoreError> {
        self.load_or_regenerate(true).await
    }

    /// Drops the cached entry; the next call reloads from the store.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        tracing::debug!("Signing key cache invalidated");
    }

    /// Generation of the cached entry, 0 when nothing is cached.
    pub async fn generation(&self) -> u64 {
        self.cache
            .read()
            .await
            .as_ref()
            .map_or(0, |entry| entry.generation)
    }

    pub async fn health_check(&self) -> Result<(), KeyStoreError> {
        self.timed(self.store.health_check()).await
    }

    async fn load_or_regenerate(&self, force: bool) -> Result<Arc<KeyPair>, KeyStoreError> {
        let mut txn = self.timed(self.store.transaction()).await?;

        if !force {
            // 等锁期间可能已有其他调用者完成加载或核对
            if let Some(entry) = self
                .cache
                .read()
                .await
                .as_ref()
                .filter(|entry| entry.is_fresh(self.revalidate_interval))
            {
                return Ok(entry.key_pair.clone());
            }

            match self.load(txn.as_mut()).await? {
                Ok((key_pair, public_der)) => {
                    self.timed(txn.commit()).await?;
                    return Ok(self.confirm_or_install(key_pair, public_der).await);
                }
                Err(reason) => {
                    tracing::warn!(reason = %reason, "Stored signing key pair unusable, regenerating");
                }
            }
        }

        self.timed(txn.delete(PRIVATE_KEY_ID)).await?;
        self.timed(txn.delete(PUBLIC_KEY_ID)).await?;

        let key_pair = tokio::task::spawn_blocking(KeyPair::generate)
            .await
            .map_err(|e| KeyStoreError::KeyGeneration(e.to_string()))??;

        let public_der = key_pair.public_key_der()?;
        for secret in key_pair.to_secrets()? {
            self.timed(txn.put(secret.id, secret.value)).await?;
        }
        self.timed(txn.commit()).await?;

        metrics::counter!("auth_key_pair_regenerations_total").increment(1);
        let key_pair = self.install(key_pair, public_der).await;
        tracing::info!(forced = force, "Generated and persisted new signing key pair");

        Ok(key_pair)
    }

    async fn load(
        &self,
        txn: &mut dyn SecretTransaction,
    ) -> Result<Result<(KeyPair, Vec<u8>), KeyDecodeError>, KeyStoreError> {
        let private_der = self.timed(txn.get(PRIVATE_KEY_ID)).await?;
        let public_der = self.timed(txn.get(PUBLIC_KEY_ID)).await?;

        Ok(match (private_der, public_der) {
            (Some(private_der), Some(public_der)) => {
                KeyPair::decode(&private_der, &public_der).map(|key_pair| (key_pair, public_der))
            }
            (None, _) => Err(KeyDecodeError::Missing(PRIVATE_KEY_ID)),
            (_, None) => Err(KeyDecodeError::Missing(PUBLIC_KEY_ID)),
        })
    }

    /// Keeps the cached entry when the store still holds the same pair,
    /// otherwise installs the loaded one.
    async fn confirm_or_install(&self, key_pair: KeyPair, public_der: Vec<u8>) -> Arc<KeyPair> {
        {
            let mut cache = self.cache.write().await;
            if let Some(entry) = cache.as_mut().filter(|entry| entry.public_der == public_der) {
                entry.checked_at = Instant::now();
                return entry.key_pair.clone();
            }
        }

        tracing::debug!("Loaded signing key pair from secret store");
        self.install(key_pair, public_der).await
    }

    async fn install(&self, key_pair: KeyPair, public_der: Vec<u8>) -> Arc<KeyPair> {
        let key_pair = Arc::new(key_pair);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        *self.cache.write().await = Some(CachedKeyPair {
            generation,
            key_pair: key_pair.clone(),
            public_der,
            checked_at: Instant::now(),
        });

        tracing::debug!(generation, "Signing key cache updated");
        key_pair
    }

    async fn defer_revalidation(&self, generation: u64) {
        if let Some(entry) = self
            .cache
            .write()
            .await
            .as_mut()
            .filter(|entry| entry.generation == generation)
        {
            entry.checked_at = Instant::now();
        }
    }

    async fn timed<T, E>(&self, fut: impl Future<Output = Result<T, E>>) -> Result<T, KeyStoreError>
    where
        KeyStoreError: From<E>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(KeyStoreError::from),
            Err(_) => {
                tracing::error!(timeout_ms = self.timeout.as_millis() as u64, "Secret store call timed out");
                Err(KeyStoreError::Timeout(self.timeout))
            }
        }
    }
}
