//! 内存密钥存储
//!
//! Process-local [`SecretStore`]. Suitable for tests and single-process
//! development; nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{SecretStore, SecretTransaction, StoreError};

#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一条记录（绕过事务，用于预置数据）
    pub async fn insert(&self, id: &str, value: Vec<u8>) {
        self.entries.lock().await.insert(id.to_string(), value);
    }

    /// 直接读取一条记录
    pub async fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.entries.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn transaction(&self) -> Result<Box<dyn SecretTransaction>, StoreError> {
        let guard = self.entries.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard,
            pending: Vec::new(),
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

enum PendingWrite {
    Put(String, Vec<u8>),
    Delete(String),
}

/// Holds the store's lock for its whole lifetime. Writes are buffered and
/// applied only on commit.
struct MemoryTransaction {
    guard: OwnedMutexGuard<HashMap<String, Vec<u8>>>,
    pending: Vec<PendingWrite>,
}

#[async_trait]
impl SecretTransaction for MemoryTransaction {
    async fn get(&mut self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        // 最近一次未提交写入优先
        for write in self.pending.iter().rev() {
            match write {
                PendingWrite::Put(key, value) if key == id => return Ok(Some(value.clone())),
                PendingWrite::Delete(key) if key == id => return Ok(None),
                _ => {}
            }
        }
        Ok(self.guard.get(id).cloned())
    }

    async fn put(&mut self, id: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.pending.push(PendingWrite::Put(id.to_string(), value));
        Ok(())
    }

    async fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.pending.push(PendingWrite::Delete(id.to_string()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, pending } = *self;
        for write in pending {
            match write {
                PendingWrite::Put(key, value) => {
                    guard.insert(key, value);
                }
                PendingWrite::Delete(key) => {
                    guard.remove(&key);
                }
            }
        }
        Ok(())
    }
}
