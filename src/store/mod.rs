//! 密钥存储抽象
//!
//! A generic key-value secret store. Keys are plain strings and values are
//! opaque bytes; the signing key pair layout lives in [`crate::auth::key_store`].
//!
//! All access goes through [`SecretStore::transaction`]. A store hands out at
//! most one open transaction at a time, so a read-check-write sequence inside
//! a transaction is a critical section. Dropping a transaction without calling
//! [`SecretTransaction::commit`] discards its writes.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

pub use memory::MemorySecretStore;
pub use postgres::PgSecretStore;

/// 存储层错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Secret store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Begins a serialized unit of work. Waits while another transaction is open.
    async fn transaction(&self) -> Result<Box<dyn SecretTransaction>, StoreError>;

    /// Verifies the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SecretTransaction: Send {
    /// Reads a value, observing this transaction's own pending writes.
    async fn get(&mut self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&mut self, id: &str, value: Vec<u8>) -> Result<(), StoreError>;

    async fn delete(&mut self, id: &str) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
