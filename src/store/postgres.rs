//! PostgreSQL 密钥存储
//!
//! Records live in the `secrets` table (see `migrations/`). Each transaction
//! takes a transaction-scoped advisory lock so that regenerations are
//! serialized across every process sharing the database, not just within one.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use super::{SecretStore, SecretTransaction, StoreError};

/// Advisory lock key guarding the `secrets` table ("lpsecret" as ASCII).
const SECRETS_LOCK_KEY: i64 = 0x6c70_7365_6372_6574;

pub struct PgSecretStore {
    db: PgPool,
}

impl PgSecretStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SecretStore for PgSecretStore {
    async fn transaction(&self) -> Result<Box<dyn SecretTransaction>, StoreError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SECRETS_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgSecretTransaction { tx }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        match crate::db::health_check(&self.db).await {
            crate::db::HealthStatus::Healthy => Ok(()),
            crate::db::HealthStatus::Unhealthy(msg) => Err(StoreError::Unavailable(msg)),
        }
    }
}

/// Rolled back by sqlx when dropped without commit.
struct PgSecretTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl SecretTransaction for PgSecretTransaction {
    async fn get(&mut self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value = sqlx::query_scalar::<_, Vec<u8>>("SELECT value FROM secrets WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(value)
    }

    async fn put(&mut self, id: &str, value: Vec<u8>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO secrets (id, value)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(id)
        .bind(value)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM secrets WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
