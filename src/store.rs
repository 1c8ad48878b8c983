//! Thin adapter over the durable key-value store (Redis): scalars, one
//! hash, and lists, plus pipelined hash fills and a full-namespace flush.
//! The single source of truth for bulk pending work and results.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{error, info};

use crate::errors::ServiceError;

const MAX_CONNECT_RETRIES: u32 = 10;
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Hash inserts are pipelined in batches of at most this many entries.
pub const PIPELINE_MAX_BATCH: usize = 100;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect using `REDIS_HOST` / `REDIS_PORT` / `REDIS_DB` (defaults
    /// `localhost` / `6379` / `0`), retrying with a fixed interval before
    /// giving up.
    pub async fn connect() -> Result<Self, ServiceError> {
        let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".into());
        let port = std::env::var("REDIS_PORT").unwrap_or_else(|_| "6379".into());
        let db = std::env::var("REDIS_DB").unwrap_or_else(|_| "0".into());

        let url = format!("redis://{host}:{port}/{db}");
        let client = redis::Client::open(url.as_str())?;

        let mut retry_count = 1;
        loop {
            match client.get_connection_manager().await {
                Ok(mut conn) => {
                    match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
                        Ok(_) => {
                            info!("Connected to Redis {}:{} DB {}", host, port, db);
                            return Ok(Self { conn });
                        }
                        Err(err) => {
                            error!("Failed to ping Redis {}:{}: {}", host, port, err);
                        }
                    }
                }
                Err(err) => {
                    error!("Failed to connect to Redis {}:{}: {}", host, port, err);
                }
            }

            if retry_count >= MAX_CONNECT_RETRIES {
                return Err(ServiceError::Internal(format!(
                    "failed to connect to Redis after {MAX_CONNECT_RETRIES} retries"
                )));
            }
            info!(
                "Performing retry {} after {} seconds",
                retry_count,
                CONNECT_RETRY_INTERVAL.as_secs()
            );
            tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            retry_count += 1;
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    pub async fn set_bytes(&self, key: &str, value: &[u8]) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ServiceError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    pub async fn del(&self, key: &str) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    pub async fn hdel(&self, key: &str, field: &str) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(key, field).await?;
        Ok(())
    }

    pub async fn hlen(&self, key: &str) -> Result<u64, ServiceError> {
        let mut conn = self.conn.clone();
        Ok(conn.hlen(key).await?)
    }

    pub async fn hgetall(
        &self,
        key: &str,
    ) -> Result<std::collections::HashMap<String, String>, ServiceError> {
        let mut conn = self.conn.clone();
        Ok(conn.hgetall(key).await?)
    }

    /// Pipelined hash fill in transactional batches of `PIPELINE_MAX_BATCH`.
    pub async fn hset_batched(
        &self,
        key: &str,
        entries: &[(String, String)],
    ) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        for chunk in entries.chunks(PIPELINE_MAX_BATCH) {
            let mut pipe = redis::pipe();
            pipe.atomic();
            for (field, value) in chunk {
                pipe.hset(key, field, value).ignore();
            }
            pipe.query_async::<_, ()>(&mut conn).await?;
        }
        Ok(())
    }

    pub async fn rpush(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(key, value).await?;
        Ok(())
    }

    pub async fn lrange_all(&self, key: &str) -> Result<Vec<String>, ServiceError> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, 0, -1).await?)
    }

    pub async fn llen(&self, key: &str) -> Result<u64, ServiceError> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(key).await?)
    }

    /// Flush the whole DB namespace. Only the bulk scheduler's clear
    /// operation uses this.
    pub async fn flush_db(&self) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        redis::cmd("FLUSHDB").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
