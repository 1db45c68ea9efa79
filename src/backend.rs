//! Adapter selection for the recency cache and durable log.

use std::sync::Arc;

use tracing::info;

use crate::cache::{MemoryRecencyCache, RecencyCache, RedisRecencyCache};
use crate::config::{AppConfig, Backend};
use crate::storage::{DurableLog, MemoryEventLog, PostgresEventLog};

/// Boxed error for bootstrap failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connect the adapters selected by `config.backend`.
///
/// The external backend connects to Redis and PostgreSQL and creates the
/// events schema if missing. Either connection failing is fatal.
pub async fn connect_backends(
    config: &AppConfig,
) -> Result<(Arc<dyn RecencyCache>, Arc<dyn DurableLog>), BoxError> {
    match config.backend {
        Backend::External => {
            info!(
                redis = %config.redis.addr,
                postgres = %config.postgres.host,
                "Backend: external"
            );

            let cache = RedisRecencyCache::connect(&config.redis.addr, &config.redis.password).await?;
            let log = PostgresEventLog::connect(&config.postgres).await?;

            Ok((Arc::new(cache), Arc::new(log)))
        }
        Backend::Memory => {
            info!("Backend: memory (events are not persisted)");
            Ok((
                Arc::new(MemoryRecencyCache::new()),
                Arc::new(MemoryEventLog::new()),
            ))
        }
    }
}
