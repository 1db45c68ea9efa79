//! PostgreSQL durable log implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};

use super::{DurableLog, EventRow, StorageResult, INSERT_CHUNK};
use crate::types::{AgentStats, Event, EventPage};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS events (
        id BIGSERIAL PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        event_type VARCHAR(255) NOT NULL,
        timestamp TIMESTAMPTZ,
        source_agent_id VARCHAR(255) NOT NULL DEFAULT '',
        source_agent_name VARCHAR(255) NOT NULL DEFAULT '',
        source_agent_mood JSONB,
        source_agent_relationships JSONB,
        source_agent_activity JSONB,
        source_agent_plan JSONB,
        source_agent_extra JSONB,
        target_agents JSONB,
        message TEXT,
        tick BIGINT,
        is_initiative BOOLEAN,
        action_result TEXT,
        event_data JSONB,
        simulation_context JSONB,
        processed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        processed_ts BIGINT NOT NULL DEFAULT 0
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_events_created_at ON events (created_at DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_events_event_type ON events (event_type)",
    "CREATE INDEX IF NOT EXISTS idx_events_source_agent_id ON events (source_agent_id)",
    "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events (timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_events_tick ON events (tick)",
];

const SELECT_COLUMNS: &str = "id, created_at, event_type, timestamp, source_agent_id, \
    source_agent_name, source_agent_mood, source_agent_relationships, source_agent_activity, \
    source_agent_plan, source_agent_extra, target_agents, message, tick, is_initiative, \
    action_result, event_data, simulation_context, processed_at, processed_ts";

/// Connection settings for the durable log
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "user".to_string(),
            password: "password".to_string(),
            database: "audit".to_string(),
            max_connections: 25,
        }
    }
}

/// PostgreSQL implementation of DurableLog.
pub struct PostgresEventLog {
    pool: PgPool,
}

impl PostgresEventLog {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from config, then create the schema if missing.
    pub async fn connect(config: &PostgresConfig) -> StorageResult<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .max_lifetime(Duration::from_secs(5 * 60))
            .connect_with(options)
            .await?;

        info!(host = %config.host, database = %config.database, "Connected to PostgreSQL");

        let log = Self::new(pool);
        log.init().await?;
        Ok(log)
    }

    /// Create the events table and indexes.
    pub async fn init(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        info!("Database migrations completed");
        Ok(())
    }

    async fn count_where(&self, column: Option<(&str, &str)>) -> StorageResult<i64> {
        let total = match column {
            Some((name, value)) => {
                let sql = format!("SELECT COUNT(*) FROM events WHERE {} = $1", name);
                sqlx::query_scalar::<_, i64>(&sql)
                    .bind(value)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(total)
    }
}

fn json_column(row: &PgRow, name: &str) -> Result<Option<Value>, sqlx::Error> {
    let value: Option<Json<Value>> = row.try_get(name)?;
    Ok(value.map(|j| j.0))
}

fn row_from_pg(row: &PgRow) -> Result<EventRow, sqlx::Error> {
    Ok(EventRow {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        event_type: row.try_get("event_type")?,
        timestamp: row.try_get("timestamp")?,
        source_agent_id: row.try_get("source_agent_id")?,
        source_agent_name: row.try_get("source_agent_name")?,
        source_agent_mood: json_column(row, "source_agent_mood")?,
        source_agent_relationships: json_column(row, "source_agent_relationships")?,
        source_agent_activity: json_column(row, "source_agent_activity")?,
        source_agent_plan: json_column(row, "source_agent_plan")?,
        source_agent_extra: json_column(row, "source_agent_extra")?,
        target_agents: json_column(row, "target_agents")?,
        message: row.try_get("message")?,
        tick: row.try_get("tick")?,
        is_initiative: row.try_get("is_initiative")?,
        action_result: row.try_get("action_result")?,
        event_data: json_column(row, "event_data")?,
        simulation_context: json_column(row, "simulation_context")?,
        processed_at: row.try_get("processed_at")?,
        processed_ts: row.try_get("processed_ts")?,
    })
}

fn events_from_rows(rows: &[PgRow]) -> StorageResult<Vec<Event>> {
    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        events.push(row_from_pg(row)?.into_event());
    }
    Ok(events)
}

#[async_trait]
impl DurableLog for PostgresEventLog {
    async fn batch_insert(&self, events: &[Event]) -> StorageResult<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let rows = events
            .iter()
            .map(EventRow::from_event)
            .collect::<StorageResult<Vec<_>>>()?;

        // One transaction so a batch lands entirely or not at all
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO events (event_type, timestamp, source_agent_id, source_agent_name, \
                 source_agent_mood, source_agent_relationships, source_agent_activity, \
                 source_agent_plan, source_agent_extra, target_agents, message, tick, \
                 is_initiative, action_result, event_data, simulation_context, processed_at, \
                 processed_ts) ",
            );
            builder.push_values(chunk, |mut b, row| {
                b.push_bind(row.event_type.clone())
                    .push_bind(row.timestamp)
                    .push_bind(row.source_agent_id.clone())
                    .push_bind(row.source_agent_name.clone())
                    .push_bind(row.source_agent_mood.clone().map(Json))
                    .push_bind(row.source_agent_relationships.clone().map(Json))
                    .push_bind(row.source_agent_activity.clone().map(Json))
                    .push_bind(row.source_agent_plan.clone().map(Json))
                    .push_bind(row.source_agent_extra.clone().map(Json))
                    .push_bind(row.target_agents.clone().map(Json))
                    .push_bind(row.message.clone())
                    .push_bind(row.tick)
                    .push_bind(row.is_initiative)
                    .push_bind(row.action_result.clone())
                    .push_bind(row.event_data.clone().map(Json))
                    .push_bind(row.simulation_context.clone().map(Json))
                    .push_bind(row.processed_at)
                    .push_bind(row.processed_ts);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        debug!(rows = inserted, "Batch saved events to PostgreSQL");
        Ok(inserted)
    }

    async fn list_recent(&self, limit: usize, offset: usize) -> StorageResult<EventPage> {
        let total = self.count_where(None).await?;

        let sql = format!(
            "SELECT {} FROM events ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(EventPage::new(events_from_rows(&rows)?, total))
    }

    async fn list_by_agent(
        &self,
        agent_id: &str,
        limit: usize,
        offset: usize,
    ) -> StorageResult<EventPage> {
        let total = self.count_where(Some(("source_agent_id", agent_id))).await?;

        let sql = format!(
            "SELECT {} FROM events WHERE source_agent_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(agent_id)
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(EventPage::new(events_from_rows(&rows)?, total))
    }

    async fn list_by_type(&self, event_type: &str, limit: usize) -> StorageResult<Vec<Event>> {
        let sql = format!(
            "SELECT {} FROM events WHERE event_type = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(event_type)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        events_from_rows(&rows)
    }

    async fn agent_stats(&self, agent_id: &str) -> StorageResult<AgentStats> {
        let rows = sqlx::query(
            "SELECT event_type, COUNT(*) AS count, MIN(processed_at) AS first_seen, \
             MAX(processed_at) AS last_seen FROM events WHERE source_agent_id = $1 \
             GROUP BY event_type",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = AgentStats::empty(agent_id);
        for row in rows {
            let event_type: String = row.try_get("event_type")?;
            stats.record(
                &event_type,
                row.try_get("count")?,
                row.try_get("first_seen")?,
                row.try_get("last_seen")?,
            );
        }
        Ok(stats)
    }

    fn backend(&self) -> &'static str {
        "postgresql"
    }
}
