//! Environment-driven configuration
//!
//! Every setting has a default, so the service starts with no environment at
//! all. Numeric settings that are present but unparseable are an error rather
//! than a silent fallback.

use std::net::SocketAddr;
use std::time::Duration;

use crate::hub::HubConfig;
use crate::pipeline::PipelineConfig;
use crate::storage::PostgresConfig;

/// Default HTTP listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8083";

/// Default location of the RS256 verification key
pub const DEFAULT_PUBLIC_KEY_PATH: &str = "/app/keys/public.pem";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: expected {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Which adapters back the cache and the durable log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Redis recency cache + PostgreSQL durable log
    External,
    /// In-process adapters, nothing survives a restart
    Memory,
}

/// Where the JWT verification key comes from
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Inline PEM; wins over the path when set
    pub public_key_pem: Option<String>,
    pub public_key_path: String,
}

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub addr: String,
    pub password: String,
}

/// Full service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub backend: Backend,
    pub pipeline: PipelineConfig,
    pub hub: HubConfig,
    pub redis: RedisConfig,
    pub postgres: PostgresConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` to resolve variable names
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let bind_addr = env.parse("AUDIT_BIND_ADDR", "a socket address", DEFAULT_BIND_ADDR)?;

        let backend = match env.string("AUDIT_BACKEND", "external").to_ascii_lowercase().as_str() {
            "external" => Backend::External,
            "memory" => Backend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    var: "AUDIT_BACKEND",
                    expected: "\"external\" or \"memory\"",
                    value: other.to_string(),
                })
            }
        };

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            queue_capacity: env.number("AUDIT_QUEUE_CAPACITY", defaults.queue_capacity)?,
            flush_interval: Duration::from_millis(env.positive(
                "AUDIT_FLUSH_INTERVAL_MS",
                defaults.flush_interval.as_millis() as u64,
            )?),
            flush_retries: env.number("AUDIT_FLUSH_RETRIES", defaults.flush_retries)?,
            retry_delay: defaults.retry_delay,
        };

        let hub_defaults = HubConfig::default();
        let hub = HubConfig {
            signal_capacity: env.number("AUDIT_HUB_BUFFER", hub_defaults.signal_capacity)?,
            client_capacity: env.number("AUDIT_CLIENT_BUFFER", hub_defaults.client_capacity)?,
        };

        let redis = RedisConfig {
            addr: env.string("REDIS_ADDR", "localhost:6379"),
            password: env.string("REDIS_PASSWORD", ""),
        };

        let pg_defaults = PostgresConfig::default();
        let postgres = PostgresConfig {
            host: env.string("POSTGRES_HOST", &pg_defaults.host),
            port: env.number("POSTGRES_PORT", pg_defaults.port)?,
            user: env.string("POSTGRES_USER", &pg_defaults.user),
            password: env.string("POSTGRES_PASSWORD", &pg_defaults.password),
            database: env.string("POSTGRES_DB", &pg_defaults.database),
            max_connections: pg_defaults.max_connections,
        };

        let auth = AuthConfig {
            public_key_pem: env.get("JWT_PUBLIC_KEY"),
            public_key_path: env.string("JWT_PUBLIC_KEY_PATH", DEFAULT_PUBLIC_KEY_PATH),
        };

        Ok(Self {
            bind_addr,
            backend,
            pipeline,
            hub,
            redis,
            postgres,
            auth,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value of `name`
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn number<T: std::str::FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: name,
                expected: "a non-negative integer",
                value: raw,
            }),
            None => Ok(default),
        }
    }

    /// Like `number`, but zero is rejected
    fn positive(&self, name: &'static str, default: u64) -> Result<u64, ConfigError> {
        match self.number(name, default)? {
            0 => Err(ConfigError::Invalid {
                var: name,
                expected: "a positive integer",
                value: "0".to_string(),
            }),
            n => Ok(n),
        }
    }

    fn parse<T: std::str::FromStr>(
        &self,
        name: &'static str,
        expected: &'static str,
        default: &str,
    ) -> Result<T, ConfigError> {
        let raw = self.string(name, default);
        raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name,
            expected,
            value: raw,
        })
    }
}
