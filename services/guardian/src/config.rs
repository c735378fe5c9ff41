//! Service configuration.
//!
//! # Purpose
//! Builds [`GuardianConfig`] once at startup from environment variables, optionally overridden
//! by a YAML file named in `GUARDIAN_CONFIG`. The resulting value is passed down explicitly;
//! nothing below `main` reads the process environment.
//!
//! # Security notes
//! `DatabaseConfig` holds a password; its `Debug` output redacts it.
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_METRICS_BIND: &str = "0.0.0.0:9090";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" => Ok(Self::Postgres),
            other => bail!("unknown storage backend {other:?}"),
        }
    }
}

/// Connection parameters for the Postgres database.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection-pool sizing and fail-fast limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

impl PoolConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardianConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GuardianConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<StorageBackend>,
    request_timeout_ms: Option<u64>,
    database: Option<DatabaseOverride>,
    pool: Option<PoolOverride>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatabaseOverride {
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PoolOverride {
    max_connections: Option<u32>,
    connect_timeout_ms: Option<u64>,
    acquire_timeout_ms: Option<u64>,
}

impl GuardianConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::read_lookup(|key| std::env::var(key).ok())?;
        if let Ok(path) = std::env::var("GUARDIAN_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read GUARDIAN_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self::read_lookup(lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn read_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("GUARDIAN_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse()
            .with_context(|| "parse GUARDIAN_BIND")?;
        let metrics_bind = lookup("GUARDIAN_METRICS_BIND")
            .unwrap_or_else(|| DEFAULT_METRICS_BIND.to_string())
            .parse()
            .with_context(|| "parse GUARDIAN_METRICS_BIND")?;
        let storage = match lookup("GUARDIAN_STORAGE") {
            Some(value) => value.parse().with_context(|| "parse GUARDIAN_STORAGE")?,
            None => StorageBackend::Postgres,
        };
        let database = DatabaseConfig {
            host: lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or("DB_PORT", &lookup, DEFAULT_DB_PORT)?,
            database: lookup("DB_DATABASE").unwrap_or_else(|| "guardian".to_string()),
            username: lookup("DB_USERNAME").unwrap_or_else(|| "guardian".to_string()),
            password: lookup("DB_PASSWORD").unwrap_or_default(),
        };
        let pool = PoolConfig {
            max_connections: parse_or(
                "GUARDIAN_DB_MAX_CONNECTIONS",
                &lookup,
                DEFAULT_MAX_CONNECTIONS,
            )?,
            connect_timeout_ms: parse_or(
                "GUARDIAN_DB_CONNECT_TIMEOUT_MS",
                &lookup,
                DEFAULT_CONNECT_TIMEOUT_MS,
            )?,
            acquire_timeout_ms: parse_or(
                "GUARDIAN_DB_ACQUIRE_TIMEOUT_MS",
                &lookup,
                DEFAULT_ACQUIRE_TIMEOUT_MS,
            )?,
        };
        let request_timeout_ms = parse_or(
            "GUARDIAN_REQUEST_TIMEOUT_MS",
            &lookup,
            DEFAULT_REQUEST_TIMEOUT_MS,
        )?;
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            database,
            pool,
            request_timeout_ms,
        })
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: GuardianConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse guardian config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value;
        }
        if let Some(value) = override_cfg.request_timeout_ms {
            self.request_timeout_ms = value;
        }
        if let Some(db) = override_cfg.database {
            if let Some(value) = db.host {
                self.database.host = value;
            }
            if let Some(value) = db.port {
                self.database.port = value;
            }
            if let Some(value) = db.database {
                self.database.database = value;
            }
            if let Some(value) = db.username {
                self.database.username = value;
            }
            if let Some(value) = db.password {
                self.database.password = value;
            }
        }
        if let Some(pool) = override_cfg.pool {
            if let Some(value) = pool.max_connections {
                self.pool.max_connections = value;
            }
            if let Some(value) = pool.connect_timeout_ms {
                self.pool.connect_timeout_ms = value;
            }
            if let Some(value) = pool.acquire_timeout_ms {
                self.pool.acquire_timeout_ms = value;
            }
        }
        self.validate()
    }

    /// Values that parse but would leave the service unable to serve anything.
    fn validate(&self) -> Result<()> {
        if self.pool.max_connections == 0 {
            bail!("pool.max_connections (GUARDIAN_DB_MAX_CONNECTIONS) must be at least 1");
        }
        if self.request_timeout_ms == 0 {
            bail!("request_timeout_ms (GUARDIAN_REQUEST_TIMEOUT_MS) must be at least 1");
        }
        Ok(())
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("parse {key}")),
        None => Ok(default),
    }
}
