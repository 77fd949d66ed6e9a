use std::{env, fmt, str::FromStr, time::Duration};

const PREFIX: &str = "BTCOUNT_";

const DB_ADDR: &str = "DB_ADDR";
const LOG_LEVEL: &str = "LOG_LEVEL";
const LOG_FORMAT: &str = "LOG_FORMAT";
const STAT_WORKER_RETRY_DELAY: &str = "STAT_WORKER_RETRY_DELAY";
const DB_MIN_CONN: &str = "DB_MIN_CONN";
const DB_MAX_CONN: &str = "DB_MAX_CONN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(format!("{:?} (allowed are: \"json\", \"text\")", other)),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(String),
    Invalid { key: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "param not found: {}", key),
            ConfigError::Invalid { key, reason } => {
                write!(f, "invalid parameter {}: {}", key, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_addr: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub stat_worker_retry_delay: Duration,
    pub db_min_conn: u32,
    pub db_max_conn: u32,
}

impl Config {
    /// Reads `BTCOUNT_*` variables, loading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Keys carry the
    /// `BTCOUNT_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", PREFIX, name));

        let db_addr = get(DB_ADDR).ok_or_else(|| ConfigError::Missing(key(DB_ADDR)))?;

        let log_level = get(LOG_LEVEL).unwrap_or_else(|| "info".to_string());
        let log_format = parse_or(get(LOG_FORMAT), LOG_FORMAT, LogFormat::Json)?;
        let retry_secs: u64 = parse_or(get(STAT_WORKER_RETRY_DELAY), STAT_WORKER_RETRY_DELAY, 5)?;
        let db_min_conn = parse_or(get(DB_MIN_CONN), DB_MIN_CONN, 1)?;
        let db_max_conn = parse_or(get(DB_MAX_CONN), DB_MAX_CONN, 5)?;

        if db_min_conn > db_max_conn {
            return Err(ConfigError::Invalid {
                key: key(DB_MIN_CONN),
                reason: format!("{} exceeds max connections {}", db_min_conn, db_max_conn),
            });
        }

        Ok(Self {
            db_addr,
            log_level,
            log_format,
            stat_worker_retry_delay: Duration::from_secs(retry_secs),
            db_min_conn,
            db_max_conn,
        })
    }
}

fn key(name: &str) -> String {
    format!("{}{}", PREFIX, name)
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            key: key(name),
            reason: err.to_string(),
        }),
    }
}
