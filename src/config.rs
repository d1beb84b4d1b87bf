//! Runtime configuration: scheduling rules and server settings.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_HTTP_ADDR: &str = "SCHOOL_TIMETABLE_HTTP_ADDR";
pub const ENV_DATABASE: &str = "SCHOOL_TIMETABLE_DB";
pub const ENV_RULES: &str = "SCHOOL_TIMETABLE_RULES";
pub const ENV_DIRECTORY: &str = "SCHOOL_TIMETABLE_DIRECTORY";
pub const ENV_CALENDAR: &str = "SCHOOL_TIMETABLE_CALENDAR";

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {message}")]
    InvalidEnv { var: &'static str, message: String },

    #[error("invalid school calendar: {0}")]
    InvalidCalendar(String),
}

/// Limits applied when validating booking and activity time slots.
///
/// Only `min_session_minutes` and the text length limits are enforced; the
/// maximum duration and the school-day window produce warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingRules {
    pub min_session_minutes: i64,
    pub max_session_minutes: i64,
    pub school_day_start: NaiveTime,
    pub school_day_end: NaiveTime,
    /// Divisor for the timetable's average sessions per day.
    pub school_days_per_week: u32,
    pub max_notes_len: usize,
    pub max_topic_len: usize,
    pub max_description_len: usize,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self {
            min_session_minutes: 30,
            max_session_minutes: 180,
            school_day_start: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            school_day_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            school_days_per_week: 5,
            max_notes_len: 500,
            max_topic_len: 200,
            max_description_len: 1000,
        }
    }
}

impl SchedulingRules {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        read_json(path.as_ref())
    }
}

/// Settings for the HTTP binary, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// SQLite database file; the in-memory store is used when unset.
    pub database_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
    pub directory_path: Option<PathBuf>,
    pub calendar_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr_raw = lookup(ENV_HTTP_ADDR).unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let addr = addr_raw
            .trim()
            .parse::<SocketAddr>()
            .map_err(|err| ConfigError::InvalidEnv {
                var: ENV_HTTP_ADDR,
                message: format!("'{addr_raw}': {err}"),
            })?;

        let path_of = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };

        Ok(Self {
            addr,
            database_path: path_of(ENV_DATABASE),
            rules_path: path_of(ENV_RULES),
            directory_path: path_of(ENV_DIRECTORY),
            calendar_path: path_of(ENV_CALENDAR),
        })
    }

    pub fn load_rules(&self) -> Result<SchedulingRules, ConfigError> {
        match &self.rules_path {
            Some(path) => SchedulingRules::from_json_file(path),
            None => Ok(SchedulingRules::default()),
        }
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(file).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_school_day() {
        let rules = SchedulingRules::default();
        assert_eq!(rules.min_session_minutes, 30);
        assert_eq!(rules.max_session_minutes, 180);
        assert_eq!(rules.school_day_start, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        assert_eq!(rules.school_day_end, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(rules.school_days_per_week, 5);
    }

    #[test]
    fn partial_rules_json_keeps_defaults() {
        let rules: SchedulingRules =
            serde_json::from_str(r#"{ "min_session_minutes": 45 }"#).unwrap();
        assert_eq!(rules.min_session_minutes, 45);
        assert_eq!(rules.max_session_minutes, 180);
    }

    #[test]
    fn server_config_reads_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_HTTP_ADDR, "127.0.0.1:8080"),
            (ENV_DATABASE, "/tmp/school.db"),
            (ENV_RULES, "  "),
        ]);
        let config = ServerConfig::from_lookup(|var| vars.get(var).map(|v| v.to_string())).unwrap();
        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/school.db")));
        assert!(config.rules_path.is_none());
        assert!(config.directory_path.is_none());
    }

    #[test]
    fn server_config_rejects_bad_address() {
        let err = ServerConfig::from_lookup(|var| {
            (var == ENV_HTTP_ADDR).then(|| "not-an-address".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: ENV_HTTP_ADDR, .. }));
    }
}
