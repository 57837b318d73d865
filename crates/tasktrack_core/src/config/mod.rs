//! Runtime configuration for embedding the tracker core.
//!
//! # Responsibility
//! - Collect storage, logging and bootstrap settings in one value.
//! - Read overrides from `TASKTRACK_*` environment variables.
//!
//! # Invariants
//! - A validated config has a supported log level, an absolute log directory
//!   (when set) and a non-blank default user name.

use crate::logging::{default_log_level, normalize_level};
use crate::repo::AddPolicy;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "TASKTRACK_DB";
pub const ENV_LOG_LEVEL: &str = "TASKTRACK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "TASKTRACK_LOG_DIR";
pub const ENV_USER: &str = "TASKTRACK_USER";
pub const ENV_ADD_POLICY: &str = "TASKTRACK_ADD_POLICY";

/// Name of the user created on first start when none exists.
pub const DEFAULT_USER_NAME: &str = "Otis Ngo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidLogLevel(String),
    RelativeLogDir(PathBuf),
    EmptyUserName,
    InvalidAddPolicy(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
            Self::RelativeLogDir(path) => {
                write!(f, "log directory must be absolute, got `{}`", path.display())
            }
            Self::EmptyUserName => write!(f, "default user name cannot be empty"),
            Self::InvalidAddPolicy(value) => {
                write!(f, "unsupported add policy `{value}`; expected keep|replace")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// SQLite file; `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Log directory; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    pub default_user_name: String,
    pub add_policy: AddPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            default_user_name: DEFAULT_USER_NAME.to_string(),
            add_policy: AddPolicy::default(),
        }
    }
}

impl TrackerConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = non_blank(ENV_DB_PATH) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(level) = non_blank(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = non_blank(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(name) = lookup(ENV_USER) {
            config.default_user_name = name;
        }
        if let Some(policy) = non_blank(ENV_ADD_POLICY) {
            config.add_policy = parse_add_policy(&policy)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::InvalidLogLevel)?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(dir.clone()));
            }
        }
        if self.default_user_name.trim().is_empty() {
            return Err(ConfigError::EmptyUserName);
        }
        Ok(())
    }
}

fn parse_add_policy(value: &str) -> Result<AddPolicy, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "keep" | "keep_existing" => Ok(AddPolicy::KeepExisting),
        "replace" => Ok(AddPolicy::Replace),
        _ => Err(ConfigError::InvalidAddPolicy(value.to_string())),
    }
}
