use crate::core::db::{ConnectionParams, Target, DEFAULT_PAGE_SIZE, DEFAULT_PORT};
use crate::core::{Result, TabloadError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable consulted when the config file has no password
pub const PASSWORD_ENV: &str = "TABLOAD_PASSWORD";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub target: TargetConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Database driver selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Postgres,
    Sqlite,
}

impl Default for Driver {
    fn default() -> Self {
        Driver::Postgres
    }
}

/// Database connection configuration.
#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: Driver,
    pub name: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    /// SQLite database file
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Builds the connection target, reading the password from
    /// `TABLOAD_PASSWORD` when the file does not set one.
    pub fn target(&self) -> Result<Target> {
        self.target_with_env_password(std::env::var(PASSWORD_ENV).ok())
    }

    fn target_with_env_password(&self, env_password: Option<String>) -> Result<Target> {
        match self.driver {
            Driver::Postgres => {
                let name = self.name.clone().ok_or_else(|| {
                    TabloadError::Config("[database] name is required for postgres".to_string())
                })?;
                let password = self.password.clone().or(env_password).unwrap_or_default();
                let params = ConnectionParams::new(
                    name,
                    self.host.clone().unwrap_or_else(|| "localhost".to_string()),
                    self.user.clone().unwrap_or_else(|| "postgres".to_string()),
                    password,
                )
                .with_port(self.port.unwrap_or(DEFAULT_PORT));
                Ok(Target::Postgres(params))
            }
            Driver::Sqlite => self
                .path
                .clone()
                .map(Target::Sqlite)
                .ok_or_else(|| TabloadError::Config("[database] path is required for sqlite".to_string())),
        }
    }
}

/// Where the rows come from.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Csv {
        path: PathBuf,
        #[serde(default)]
        columns: Vec<String>,
        delimiter: Option<char>,
    },
    Api {
        url: String,
        #[serde(default = "empty_payload")]
        payload: serde_json::Value,
    },
}

fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl SourceConfig {
    /// Short description used in logs and load history
    pub fn describe(&self) -> String {
        match self {
            SourceConfig::Csv { path, .. } => format!("csv:{}", path.display()),
            SourceConfig::Api { url, .. } => format!("api:{}", url),
        }
    }

    /// CSV delimiter as a byte; only ASCII delimiters are accepted
    pub fn delimiter(&self) -> Result<u8> {
        match self {
            SourceConfig::Csv {
                delimiter: Some(c), ..
            } => u8::try_from(*c)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| TabloadError::Config(format!("delimiter '{}' is not ASCII", c))),
            _ => Ok(b','),
        }
    }
}

/// Destination table configuration.
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    pub table: String,
    /// SQL type declarations, paired with the dataset's columns by position
    #[serde(default)]
    pub types: Vec<String>,
    pub page_size: Option<usize>,
}

impl TargetConfig {
    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// Load history configuration.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

impl HistoryConfig {
    /// Configured path, or `<data dir>/tabload/history.db`
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("tabload").join("history.db")))
    }
}

/// Default config location: `<config dir>/tabload/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tabload").join("config.toml"))
}

/// Parses configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(|e| TabloadError::Config(e.to_string()))?;
    if config.target.page_size == Some(0) {
        return Err(TabloadError::Config("[target] page_size must be at least 1".to_string()));
    }
    config.source.delimiter()?;
    Ok(config)
}

/// Loads configuration from a TOML file at the given path.
///
/// Relative file paths inside the config (CSV source, SQLite database,
/// history) are resolved against the config file's directory.
///
/// # Example
///
/// ```no_run
/// let config = tabload::config::load_config("demos/staging.toml").expect("Failed to load config");
/// println!("{:?}", config.target);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| TabloadError::Config(format!("{}: {}", path.display(), e)))?;
    let mut config = parse_config(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    if let SourceConfig::Csv { path, .. } = &mut config.source {
        *path = resolve(base, path);
    }
    if let Some(db_path) = &mut config.database.path {
        *db_path = resolve(base, db_path);
    }
    if let Some(history_path) = &mut config.history.path {
        *history_path = resolve(base, history_path);
    }
    Ok(config)
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
