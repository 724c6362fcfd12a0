//! Configuration management for the server.
//!
//! Process settings come from environment variables. The hierarchical
//! configuration served under `/_config` comes from an optional TOML file of
//! string-valued tables.

use settee_engine::Error;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Registered name of the storage driver
    pub driver: String,
    /// Data source name handed to the driver
    pub dsn: String,
    /// TOML file holding the served configuration and admin users
    pub config_file: Option<PathBuf>,
    /// Force authentication on or off; unset means "on if admins exist"
    pub require_auth: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5984,
            driver: settee_engine::memory::DRIVER_NAME.to_string(),
            dsn: String::new(),
            config_file: None,
            require_auth: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = env::var("HOST").unwrap_or(defaults.host);

        let port = match env::var("PORT") {
            Ok(port) => port.parse().map_err(|_| ConfigError::InvalidPort(port))?,
            Err(_) => defaults.port,
        };

        let driver = env::var("DRIVER").unwrap_or(defaults.driver);
        let dsn = env::var("DSN").unwrap_or(defaults.dsn);
        let config_file = env::var("CONFIG_FILE").ok().map(PathBuf::from);

        let require_auth = match env::var("REQUIRE_AUTH") {
            Ok(value) => Some(parse_bool(&value).ok_or(ConfigError::InvalidRequireAuth(value))?),
            Err(_) => None,
        };

        Ok(Self {
            host,
            port,
            driver,
            dsn,
            config_file,
            require_auth,
        })
    }

    /// Socket address to bind.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value: {0}")]
    InvalidPort(String),

    #[error("Invalid REQUIRE_AUTH value: {0}")]
    InvalidRequireAuth(String),

    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config entry {0} must be a table of scalar values")]
    InvalidEntry(String),
}

/// Section name whose entries seed the admin users.
pub const ADMINS_SECTION: &str = "admins";

/// A section of the served configuration.
pub type Section = BTreeMap<String, String>;

/// Read-only `section -> key -> value` configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    sections: BTreeMap<String, Section>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and defaults.
    pub fn with(
        mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Parse TOML text. Every top-level entry must be a table; numbers,
    /// booleans and dates inside are kept in their TOML spelling.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = text.parse()?;

        let mut sections = BTreeMap::new();
        for (name, value) in table {
            let toml::Value::Table(entries) = value else {
                return Err(ConfigError::InvalidEntry(name));
            };

            let mut section = Section::new();
            for (key, value) in entries {
                let value = match value {
                    toml::Value::String(s) => s,
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    toml::Value::Datetime(d) => d.to_string(),
                    toml::Value::Array(_) | toml::Value::Table(_) => {
                        return Err(ConfigError::InvalidEntry(format!("{name}.{key}")));
                    }
                };
                section.insert(key, value);
            }
            sections.insert(name, section);
        }

        Ok(Self { sections })
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Remove a section and return its entries.
    pub fn take_section(&mut self, name: &str) -> Option<Section> {
        self.sections.remove(name)
    }

    /// Every section.
    pub fn all(&self) -> &BTreeMap<String, Section> {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Result<&Section, Error> {
        self.sections
            .get(name)
            .ok_or_else(|| Error::NotFound("unknown_config_value".into()))
    }

    pub fn get(&self, section: &str, key: &str) -> Result<&str, Error> {
        self.section(section)?
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::NotFound("unknown_config_value".into()))
    }
}
