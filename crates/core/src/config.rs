use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Process configuration, loaded in layers: defaults, then an optional
/// `helpdevil.toml`, then `HELPDEVIL_*` environment variables, then
/// programmatic overrides. Validation runs last and is fatal at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub verification_token: SecretString,
}

/// Backend selection mirrors the deployment convention: a database URL
/// selects SQLite, otherwise team records land as JSON files in a directory.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub database_url: Option<String>,
    pub json_file_dir: PathBuf,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub verification_token: Option<String>,
    pub database_url: Option<String>,
    pub json_file_dir: Option<PathBuf>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                client_id: String::new(),
                client_secret: String::new().into(),
                verification_token: String::new().into(),
            },
            store: StoreConfig {
                database_url: None,
                json_file_dir: PathBuf::from("./db_helpdevil"),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 3000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("helpdevil.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(slack) = patch.slack {
            if let Some(client_id) = slack.client_id {
                self.slack.client_id = client_id;
            }
            if let Some(client_secret_value) = slack.client_secret {
                self.slack.client_secret = client_secret_value.into();
            }
            if let Some(verification_token_value) = slack.verification_token {
                self.slack.verification_token = verification_token_value.into();
            }
        }

        if let Some(store) = patch.store {
            if let Some(database_url) = store.database_url {
                self.store.database_url = Some(database_url);
            }
            if let Some(json_file_dir) = store.json_file_dir {
                self.store.json_file_dir = json_file_dir;
            }
            if let Some(max_connections) = store.max_connections {
                self.store.max_connections = max_connections;
            }
            if let Some(timeout_secs) = store.timeout_secs {
                self.store.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HELPDEVIL_CLIENT_ID") {
            self.slack.client_id = value;
        }
        if let Some(value) = read_env("HELPDEVIL_CLIENT_SECRET") {
            self.slack.client_secret = value.into();
        }
        if let Some(value) = read_env("HELPDEVIL_VERIFICATION_TOKEN") {
            self.slack.verification_token = value.into();
        }

        if let Some(value) = read_env("HELPDEVIL_DATABASE_URL") {
            self.store.database_url = Some(value);
        }
        if let Some(value) = read_env("HELPDEVIL_JSON_FILE_DIR") {
            self.store.json_file_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("HELPDEVIL_STORE_MAX_CONNECTIONS") {
            self.store.max_connections = parse_u32("HELPDEVIL_STORE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("HELPDEVIL_STORE_TIMEOUT_SECS") {
            self.store.timeout_secs = parse_u64("HELPDEVIL_STORE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HELPDEVIL_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HELPDEVIL_PORT") {
            self.server.port = parse_u16("HELPDEVIL_PORT", &value)?;
        }

        if let Some(value) = read_env("HELPDEVIL_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("HELPDEVIL_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(client_id) = overrides.client_id {
            self.slack.client_id = client_id;
        }
        if let Some(client_secret) = overrides.client_secret {
            self.slack.client_secret = client_secret.into();
        }
        if let Some(verification_token) = overrides.verification_token {
            self.slack.verification_token = verification_token.into();
        }
        if let Some(database_url) = overrides.database_url {
            self.store.database_url = Some(database_url);
        }
        if let Some(json_file_dir) = overrides.json_file_dir {
            self.store.json_file_dir = json_file_dir;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_store(&self.store)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("helpdevil.toml"), PathBuf::from("config/helpdevil.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str::<ConfigPatch>(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.client_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.client_id is required (set HELPDEVIL_CLIENT_ID)".to_string(),
        ));
    }
    if slack.client_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.client_secret is required (set HELPDEVIL_CLIENT_SECRET)".to_string(),
        ));
    }
    if slack.verification_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.verification_token is required (set HELPDEVIL_VERIFICATION_TOKEN)".to_string(),
        ));
    }
    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if let Some(url) = &store.database_url {
        let url = url.trim();
        let sqlite_url =
            url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
        if !sqlite_url {
            return Err(ConfigError::Validation(
                "store.database_url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                    .to_string(),
            ));
        }
    }

    if store.max_connections == 0 {
        return Err(ConfigError::Validation(
            "store.max_connections must be greater than zero".to_string(),
        ));
    }

    if store.timeout_secs == 0 || store.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "store.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    store: Option<StorePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    verification_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    database_url: Option<String>,
    json_file_dir: Option<PathBuf>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
