use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];
const ALLOWED_ORIGINS_VAR: &str = "ALLOWED_ORIGINS";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub cors: CorsConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub model_file: String,
    pub num_instances: usize,
}

impl ModelConfig {
    pub fn get_path(&self) -> PathBuf {
        service_root().join(&self.model_dir).join(&self.model_file)
    }
}

/// Relative configuration and model paths are anchored at the crate's own
/// directory, so the service behaves the same from any working directory.
fn service_root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

pub fn configuration_directory() -> PathBuf {
    service_root().join("configuration")
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Splits a comma separated origin list. Blank entries are dropped and an
/// empty result falls back to the local development origins.
pub fn parse_allowed_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect();

    if origins.is_empty() {
        default_allowed_origins()
    } else {
        origins
    }
}

fn default_allowed_origins() -> Vec<String> {
    DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let allowed_origins = std::env::var(ALLOWED_ORIGINS_VAR).ok();

    build_configuration(&configuration_directory(), &environment, allowed_origins.as_deref())
}

/// Layers defaults, the yaml files of `configuration_directory`, `APP_*`
/// variables and finally the `ALLOWED_ORIGINS` list.
pub fn build_configuration(
    configuration_directory: &Path,
    environment: &Environment,
    allowed_origins: Option<&str>,
) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("server.max_upload_bytes", 10 * 1024 * 1024)?
        .set_default("model.model_dir", "model")?
        .set_default("model.model_file", "model.onnx")?
        .set_default("model.num_instances", 1)?
        .set_default("cors.allowed_origins", default_allowed_origins())?
        .set_default("log_level", "info")?
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        );

    if let Some(raw) = allowed_origins {
        builder = builder.set_override("cors.allowed_origins", parse_allowed_origins(raw))?;
    }

    let config = builder.build()?.try_deserialize::<Config>()?;

    if config.model.num_instances == 0 {
        return Err(config::ConfigError::Message(
            "model.num_instances must be at least 1".into(),
        ));
    }

    Ok(config)
}
