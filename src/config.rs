use directories::ProjectDirs;
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_BACKEND_URL: &str = "BACKEND_URL";
pub const ENV_DATA_DIR: &str = "FINBOARD_DATA_DIR";
pub const ENV_CREDENTIALS: &str = "FINBOARD_CREDENTIALS";
pub const ENV_ASSISTANT_PATH: &str = "FINBOARD_ASSISTANT_PATH";
pub const ENV_LOG: &str = "FINBOARD_LOG";

const DEFAULT_LOG_FILTER: &str = "info";
const APP: (&str, &str, &str) = ("com", "finboard", "finboard");

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("BACKEND_URL is not set")]
  MissingBackendUrl,
  #[error("BACKEND_URL is not an http(s) url: {0}")]
  InvalidBackendUrl(String),
  #[error("FINBOARD_CREDENTIALS must be one of file, keyring, memory (got {0})")]
  InvalidCredentialBackend(String),
  #[error("FINBOARD_ASSISTANT_PATH must start with '/' (got {0})")]
  InvalidAssistantPath(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialBackend {
  File,
  Keyring,
  Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub backend_url: String,
  pub data_dir: Option<PathBuf>,
  pub credentials: CredentialBackend,
  pub assistant_path: Option<String>,
  pub log_filter: String,
}

impl Config {
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let get = |key: &str| {
      lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
    };

    let raw_url = get(ENV_BACKEND_URL).ok_or(ConfigError::MissingBackendUrl)?;
    let backend_url = normalize_backend_url(&raw_url)?;

    let credentials = match get(ENV_CREDENTIALS).as_deref() {
      None | Some("file") => CredentialBackend::File,
      Some("keyring") => CredentialBackend::Keyring,
      Some("memory") => CredentialBackend::Memory,
      Some(other) => return Err(ConfigError::InvalidCredentialBackend(other.to_string())),
    };

    let assistant_path = match get(ENV_ASSISTANT_PATH) {
      Some(path) if !path.starts_with('/') => return Err(ConfigError::InvalidAssistantPath(path)),
      other => other,
    };

    let data_dir = get(ENV_DATA_DIR)
      .map(PathBuf::from)
      .or_else(default_data_dir);

    Ok(Self {
      backend_url,
      data_dir,
      credentials,
      assistant_path,
      log_filter: get(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
    })
  }
}

fn default_data_dir() -> Option<PathBuf> {
  ProjectDirs::from(APP.0, APP.1, APP.2).map(|p| p.data_dir().to_path_buf())
}

fn normalize_backend_url(raw: &str) -> Result<String, ConfigError> {
  let url = reqwest::Url::parse(raw).map_err(|_| ConfigError::InvalidBackendUrl(raw.to_string()))?;
  if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
    return Err(ConfigError::InvalidBackendUrl(raw.to_string()));
  }
  Ok(raw.trim_end_matches('/').to_string())
}
