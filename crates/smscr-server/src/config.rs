//! Server configuration loaded from a JSON file.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything the server needs before it starts accepting connections.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub address: String,
    pub domain_name: String,
    pub port: u16,
    pub worker_threads: usize,
    pub document_root: PathBuf,
    pub session_timeout_secs: u64,
    pub session_sweep_interval_secs: u64,
    pub read_timeout_secs: u64,
    /// File extension (without the dot) to mime type.
    pub mime_types: HashMap<String, String>,
    /// Request path to worker name.
    pub workers: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            domain_name: "localhost".into(),
            port: 5721,
            worker_threads: 10,
            document_root: PathBuf::from("webroot"),
            session_timeout_secs: 600,
            session_sweep_interval_secs: 300,
            read_timeout_secs: 30,
            mime_types: default_mime_types(),
            workers: HashMap::new(),
        }
    }
}

fn default_mime_types() -> HashMap<String, String> {
    [
        ("html", "text/html"),
        ("htm", "text/html"),
        ("txt", "text/plain"),
        ("css", "text/css"),
        ("js", "text/javascript"),
        ("json", "application/json"),
        ("gif", "image/gif"),
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("svg", "image/svg+xml"),
        ("ico", "image/x-icon"),
    ]
    .into_iter()
    .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
    .collect()
}

impl ServerConfig {
    /// Read and validate a config file. A relative document root is taken
    /// relative to the directory containing the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if config.document_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.document_root = base.join(&config.document_root);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid("worker_threads must be greater than zero".into()));
        }
        if !self.document_root.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "document root {} is not a directory",
                self.document_root.display()
            )));
        }
        Ok(())
    }

    /// `address:port`, as passed to the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn mime_type(&self, extension: &str) -> &str {
        self.mime_types
            .get(&extension.to_ascii_lowercase())
            .map_or("application/octet-stream", String::as_str)
    }
}
