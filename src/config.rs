use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SERVICE_WORKER_PATH: &str = "/sw.js";
pub const DEFAULT_ICON_URL: &str = "/icons/icon-192.png";
pub const DEFAULT_BADGE_URL: &str = "/icons/badge-72.png";
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TTL_SECS: u32 = 24 * 60 * 60;
pub const DEFAULT_LOG_RETENTION: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("service worker path must start with '/': {0}")]
    ServiceWorkerPath(String),
    #[error("send timeout must be greater than 0")]
    SendTimeout,
    #[error("log retention must be greater than 0")]
    LogRetention,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VapidSettings {
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub vapid: VapidSettings,
    pub service_worker_path: String,
    pub admin_recipients: Vec<String>,
    pub icon_url: String,
    pub badge_url: String,
    pub send_timeout: Duration,
    pub ttl_secs: u32,
    pub log_retention: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vapid: VapidSettings::default(),
            service_worker_path: DEFAULT_SERVICE_WORKER_PATH.to_string(),
            admin_recipients: Vec::new(),
            icon_url: DEFAULT_ICON_URL.to_string(),
            badge_url: DEFAULT_BADGE_URL.to_string(),
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            ttl_secs: DEFAULT_TTL_SECS,
            log_retention: DEFAULT_LOG_RETENTION,
        }
    }
}

/// On-disk TOML shape. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub service_worker_path: Option<String>,
    pub admin_recipients: Vec<String>,
    pub icon_url: Option<String>,
    pub badge_url: Option<String>,
    pub send_timeout_secs: Option<u64>,
    pub ttl_secs: Option<u32>,
    pub log_retention: Option<usize>,
    pub vapid: VapidSettings,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

impl AppConfig {
    pub fn from_file(file: FileConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let service_worker_path = file
            .service_worker_path
            .unwrap_or(defaults.service_worker_path);
        if !service_worker_path.starts_with('/') {
            return Err(ConfigError::ServiceWorkerPath(service_worker_path));
        }
        let send_timeout = match file.send_timeout_secs {
            Some(0) => return Err(ConfigError::SendTimeout),
            Some(secs) => Duration::from_secs(secs),
            None => defaults.send_timeout,
        };
        let log_retention = match file.log_retention {
            Some(0) => return Err(ConfigError::LogRetention),
            Some(rows) => rows,
            None => defaults.log_retention,
        };

        Ok(Self {
            vapid: file.vapid,
            service_worker_path,
            admin_recipients: file.admin_recipients,
            icon_url: file.icon_url.unwrap_or(defaults.icon_url),
            badge_url: file.badge_url.unwrap_or(defaults.badge_url),
            send_timeout,
            ttl_secs: file.ttl_secs.unwrap_or(defaults.ttl_secs),
            log_retention,
        })
    }
}
