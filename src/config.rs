use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "NaijaCare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 20;
pub const DATABASE_FILE: &str = "naijacare.db";

/// Environment variable prefix for every setting.
const ENV_PREFIX: &str = "NAIJACARE_";

/// Default log filter: info for this crate, warn for dependencies.
/// Overridden by `RUST_LOG`.
pub fn default_log_filter() -> &'static str {
    "naijacare=info,tower_http=info,warn"
}

/// Per-user data directory, e.g. `~/.local/share/NaijaCare` on Linux.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(APP_NAME))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Cannot determine a data directory; set NAIJACARE_DB_PATH")]
    NoDataDir,
}

/// Where profile images are uploaded. Absent means images stay in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHostConfig {
    pub endpoint: String,
    pub upload_preset: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub request_timeout: Duration,
    pub session_ttl: Duration,
    pub image_host: Option<ImageHostConfig>,
}

impl AppConfig {
    /// Read `NAIJACARE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    ///
    /// | key | default |
    /// |-----|---------|
    /// | `NAIJACARE_BIND` | `127.0.0.1:8080` |
    /// | `NAIJACARE_DB_PATH` | `<data dir>/NaijaCare/naijacare.db` |
    /// | `NAIJACARE_REQUEST_TIMEOUT_SECS` | 30 |
    /// | `NAIJACARE_SESSION_TTL_SECS` | 43200 |
    /// | `NAIJACARE_IMAGE_ENDPOINT` or `NAIJACARE_IMAGE_CLOUD` | none |
    /// | `NAIJACARE_IMAGE_PRESET` | required with an endpoint |
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = match get("BIND") {
            Some(value) => parse_value("BIND", &value)?,
            None => parse_value("BIND", DEFAULT_BIND_ADDR)?,
        };

        let db_path = match get("DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => app_data_dir().ok_or(ConfigError::NoDataDir)?.join(DATABASE_FILE),
        };

        let request_timeout = Duration::from_secs(match get("REQUEST_TIMEOUT_SECS") {
            Some(value) => parse_value("REQUEST_TIMEOUT_SECS", &value)?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        });

        let session_ttl = Duration::from_secs(match get("SESSION_TTL_SECS") {
            Some(value) => parse_value("SESSION_TTL_SECS", &value)?,
            None => DEFAULT_SESSION_TTL_SECS,
        });

        let endpoint = get("IMAGE_ENDPOINT").or_else(|| {
            get("IMAGE_CLOUD").map(|cloud| crate::media::HttpImageHost::cloud_endpoint(&cloud))
        });
        let image_host = match endpoint {
            Some(endpoint) => {
                let upload_preset = get("IMAGE_PRESET").ok_or_else(|| ConfigError::InvalidValue {
                    key: format!("{ENV_PREFIX}IMAGE_PRESET"),
                    value: "<unset>".into(),
                })?;
                Some(ImageHostConfig {
                    endpoint,
                    upload_preset,
                    timeout: Duration::from_secs(DEFAULT_IMAGE_TIMEOUT_SECS),
                })
            }
            None => None,
        };

        Ok(Self {
            bind_addr,
            db_path,
            request_timeout,
            session_ttl,
            image_host,
        })
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{name}"),
        value: value.to_string(),
    })
}
