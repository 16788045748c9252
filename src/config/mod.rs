use serde::Deserialize;
use std::path::PathBuf;

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetServiceConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub push: PushConfig,
}

/// Widget persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database holding widget configs and last-good text
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("entity_widget.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Remote states API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Long-lived access token (prefer ENTITY_WIDGET_TOKEN)
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: String::new(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Push channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Buffered snapshots before slow listeners start lagging
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    100
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl WidgetServiceConfig {
    /// Apply ENTITY_WIDGET_* environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("ENTITY_WIDGET_DB") {
            self.store.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("ENTITY_WIDGET_BASE_URL") {
            self.client.base_url = v;
        }
        if let Ok(v) = std::env::var("ENTITY_WIDGET_TOKEN") {
            self.client.access_token = v;
        }
        if let Ok(v) = std::env::var("ENTITY_WIDGET_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.client.request_timeout_seconds = n;
            }
        }
        self
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<WidgetServiceConfig, Box<dyn std::error::Error + Send + Sync>> {
    let contents = std::fs::read_to_string(path)?;
    let config: WidgetServiceConfig = toml::from_str(&contents)?;
    Ok(config)
}
