//! Layered settings: `config/default.toml` overlaid by `config/{env}.toml`,
//! overlaid by `VOICE_AGENT_`-prefixed environment variables. Mirrors the
//! `config::{Config, Environment, File}` layering the teacher crate used for
//! its own `Settings`.

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(self) -> bool {
        matches!(self, RuntimeEnvironment::Production)
    }

    pub fn is_strict(self) -> bool {
        matches!(self, RuntimeEnvironment::Staging | RuntimeEnvironment::Production)
    }

    fn from_env() -> Self {
        match std::env::var("VOICE_AGENT_ENV").as_deref() {
            Ok("production") => RuntimeEnvironment::Production,
            Ok("staging") => RuntimeEnvironment::Staging,
            _ => RuntimeEnvironment::Development,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// WebSocket endpoint for the bidirectional model session.
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Env var name holding the API key, never the key itself.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_model_endpoint() -> String {
    std::env::var("VOICE_AGENT_MODEL_ENDPOINT")
        .unwrap_or_else(|_| "wss://generativelanguage.googleapis.com/ws".to_string())
}

fn default_model_id() -> String {
    "gemini-2.0-flash-live".to_string()
}

fn default_api_key_env() -> String {
    "VOICE_AGENT_MODEL_API_KEY".to_string()
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            model_id: default_model_id(),
            api_key_env: default_api_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceSettings {
    #[serde(default = "default_scylla_hosts")]
    pub scylla_hosts: Vec<String>,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
}

fn default_scylla_hosts() -> Vec<String> {
    std::env::var("SCYLLA_HOSTS")
        .map(|s| s.split(',').map(str::to_string).collect())
        .unwrap_or_else(|_| vec!["127.0.0.1:9042".to_string()])
}

fn default_keyspace() -> String {
    std::env::var("SCYLLA_KEYSPACE").unwrap_or_else(|_| "voice_agent".to_string())
}

fn default_replication_factor() -> u32 {
    1
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            scylla_hosts: default_scylla_hosts(),
            keyspace: default_keyspace(),
            replication_factor: default_replication_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            json_logs: false,
            log_filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub persistence: PersistenceSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
    /// Directory containing one YAML file per agent, consumed by
    /// `voice_agent_config::agent::AgentConfigLoader`.
    #[serde(default = "default_agents_dir")]
    pub agents_dir: String,
    /// Directory containing the filler manifest + PCM assets.
    #[serde(default = "default_fillers_dir")]
    pub fillers_dir: String,
}

fn default_agents_dir() -> String {
    "config/agents".to_string()
}

fn default_fillers_dir() -> String {
    "config/fillers".to_string()
}

/// Load layered settings: `config/default.toml`, an optional
/// `config/{env}.toml` overlay, then `VOICE_AGENT_`-prefixed env vars.
pub fn load_settings() -> Result<Settings> {
    let env = RuntimeEnvironment::from_env();
    let env_file = match env {
        RuntimeEnvironment::Development => "config/development",
        RuntimeEnvironment::Staging => "config/staging",
        RuntimeEnvironment::Production => "config/production",
    };

    let builder = config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name(env_file).required(false))
        .add_source(config::Environment::with_prefix("VOICE_AGENT").separator("__"));

    let mut settings: Settings = builder.build()?.try_deserialize()?;
    settings.environment = env;
    Ok(settings)
}
