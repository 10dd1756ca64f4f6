use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read agent config file {path}: {source}")]
    AgentFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse agent config {path}: {source}")]
    AgentParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown agent id: {0}")]
    UnknownAgent(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
