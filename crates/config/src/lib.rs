//! Layered settings, per-agent configuration loading, and the operational
//! constants shared across the workspace.

pub mod agent;
pub mod constants;
pub mod error;
pub mod settings;

pub use agent::AgentConfigStore;
pub use error::{ConfigError, Result};
pub use settings::{
    load_settings, ModelSettings, ObservabilitySettings, PersistenceSettings, RuntimeEnvironment,
    ServerSettings, Settings,
};
