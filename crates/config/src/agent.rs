//! Loads agent configuration YAML files into `voice_agent_core::AgentConfig`.

use std::collections::HashMap;
use std::path::Path;

use voice_agent_core::AgentConfig;

use crate::error::{ConfigError, Result};

/// In-memory store of every agent configuration found under a directory,
/// one YAML file per agent (filename stem is not used as the id — the
/// `id` field inside the file is authoritative).
#[derive(Debug, Default)]
pub struct AgentConfigStore {
    configs: HashMap<String, AgentConfig>,
}

impl AgentConfigStore {
    /// Load every `*.yaml`/`*.yml` file directly under `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut configs = HashMap::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) => {
                return Err(ConfigError::AgentFileRead {
                    path: dir.display().to_string(),
                    source,
                })
            }
        };

        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::AgentFileRead {
                path: dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }

            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::AgentFileRead {
                path: path.display().to_string(),
                source,
            })?;
            let mut agent: AgentConfig =
                serde_yaml::from_str(&contents).map_err(|source| ConfigError::AgentParse {
                    path: path.display().to_string(),
                    source,
                })?;
            agent.normalize();

            tracing::info!(agent_id = %agent.id, path = %path.display(), "loaded agent configuration");
            configs.insert(agent.id.clone(), agent);
        }

        Ok(Self { configs })
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentConfig> {
        self.configs.get(agent_id)
    }

    pub fn try_get(&self, agent_id: &str) -> Result<&AgentConfig> {
        self.get(agent_id)
            .ok_or_else(|| ConfigError::UnknownAgent(agent_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_yaml() -> &'static str {
        r#"
id: agent-1
identity:
  display_name: Aria
  role: sales
  persona: friendly and concise
  target_audience: smb owners
  industry: saas
language: hinglish
voice:
  voice_name: aria
  tone: warm
  emotion: 0.6
  pitch: 1.0
  speed: 1.0
  pause_ms: 150
  clarity: standard
speech_policy:
  interruption_sensitivity: medium
  response_length: standard
  question_frequency: 40
  filler_frequency: normal
background_noise: quiet_office
knowledge: []
call_policy:
  max_duration_secs: 600
  end_on_silence_secs: 30
  silence_energy_threshold: 20.0
plan_tier: standard
"#
    }

    #[test]
    fn loads_agent_config_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("agent-1.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();

        let store = AgentConfigStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        let agent = store.try_get("agent-1").unwrap();
        assert_eq!(agent.identity.display_name, "Aria");
    }

    #[test]
    fn unknown_agent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = AgentConfigStore::load_dir(dir.path()).unwrap();
        assert!(store.try_get("missing").is_err());
    }
}
