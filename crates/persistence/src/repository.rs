//! Typed repositories over ScyllaDB for calls, call log events, turns,
//! agents, campaigns, and cached-prompt handles (spec §3). Each trait also
//! has an in-memory implementation so the server can degrade to best-effort
//! logging when ScyllaDB is unavailable, per the ambient persistence
//! fallback.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use scylla::{IntoTypedRows, Session};

use voice_agent_core::{AgentConfig, Call, CallLogEvent, Campaign, CachedPrompt, Turn};

use crate::error::{PersistenceError, Result};

#[async_trait]
pub trait CallRepository: Send + Sync {
    async fn upsert(&self, call: &Call) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Call>>;
}

#[async_trait]
pub trait CallLogRepository: Send + Sync {
    async fn append(&self, event: &CallLogEvent) -> Result<()>;
    async fn list_for_call(&self, call_id: &str) -> Result<Vec<CallLogEvent>>;
}

#[async_trait]
pub trait CachedPromptRepository: Send + Sync {
    async fn upsert(&self, prompt: &CachedPrompt) -> Result<()>;
    async fn get(&self, agent_id: &str) -> Result<Option<CachedPrompt>>;
}

/// Committed turn-log entries (spec §4.5, §8): append-only per call.
#[async_trait]
pub trait TurnRepository: Send + Sync {
    async fn append(&self, call_id: &str, turn: &Turn) -> Result<()>;
    async fn list_for_call(&self, call_id: &str) -> Result<Vec<Turn>>;
}

/// Agent configs, keyed by id. Config is stored as an opaque JSON blob since
/// `AgentConfig` is deeply nested; the on-disk manifest loaded by
/// `AgentConfigStore` remains the source of truth at boot, this repository
/// backs the management API for configs created or edited at runtime.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn upsert(&self, agent: &AgentConfig) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<AgentConfig>>;
    async fn list(&self) -> Result<Vec<AgentConfig>>;
}

#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn upsert(&self, campaign: &Campaign) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Campaign>>;
    async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<Campaign>>;
}

fn enum_to_text<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default()
}

fn text_to_enum<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(text.to_string())).ok()
}

pub struct ScyllaCallRepository {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaCallRepository {
    pub fn new(session: Arc<Session>, keyspace: impl Into<String>) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
        }
    }
}

#[async_trait]
impl CallRepository for ScyllaCallRepository {
    async fn upsert(&self, call: &Call) -> Result<()> {
        let statement = format!(
            "INSERT INTO {}.calls (id, agent_id, lead_id, direction, start_at, answered_at, ended_at, \
             status, duration_secs, carrier_type, recording_url, outcome, final_sentiment, campaign_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.keyspace
        );
        self.session
            .query_unpaged(
                statement,
                (
                    &call.id,
                    &call.agent_id,
                    &call.lead_id,
                    enum_to_text(&call.direction),
                    call.start_at.timestamp_millis(),
                    call.answered_at.map(|t| t.timestamp_millis()),
                    call.ended_at.map(|t| t.timestamp_millis()),
                    enum_to_text(&call.status),
                    call.duration_secs,
                    enum_to_text(&call.carrier_type),
                    &call.recording_url,
                    call.outcome.map(|o| enum_to_text(&o)),
                    call.final_sentiment,
                    &call.campaign_id,
                ),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Call>> {
        let statement = format!(
            "SELECT id, agent_id, lead_id, direction, start_at, answered_at, ended_at, status, \
             duration_secs, carrier_type, recording_url, outcome, final_sentiment, campaign_id \
             FROM {}.calls WHERE id = ?",
            self.keyspace
        );
        let result = self.session.query_unpaged(statement, (id,)).await?;
        let rows = result.rows.unwrap_or_default();
        for row in rows {
            let (
                id,
                agent_id,
                lead_id,
                direction,
                start_at,
                answered_at,
                ended_at,
                status,
                duration_secs,
                carrier_type,
                recording_url,
                outcome,
                final_sentiment,
                campaign_id,
            ): (
                String,
                String,
                String,
                String,
                i64,
                Option<i64>,
                Option<i64>,
                String,
                Option<i32>,
                String,
                Option<String>,
                Option<String>,
                Option<f32>,
                Option<String>,
            ) = row
                .into_typed()
                .map_err(|e| PersistenceError::RowParse(e.to_string()))?;

            let call = Call {
                id,
                agent_id,
                lead_id,
                direction: text_to_enum(&direction).ok_or_else(|| PersistenceError::RowParse("direction".into()))?,
                start_at: millis_to_datetime(start_at),
                answered_at: answered_at.map(millis_to_datetime),
                ended_at: ended_at.map(millis_to_datetime),
                status: text_to_enum(&status).ok_or_else(|| PersistenceError::RowParse("status".into()))?,
                duration_secs: duration_secs.map(|v| v as u32),
                carrier_type: text_to_enum(&carrier_type)
                    .ok_or_else(|| PersistenceError::RowParse("carrier_type".into()))?,
                recording_url,
                outcome: outcome.and_then(|o| text_to_enum(&o)),
                final_sentiment,
                campaign_id,
            };
            return Ok(Some(call));
        }
        Ok(None)
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

pub struct ScyllaCallLogRepository {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaCallLogRepository {
    pub fn new(session: Arc<Session>, keyspace: impl Into<String>) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
        }
    }
}

#[async_trait]
impl CallLogRepository for ScyllaCallLogRepository {
    async fn append(&self, event: &CallLogEvent) -> Result<()> {
        let statement = format!(
            "INSERT INTO {}.call_logs (call_id, timestamp, event, campaign_id, details, provider_payload) \
             VALUES (?, ?, ?, ?, ?, ?)",
            self.keyspace
        );
        let payload = event
            .provider_payload
            .as_ref()
            .map(|v| v.to_string());
        self.session
            .query_unpaged(
                statement,
                (
                    &event.call_id,
                    event.timestamp.timestamp_millis(),
                    enum_to_text(&event.event),
                    &event.campaign_id,
                    &event.details,
                    payload,
                ),
            )
            .await?;
        Ok(())
    }

    async fn list_for_call(&self, call_id: &str) -> Result<Vec<CallLogEvent>> {
        let statement = format!(
            "SELECT call_id, timestamp, event, campaign_id, details, provider_payload \
             FROM {}.call_logs WHERE call_id = ?",
            self.keyspace
        );
        let result = self.session.query_unpaged(statement, (call_id,)).await?;
        let rows = result.rows.unwrap_or_default();
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let (call_id, timestamp, event, campaign_id, details, provider_payload): (
                String,
                i64,
                String,
                Option<String>,
                String,
                Option<String>,
            ) = row
                .into_typed()
                .map_err(|e| PersistenceError::RowParse(e.to_string()))?;
            events.push(CallLogEvent {
                call_id,
                campaign_id,
                event: text_to_enum(&event).ok_or_else(|| PersistenceError::RowParse("event".into()))?,
                timestamp: millis_to_datetime(timestamp),
                details,
                provider_payload: provider_payload.and_then(|p| serde_json::from_str(&p).ok()),
            });
        }
        Ok(events)
    }
}

pub struct ScyllaCachedPromptRepository {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaCachedPromptRepository {
    pub fn new(session: Arc<Session>, keyspace: impl Into<String>) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
        }
    }
}

#[async_trait]
impl CachedPromptRepository for ScyllaCachedPromptRepository {
    async fn upsert(&self, prompt: &CachedPrompt) -> Result<()> {
        let statement = format!(
            "INSERT INTO {}.cached_prompts (agent_id, handle, created_at, expires_at, char_count, document_count) \
             VALUES (?, ?, ?, ?, ?, ?)",
            self.keyspace
        );
        self.session
            .query_unpaged(
                statement,
                (
                    &prompt.agent_id,
                    &prompt.handle,
                    prompt.created_at.timestamp_millis(),
                    prompt.expires_at.timestamp_millis(),
                    prompt.char_count as i32,
                    prompt.document_count as i32,
                ),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, agent_id: &str) -> Result<Option<CachedPrompt>> {
        let statement = format!(
            "SELECT agent_id, handle, created_at, expires_at, char_count, document_count \
             FROM {}.cached_prompts WHERE agent_id = ?",
            self.keyspace
        );
        let result = self.session.query_unpaged(statement, (agent_id,)).await?;
        let rows = result.rows.unwrap_or_default();
        for row in rows {
            let (agent_id, handle, created_at, expires_at, char_count, document_count): (
                String,
                String,
                i64,
                i64,
                i32,
                i32,
            ) = row
                .into_typed()
                .map_err(|e| PersistenceError::RowParse(e.to_string()))?;
            return Ok(Some(CachedPrompt {
                agent_id,
                handle,
                created_at: millis_to_datetime(created_at),
                expires_at: millis_to_datetime(expires_at),
                char_count: char_count as usize,
                document_count: document_count as usize,
            }));
        }
        Ok(None)
    }
}

pub struct ScyllaTurnRepository {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaTurnRepository {
    pub fn new(session: Arc<Session>, keyspace: impl Into<String>) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
        }
    }
}

#[async_trait]
impl TurnRepository for ScyllaTurnRepository {
    async fn append(&self, call_id: &str, turn: &Turn) -> Result<()> {
        let statement = format!(
            "INSERT INTO {}.turns (call_id, index, user_transcript, agent_response, started_at, \
             completed_at, stage, profile, objections, principle, filler_id, sentiment, interrupted) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.keyspace
        );
        let objections: Vec<String> = turn.objections.iter().map(enum_to_text).collect();
        self.session
            .query_unpaged(
                statement,
                (
                    call_id,
                    turn.index as i32,
                    &turn.user_transcript,
                    &turn.agent_response,
                    turn.started_at.timestamp_millis(),
                    turn.completed_at.map(|t| t.timestamp_millis()),
                    enum_to_text(&turn.stage),
                    enum_to_text(&turn.profile),
                    objections.join(","),
                    turn.principle.map(|p| enum_to_text(&p)),
                    &turn.filler_id,
                    turn.sentiment,
                    turn.interrupted,
                ),
            )
            .await?;
        Ok(())
    }

    async fn list_for_call(&self, call_id: &str) -> Result<Vec<Turn>> {
        let statement = format!(
            "SELECT index, user_transcript, agent_response, started_at, completed_at, stage, \
             profile, objections, principle, filler_id, sentiment, interrupted \
             FROM {}.turns WHERE call_id = ?",
            self.keyspace
        );
        let result = self.session.query_unpaged(statement, (call_id,)).await?;
        let rows = result.rows.unwrap_or_default();
        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let (
                index,
                user_transcript,
                agent_response,
                started_at,
                completed_at,
                stage,
                profile,
                objections,
                principle,
                filler_id,
                sentiment,
                interrupted,
            ): (
                i32,
                String,
                String,
                i64,
                Option<i64>,
                String,
                String,
                String,
                Option<String>,
                Option<String>,
                f32,
                bool,
            ) = row
                .into_typed()
                .map_err(|e| PersistenceError::RowParse(e.to_string()))?;
            turns.push(Turn {
                index: index as u32,
                user_transcript,
                agent_response,
                started_at: millis_to_datetime(started_at),
                completed_at: completed_at.map(millis_to_datetime),
                stage: text_to_enum(&stage).ok_or_else(|| PersistenceError::RowParse("stage".into()))?,
                profile: text_to_enum(&profile).ok_or_else(|| PersistenceError::RowParse("profile".into()))?,
                objections: objections
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .filter_map(text_to_enum)
                    .collect(),
                principle: principle.and_then(|p| text_to_enum(&p)),
                filler_id,
                sentiment,
                interrupted,
            });
        }
        Ok(turns)
    }
}

pub struct ScyllaAgentRepository {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaAgentRepository {
    pub fn new(session: Arc<Session>, keyspace: impl Into<String>) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
        }
    }
}

#[async_trait]
impl AgentRepository for ScyllaAgentRepository {
    async fn upsert(&self, agent: &AgentConfig) -> Result<()> {
        let statement = format!("INSERT INTO {}.agents (id, config) VALUES (?, ?)", self.keyspace);
        let config = serde_json::to_string(agent).map_err(|e| PersistenceError::RowParse(e.to_string()))?;
        self.session.query_unpaged(statement, (&agent.id, config)).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AgentConfig>> {
        let statement = format!("SELECT config FROM {}.agents WHERE id = ?", self.keyspace);
        let result = self.session.query_unpaged(statement, (id,)).await?;
        let rows = result.rows.unwrap_or_default();
        for row in rows {
            let (config,): (String,) = row.into_typed().map_err(|e| PersistenceError::RowParse(e.to_string()))?;
            let agent: AgentConfig =
                serde_json::from_str(&config).map_err(|e| PersistenceError::RowParse(e.to_string()))?;
            return Ok(Some(agent));
        }
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<AgentConfig>> {
        let statement = format!("SELECT config FROM {}.agents", self.keyspace);
        let result = self.session.query_unpaged(statement, &[]).await?;
        let rows = result.rows.unwrap_or_default();
        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let (config,): (String,) = row.into_typed().map_err(|e| PersistenceError::RowParse(e.to_string()))?;
            agents.push(serde_json::from_str(&config).map_err(|e| PersistenceError::RowParse(e.to_string()))?);
        }
        Ok(agents)
    }
}

pub struct ScyllaCampaignRepository {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaCampaignRepository {
    pub fn new(session: Arc<Session>, keyspace: impl Into<String>) -> Self {
        Self {
            session,
            keyspace: keyspace.into(),
        }
    }
}

#[async_trait]
impl CampaignRepository for ScyllaCampaignRepository {
    async fn upsert(&self, campaign: &Campaign) -> Result<()> {
        let statement = format!(
            "INSERT INTO {}.campaigns (id, name, agent_id, created_at) VALUES (?, ?, ?, ?)",
            self.keyspace
        );
        self.session
            .query_unpaged(
                statement,
                (
                    &campaign.id,
                    &campaign.name,
                    &campaign.agent_id,
                    campaign.created_at.timestamp_millis(),
                ),
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Campaign>> {
        let statement = format!(
            "SELECT id, name, agent_id, created_at FROM {}.campaigns WHERE id = ?",
            self.keyspace
        );
        let result = self.session.query_unpaged(statement, (id,)).await?;
        let rows = result.rows.unwrap_or_default();
        for row in rows {
            let (id, name, agent_id, created_at): (String, String, String, i64) =
                row.into_typed().map_err(|e| PersistenceError::RowParse(e.to_string()))?;
            return Ok(Some(Campaign {
                id,
                name,
                agent_id,
                created_at: millis_to_datetime(created_at),
            }));
        }
        Ok(None)
    }

    async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<Campaign>> {
        let statement = format!(
            "SELECT id, name, agent_id, created_at FROM {}.campaigns WHERE agent_id = ? ALLOW FILTERING",
            self.keyspace
        );
        let result = self.session.query_unpaged(statement, (agent_id,)).await?;
        let rows = result.rows.unwrap_or_default();
        let mut campaigns = Vec::with_capacity(rows.len());
        for row in rows {
            let (id, name, agent_id, created_at): (String, String, String, i64) =
                row.into_typed().map_err(|e| PersistenceError::RowParse(e.to_string()))?;
            campaigns.push(Campaign {
                id,
                name,
                agent_id,
                created_at: millis_to_datetime(created_at),
            });
        }
        Ok(campaigns)
    }
}

/// In-memory fallback used when ScyllaDB is unreachable; the server logs a
/// degraded-persistence warning and keeps serving calls rather than failing.
#[derive(Default)]
pub struct InMemoryCallRepository {
    calls: DashMap<String, Call>,
}

#[async_trait]
impl CallRepository for InMemoryCallRepository {
    async fn upsert(&self, call: &Call) -> Result<()> {
        self.calls.insert(call.id.clone(), call.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Call>> {
        Ok(self.calls.get(id).map(|c| c.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryCallLogRepository {
    logs: RwLock<HashMap<String, Vec<CallLogEvent>>>,
}

#[async_trait]
impl CallLogRepository for InMemoryCallLogRepository {
    async fn append(&self, event: &CallLogEvent) -> Result<()> {
        self.logs
            .write()
            .entry(event.call_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn list_for_call(&self, call_id: &str) -> Result<Vec<CallLogEvent>> {
        Ok(self.logs.read().get(call_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryCachedPromptRepository {
    prompts: DashMap<String, CachedPrompt>,
}

#[async_trait]
impl CachedPromptRepository for InMemoryCachedPromptRepository {
    async fn upsert(&self, prompt: &CachedPrompt) -> Result<()> {
        self.prompts.insert(prompt.agent_id.clone(), prompt.clone());
        Ok(())
    }

    async fn get(&self, agent_id: &str) -> Result<Option<CachedPrompt>> {
        Ok(self.prompts.get(agent_id).map(|p| p.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryTurnRepository {
    turns: RwLock<HashMap<String, Vec<Turn>>>,
}

#[async_trait]
impl TurnRepository for InMemoryTurnRepository {
    async fn append(&self, call_id: &str, turn: &Turn) -> Result<()> {
        self.turns.write().entry(call_id.to_string()).or_default().push(turn.clone());
        Ok(())
    }

    async fn list_for_call(&self, call_id: &str) -> Result<Vec<Turn>> {
        Ok(self.turns.read().get(call_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryAgentRepository {
    agents: DashMap<String, AgentConfig>,
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn upsert(&self, agent: &AgentConfig) -> Result<()> {
        self.agents.insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AgentConfig>> {
        Ok(self.agents.get(id).map(|a| a.clone()))
    }

    async fn list(&self) -> Result<Vec<AgentConfig>> {
        Ok(self.agents.iter().map(|e| e.value().clone()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryCampaignRepository {
    campaigns: DashMap<String, Campaign>,
}

#[async_trait]
impl CampaignRepository for InMemoryCampaignRepository {
    async fn upsert(&self, campaign: &Campaign) -> Result<()> {
        self.campaigns.insert(campaign.id.clone(), campaign.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Campaign>> {
        Ok(self.campaigns.get(id).map(|c| c.clone()))
    }

    async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<Campaign>> {
        Ok(self
            .campaigns
            .iter()
            .filter(|e| e.value().agent_id == agent_id)
            .map(|e| e.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_core::{CallDirection, CallStatus, CarrierType};

    fn sample_call() -> Call {
        Call {
            id: "call-1".into(),
            agent_id: "agent-1".into(),
            lead_id: "lead-1".into(),
            direction: CallDirection::Outbound,
            start_at: Utc::now(),
            answered_at: None,
            ended_at: None,
            status: CallStatus::Ringing,
            duration_secs: None,
            carrier_type: CarrierType::Telephony,
            recording_url: None,
            outcome: None,
            final_sentiment: None,
            campaign_id: Some("camp-1".into()),
        }
    }

    #[tokio::test]
    async fn in_memory_call_repository_round_trips() {
        let repo = InMemoryCallRepository::default();
        let call = sample_call();
        repo.upsert(&call).await.unwrap();
        let fetched = repo.get("call-1").await.unwrap().unwrap();
        assert_eq!(fetched.agent_id, "agent-1");
    }

    #[tokio::test]
    async fn in_memory_call_log_repository_appends_in_order() {
        use voice_agent_core::CallLogEventKind;
        let repo = InMemoryCallLogRepository::default();
        for kind in [CallLogEventKind::Initiated, CallLogEventKind::Answered] {
            repo.append(&CallLogEvent {
                call_id: "call-1".into(),
                campaign_id: None,
                event: kind,
                timestamp: Utc::now(),
                details: "x".into(),
                provider_payload: None,
            })
            .await
            .unwrap();
        }
        let events = repo.list_for_call("call-1").await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn in_memory_turn_repository_appends_in_order() {
        use std::collections::HashSet;
        use voice_agent_core::{Profile, Stage};

        let repo = InMemoryTurnRepository::default();
        for index in 0..2 {
            repo.append(
                "call-1",
                &Turn {
                    index,
                    user_transcript: "hello".into(),
                    agent_response: "hi there".into(),
                    started_at: Utc::now(),
                    completed_at: Some(Utc::now()),
                    stage: Stage::Awareness,
                    profile: Profile::Analytical,
                    objections: HashSet::new(),
                    principle: None,
                    filler_id: None,
                    sentiment: 0.5,
                    interrupted: false,
                },
            )
            .await
            .unwrap();
        }
        let turns = repo.list_for_call("call-1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].index, 1);
    }

    #[tokio::test]
    async fn in_memory_agent_repository_round_trips() {
        use voice_agent_core::{
            AgentIdentity, BackgroundNoiseProfile, CallPolicy, Clarity, FillerFrequency,
            InterruptionSensitivity, Language, PlanTier, ResponseLength, SpeechPolicy,
            VoiceCharacteristics, VoiceTone,
        };

        let repo = InMemoryAgentRepository::default();
        let agent = AgentConfig {
            id: "agent-1".into(),
            identity: AgentIdentity {
                display_name: "Asha".into(),
                role: "sales rep".into(),
                persona: "friendly and direct".into(),
                target_audience: "homeowners".into(),
                industry: "solar".into(),
            },
            language: Language::English,
            voice: VoiceCharacteristics {
                voice_name: "aria".into(),
                tone: VoiceTone::Warm,
                emotion: 0.5,
                pitch: 1.0,
                speed: 1.0,
                pause_ms: 200,
                clarity: Clarity::Standard,
            },
            speech_policy: SpeechPolicy {
                interruption_sensitivity: InterruptionSensitivity::Medium,
                response_length: ResponseLength::Brief,
                question_frequency: 30,
                filler_frequency: FillerFrequency::Normal,
            },
            background_noise: BackgroundNoiseProfile::QuietOffice,
            knowledge: vec![],
            call_policy: CallPolicy {
                max_duration_secs: 600,
                end_on_silence_secs: 30,
                silence_energy_threshold: 0.02,
            },
            plan_tier: PlanTier::Standard,
        };
        repo.upsert(&agent).await.unwrap();
        let fetched = repo.get("agent-1").await.unwrap().unwrap();
        assert_eq!(fetched.identity.display_name, "Asha");
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn in_memory_campaign_repository_filters_by_agent() {
        let repo = InMemoryCampaignRepository::default();
        repo.upsert(&Campaign {
            id: "camp-1".into(),
            name: "spring".into(),
            agent_id: "agent-1".into(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
        repo.upsert(&Campaign {
            id: "camp-2".into(),
            name: "fall".into(),
            agent_id: "agent-2".into(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
        let for_agent_1 = repo.list_for_agent("agent-1").await.unwrap();
        assert_eq!(for_agent_1.len(), 1);
        assert_eq!(for_agent_1[0].id, "camp-1");
    }
}
