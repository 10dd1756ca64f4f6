//! Shared data model: agent configuration, call, turn, cached prompt, filler,
//! and call-log event records (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Language the agent may converse in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Hindi,
    Marathi,
    Hinglish,
    Tamil,
    Telugu,
    Kannada,
}

impl Language {
    /// Languages whose salutation convention is "<FirstName> Ji" rather
    /// than "Mr./Ms. <LastName>" (spec §4.8, §8 boundary behaviors).
    pub fn uses_ji_salutation(self) -> bool {
        matches!(self, Language::Hindi | Language::Hinglish | Language::Marathi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceTone {
    Warm,
    Professional,
    Energetic,
    Calm,
    Empathetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clarity {
    Standard,
    Enhanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionSensitivity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseLength {
    Brief,
    Standard,
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillerFrequency {
    Rare,
    Normal,
    Frequent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundNoiseProfile {
    QuietOffice,
    CallCenter,
    Outdoor,
    HomeOffice,
}

impl BackgroundNoiseProfile {
    /// The environmental acoustic-steering clause injected into the prompt
    /// (spec §4.8).
    pub fn steering_clause(self) -> &'static str {
        match self {
            BackgroundNoiseProfile::QuietOffice => {
                "Adapt your clarity as if speaking from a quiet office; the caller may be in a similarly quiet environment."
            }
            BackgroundNoiseProfile::CallCenter => {
                "Speak with extra clarity and slightly slower pacing; the caller may be in a noisy call-center environment."
            }
            BackgroundNoiseProfile::Outdoor => {
                "Speak clearly and concisely; the caller may be outdoors with variable background noise."
            }
            BackgroundNoiseProfile::HomeOffice => {
                "Adapt your clarity as if speaking from a home office; the caller's environment may be informal."
            }
        }
    }
}

/// One knowledge document contributed to the system instruction's Knowledge
/// Base section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceCharacteristics {
    pub voice_name: String,
    pub tone: VoiceTone,
    /// Clamped to [0,1].
    pub emotion: f32,
    /// Clamped to [0.75,1.25].
    pub pitch: f32,
    /// Clamped to [0.75,1.25].
    pub speed: f32,
    pub pause_ms: u32,
    pub clarity: Clarity,
}

impl VoiceCharacteristics {
    pub fn clamp(&mut self) {
        self.emotion = self.emotion.clamp(0.0, 1.0);
        self.pitch = self.pitch.clamp(0.75, 1.25);
        self.speed = self.speed.clamp(0.75, 1.25);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechPolicy {
    pub interruption_sensitivity: InterruptionSensitivity,
    pub response_length: ResponseLength,
    /// 0-100.
    pub question_frequency: u8,
    pub filler_frequency: FillerFrequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub display_name: String,
    pub role: String,
    pub persona: String,
    pub target_audience: String,
    pub industry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallPolicy {
    pub max_duration_secs: u32,
    pub end_on_silence_secs: u32,
    pub silence_energy_threshold: f32,
}

/// Whether the agent is on the entry-level "starter" plan, which clamps
/// emotion/responsiveness regardless of configured values (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlanTier {
    #[default]
    Standard,
    Starter,
}

/// Agent configuration: read once at call start, immutable per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub identity: AgentIdentity,
    pub language: Language,
    pub voice: VoiceCharacteristics,
    pub speech_policy: SpeechPolicy,
    pub background_noise: BackgroundNoiseProfile,
    pub knowledge: Vec<KnowledgeDocument>,
    pub call_policy: CallPolicy,
    pub plan_tier: PlanTier,
}

impl AgentConfig {
    /// Apply the invariant clamps from spec §8 boundary behaviors: emotion
    /// outside [0,1] clamps, and starter-plan agents clamp emotion and
    /// responsiveness (question frequency) to 0.5 regardless of input.
    pub fn normalize(&mut self) {
        self.voice.clamp();
        if self.plan_tier == PlanTier::Starter {
            self.voice.emotion = 0.5;
            self.speech_policy.question_frequency = 50;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Initiated,
    Dialing,
    Ringing,
    Answered,
    Completed,
    Failed,
    NoAnswer,
    Missed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    MeetingBooked,
    CallbackRequested,
    NotInterested,
    Voicemail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierType {
    Telephony,
    Browser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: String,
    pub agent_id: String,
    pub lead_id: String,
    pub direction: CallDirection,
    pub start_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: CallStatus,
    pub duration_secs: Option<u32>,
    pub carrier_type: CarrierType,
    pub recording_url: Option<String>,
    pub outcome: Option<CallOutcome>,
    pub final_sentiment: Option<f32>,
    pub campaign_id: Option<String>,
}

/// Conversation funnel stage (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Awareness,
    Consideration,
    Decision,
}

/// Counterparty decision-style classification (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Analytical,
    Emotional,
    Skeptical,
    DecisionMaker,
    RelationshipSeeker,
}

/// Objection category (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objection {
    Price,
    Quality,
    Trust,
    Timing,
    Need,
}

/// Psychological persuasion principle (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principle {
    Reciprocity,
    Commitment,
    SocialProof,
    Authority,
    Liking,
    Scarcity,
}

impl Principle {
    pub const ALL: [Principle; 6] = [
        Principle::Reciprocity,
        Principle::Commitment,
        Principle::SocialProof,
        Principle::Authority,
        Principle::Liking,
        Principle::Scarcity,
    ];
}

/// One user-utterance + agent-response exchange. Append-only once committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub index: u32,
    pub user_transcript: String,
    pub agent_response: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stage: Stage,
    pub profile: Profile,
    pub objections: HashSet<Objection>,
    pub principle: Option<Principle>,
    pub filler_id: Option<String>,
    pub sentiment: f32,
    pub interrupted: bool,
}

/// A named grouping of outbound calls against one agent (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub agent_id: String,
    pub created_at: DateTime<Utc>,
}

/// Per-agent remote cached-prompt handle (spec §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPrompt {
    pub agent_id: String,
    pub handle: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub char_count: usize,
    pub document_count: usize,
}

/// Filler-file tags as stored in the on-disk manifest (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillerEffectiveness {
    pub completion_rate: f32,
    pub sentiment_lift: f32,
    pub principle_reinforcement: f32,
}

impl FillerEffectiveness {
    /// Single scalar score in [0,1] used for the effectiveness tie-break
    /// (spec §4.7 step 5).
    pub fn score(&self) -> f32 {
        ((self.completion_rate + self.sentiment_lift + self.principle_reinforcement) / 3.0)
            .clamp(0.0, 1.0)
    }
}

/// What a filler-index entry is used for. Ordinary hedge fillers fill
/// thinking silence; the other two are fixed verbal utterances the
/// supervisor falls back to when the hedge ladder or the model itself
/// gives up (spec §4.9, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceKind {
    #[default]
    Hedge,
    PromptToRepeat,
    Apology,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filler {
    pub id: String,
    pub file_path: String,
    pub duration_secs: f32,
    pub languages: HashSet<Language>,
    pub principles: HashSet<Principle>,
    pub profiles: HashSet<Profile>,
    pub tone: VoiceTone,
    pub effectiveness: FillerEffectiveness,
    #[serde(default)]
    pub kind: UtteranceKind,
}

/// Append-only call lifecycle event (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallLogEventKind {
    Initiated,
    Dialing,
    Ringing,
    Answered,
    Completed,
    Failed,
    Missed,
    NoAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLogEvent {
    pub call_id: String,
    pub campaign_id: Option<String>,
    pub event: CallLogEventKind,
    pub timestamp: DateTime<Utc>,
    pub details: String,
    pub provider_payload: Option<serde_json::Value>,
}
