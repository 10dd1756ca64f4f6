//! Call state machine trait and event/action vocabulary.
//!
//! Defines the five-state conversation lifecycle and the generic interface
//! a concrete state machine implementation exposes to the call supervisor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The call's current state. `CallEnding`/`Ended` are reached from any state
/// on a fatal condition or normal hangup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    #[default]
    Idle,
    Listening,
    Thinking,
    Speaking,
    Recovery,
    CallEnding,
    Ended,
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CallState::Idle => "IDLE",
            CallState::Listening => "LISTENING",
            CallState::Thinking => "THINKING",
            CallState::Speaking => "SPEAKING",
            CallState::Recovery => "RECOVERY",
            CallState::CallEnding => "CALL_ENDING",
            CallState::Ended => "ENDED",
        };
        write!(f, "{s}")
    }
}

/// Events that drive state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// Carrier produced `CallAnswered` (telephony `answer` or browser connect).
    CallAnswered { stream_id: Option<String> },
    /// Inbound audio chunk arrived from the carrier, already resampled to 16 kHz.
    AudioIn { energy: f32 },
    /// Inbound silence has met the configured end-of-speech threshold.
    SilenceDetected { duration_ms: u64 },
    /// Model emitted an `AudioOut` chunk.
    ModelAudioOut,
    /// Model signaled `turnComplete`.
    ModelTurnComplete,
    /// Model signaled `interrupted`.
    ModelInterrupted,
    /// The 400 ms hedge silence timer fired with no model audio yet.
    HedgeTimerFired,
    /// The 3 s LLM thinking timeout elapsed.
    ThinkingTimeout,
    /// Sustained inbound RMS while SPEAKING/RECOVERY: user is barging in.
    InterruptDetected,
    /// The currently-playing filler finished.
    FillerEnded,
    /// Call policy max duration exceeded.
    MaxDurationExceeded,
    /// Operator or carrier hung up.
    Hangup,
    /// Carrier socket closed unexpectedly.
    CarrierClosed,
    /// Model session reported an unrecoverable error.
    FatalModelError { detail: String },
}

/// Actions the state machine asks its owner (the call supervisor) to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FSMAction {
    EnableVad,
    DisableVad,
    StartHedgeTimer,
    CancelHedgeTimer,
    StartThinkingTimeout,
    CancelThinkingTimeout,
    PlayFiller,
    StopFiller,
    EmitModelAudio,
    DrainOutboundAudio,
    EmitInterruptSignal,
    RunAnalyzerAndPrinciple,
    AppendCallLogEvent { detail: String },
    RecordMetric { name: String, value: f64 },
    CloseModelSession,
    CloseCarrier,
    PersistCallRecord,
    SpeakPromptToRepeat,
    SpeakApology,
    /// Append the in-progress Turn (user transcript, principle, filler,
    /// sentiment, etc. — tracked by the supervisor, not the FSM) now that
    /// the agent response has completed, by interruption, or by timeout.
    CommitTurn { interrupted: bool },
}

/// Guard predicates named in the call state machine's transition table.
/// Exposed as a trait so a concrete implementation's guard evaluation is
/// independently testable.
pub trait CallGuards {
    fn silence_threshold_met(&self) -> bool;
    fn should_interrupt(&self) -> bool;
    fn max_duration_exceeded(&self) -> bool;
}

/// FSM errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FSMError {
    #[error("invalid transition from {from} on event {event}")]
    InvalidTransition { from: CallState, event: String },

    #[error("no checkpoint at index {0}")]
    NoCheckpoint(usize),

    #[error("checkpoint restore failed: {0}")]
    RestoreFailed(String),

    #[error("context key not found: {0}")]
    ContextKeyNotFound(String),
}

/// A debug-aid snapshot of FSM state; not a required recovery mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FSMCheckpoint {
    pub index: usize,
    pub state: CallState,
    pub context: HashMap<String, serde_json::Value>,
    pub timestamp_ms: u64,
}

/// Call-level state machine trait implemented by the concrete call state
/// machine in `voice-agent-server`.
#[async_trait]
pub trait ConversationFSM: Send + Sync + 'static {
    /// Current call state.
    fn state(&self) -> CallState;

    /// Process an event, update internal state, and return the actions the
    /// owner must perform as a result.
    async fn transition(&mut self, event: ConversationEvent) -> Result<Vec<FSMAction>, FSMError>;

    /// Check whether a transition is defined for the current state without
    /// executing it.
    fn can_transition(&self, event: &ConversationEvent) -> bool;

    fn checkpoint(&mut self) -> FSMCheckpoint;

    fn restore(&mut self, checkpoint_index: usize) -> Result<(), FSMError>;

    fn checkpoints(&self) -> &[FSMCheckpoint];

    fn get_context(&self, key: &str) -> Option<&serde_json::Value>;

    fn set_context(&mut self, key: &str, value: serde_json::Value);

    fn metrics(&self) -> FSMMetrics;
}

/// Call-scoped metrics snapshot, surfaced via `ConversationFSM::metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FSMMetrics {
    pub chunks_in: u64,
    pub chunks_out: u64,
    pub fillers_played: u64,
    pub interruptions: u64,
    pub model_latency_ms: Vec<u64>,
    pub state_changes: u64,
}
