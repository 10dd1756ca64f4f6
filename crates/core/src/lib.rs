//! Core data model, audio codec, and call state machine vocabulary shared
//! across the voice agent workspace.

pub mod audio;
pub mod error;
pub mod model;
pub mod traits;

pub use audio::{b64decode, b64encode, is_voice_active, resample, rms, AudioCodecError, SampleRate};
pub use error::{Error, Result};
pub use model::{
    AgentConfig, AgentIdentity, BackgroundNoiseProfile, Call, CallDirection, CallLogEvent,
    CallLogEventKind, CallOutcome, CallPolicy, CallStatus, Campaign, CarrierType, CachedPrompt, Clarity,
    Filler, FillerEffectiveness, FillerFrequency, InterruptionSensitivity, KnowledgeDocument,
    Language, Objection, PlanTier, Principle, Profile, ResponseLength, SpeechPolicy, Stage,
    Turn, UtteranceKind, VoiceCharacteristics, VoiceTone,
};
pub use traits::{
    CallGuards, CallState, ConversationEvent, ConversationFSM, FSMAction, FSMCheckpoint, FSMError,
    FSMMetrics,
};
