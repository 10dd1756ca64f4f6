//! Call Supervisor: owns one call end to end. Drives the call state machine
//! from carrier and model events, executes the FSM's emitted actions, and
//! tears down both legs cooperatively on hangup or fatal error (spec §4.9,
//! §5).

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{info, warn};

use voice_agent_core::{
    audio, Call, CallDirection, CallLogEvent, CallLogEventKind, CallState, CallStatus, CarrierType,
    ConversationEvent, ConversationFSM, FSMAction, Language, Objection, Principle, Profile, Stage, Turn,
    UtteranceKind,
};
use voice_agent_llm::{ModelEvent, ModelSession, ModelSessionConfig, PromptBuilder, TranscriptRole};
use voice_agent_transport::{Carrier, CarrierEvent, CarrierKind, OutboundQueue, RawInbound};

use crate::fsm::CallStateMachine;
use crate::state::AppState;

const TICK_MS: u64 = 50;
const SILENCE_DEBOUNCE_MS: u64 = 500;

pub struct CallContext {
    pub call_id: String,
    pub lead_id: String,
    pub agent_id: String,
    pub carrier_kind: CarrierKind,
}

pub struct CallSupervisor;

impl CallSupervisor {
    /// Runs one call to completion. `carrier_in` receives raw frames decoded
    /// by the websocket reader task; `carrier_out` is written back to the
    /// socket by the corresponding writer task. Returns when the call has
    /// reached `Ended`.
    pub async fn run(
        ctx: CallContext,
        mut carrier: Box<dyn Carrier>,
        mut carrier_in: mpsc::Receiver<RawInbound>,
        carrier_out: OutboundQueue,
        state: AppState,
    ) {
        let agent = match state.agents.try_get(&ctx.agent_id) {
            Ok(agent) => agent.clone(),
            Err(e) => {
                warn!(call_id = %ctx.call_id, error = %e, "unknown agent; aborting call");
                return;
            }
        };

        let system_instruction = PromptBuilder::new(&agent).build();
        let cached = state
            .cache_manager
            .get_or_create(&agent.id, agent.language, &system_instruction, agent.knowledge.len())
            .await
            .unwrap_or_else(|e| {
                warn!(call_id = %ctx.call_id, error = %e, "cache lookup failed; falling back to inline instruction");
                None
            });

        let model_config = match &cached {
            Some(entry) => ModelSessionConfig {
                endpoint: state.settings.model.endpoint.clone(),
                model_id: state.settings.model.model_id.clone(),
                cached_content: Some(entry.handle.clone()),
                system_instruction: None,
            },
            None => ModelSessionConfig {
                endpoint: state.settings.model.endpoint.clone(),
                model_id: state.settings.model.model_id.clone(),
                cached_content: None,
                system_instruction: Some(system_instruction),
            },
        };

        let (model, mut model_events) = match ModelSession::connect(model_config).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(call_id = %ctx.call_id, error = %e, "model session connect failed; aborting call");
                return;
            }
        };

        let mut fsm = CallStateMachine::new(agent.call_policy.clone());
        let mut transcript = String::new();
        let mut vad_enabled = false;
        let mut last_audio_at = Instant::now();
        let mut silence_signaled = false;
        let mut hedge_deadline: Option<Instant> = None;
        let mut thinking_deadline: Option<Instant> = None;
        let mut filler_deadline: Option<Instant> = None;
        let mut max_duration_signaled = false;
        let mut interrupt_voice_since: Option<Instant> = None;

        // Turn-scoped accumulators, reset on every `CommitTurn`. `stage`,
        // `profile`, `principle`, and `language` keep the last analyzer
        // result across resets so a filler played before the next
        // `RunAnalyzerAndPrinciple` still has a sensible selection context.
        let mut turn_index: u32 = 0;
        let mut turn_started_at = Utc::now();
        let mut turn_transcript = String::new();
        let mut turn_agent_response = String::new();
        let mut turn_stage = Stage::Awareness;
        let mut turn_profile = Profile::Analytical;
        let mut turn_objections: HashSet<Objection> = HashSet::new();
        let mut turn_principle: Option<Principle> = None;
        let mut turn_language = agent.language;
        let mut turn_sentiment: f32 = 0.5;
        let mut turn_filler_id: Option<String> = None;

        let call_record_start = Utc::now();
        let mut ticker = interval(Duration::from_millis(TICK_MS));

        loop {
            let event = tokio::select! {
                raw = carrier_in.recv() => {
                    match raw {
                        Some(raw) => match carrier.decode_frame(raw) {
                            Ok(Some(CarrierEvent::CallAnswered { stream_id, .. })) => {
                                ConversationEvent::CallAnswered { stream_id }
                            }
                            Ok(Some(CarrierEvent::AudioIn { pcm16k, energy })) => {
                                let _ = model.send_audio(&pcm16k).await;
                                let energy = energy.unwrap_or_else(|| audio::rms(&pcm16k));

                                let active = audio::is_voice_active(&pcm16k, agent.call_policy.silence_energy_threshold);
                                let speaking_like = matches!(fsm.state(), CallState::Speaking | CallState::Recovery);
                                if speaking_like && active {
                                    let since = interrupt_voice_since.get_or_insert_with(Instant::now);
                                    if since.elapsed() >= Duration::from_millis(
                                        voice_agent_config::constants::timeouts::INTERRUPT_SUSTAIN_MS,
                                    ) {
                                        interrupt_voice_since = None;
                                        ConversationEvent::InterruptDetected
                                    } else {
                                        continue;
                                    }
                                } else {
                                    if !active {
                                        interrupt_voice_since = None;
                                    }
                                    ConversationEvent::AudioIn { energy }
                                }
                            }
                            Ok(None) => continue,
                            Err(e) => {
                                warn!(call_id = %ctx.call_id, error = %e, "dropping malformed carrier frame");
                                continue;
                            }
                        },
                        None => ConversationEvent::CarrierClosed,
                    }
                }
                model_event = model_events.recv() => {
                    match model_event {
                        Some(ModelEvent::AudioOut(pcm24k)) => {
                            let pcm16k = audio::resample(&pcm24k, audio::SampleRate::Hz24000, audio::SampleRate::Hz16000);
                            let frame = carrier.encode_audio_out(&pcm16k);
                            carrier_out.push(frame);
                            ConversationEvent::ModelAudioOut
                        }
                        Some(ModelEvent::Transcript { role, text }) => {
                            match role {
                                TranscriptRole::User => {
                                    transcript.push(' ');
                                    transcript.push_str(&text);
                                    turn_transcript.push(' ');
                                    turn_transcript.push_str(&text);
                                }
                                TranscriptRole::Model => {
                                    turn_agent_response.push(' ');
                                    turn_agent_response.push_str(&text);
                                }
                            }
                            continue;
                        }
                        Some(ModelEvent::TurnComplete) => ConversationEvent::ModelTurnComplete,
                        Some(ModelEvent::Interrupted) => ConversationEvent::ModelInterrupted,
                        Some(ModelEvent::FatalError { detail }) => ConversationEvent::FatalModelError { detail },
                        Some(ModelEvent::Closed { reason, .. }) => ConversationEvent::FatalModelError { detail: reason },
                        None => ConversationEvent::FatalModelError { detail: "model session task exited".to_string() },
                    }
                }
                _ = ticker.tick() => {
                    if let Some(ev) = Self::tick_event(
                        vad_enabled,
                        last_audio_at,
                        &mut silence_signaled,
                        &mut hedge_deadline,
                        &mut thinking_deadline,
                        &mut filler_deadline,
                        &mut max_duration_signaled,
                        &fsm,
                    ) {
                        ev
                    } else {
                        continue;
                    }
                }
            };

            if matches!(event, ConversationEvent::AudioIn { .. }) {
                last_audio_at = Instant::now();
                silence_signaled = false;
            }

            let actions = match fsm.transition(event).await {
                Ok(actions) => actions,
                Err(e) => {
                    warn!(call_id = %ctx.call_id, error = %e, "invalid FSM transition; ignoring event");
                    continue;
                }
            };

            for action in &actions {
                match action {
                    FSMAction::EnableVad => vad_enabled = true,
                    FSMAction::DisableVad => vad_enabled = false,
                    FSMAction::StartHedgeTimer => {
                        hedge_deadline = Some(Instant::now() + Duration::from_millis(
                            voice_agent_config::constants::timeouts::HEDGE_SILENCE_MS,
                        ));
                    }
                    FSMAction::CancelHedgeTimer => hedge_deadline = None,
                    FSMAction::StartThinkingTimeout => {
                        thinking_deadline = Some(Instant::now() + Duration::from_secs(
                            voice_agent_config::constants::timeouts::LLM_THINKING_SECS,
                        ));
                    }
                    FSMAction::CancelThinkingTimeout => thinking_deadline = None,
                    FSMAction::RunAnalyzerAndPrinciple => {
                        let result = state.analyzer.analyze(&ctx.call_id, &transcript);
                        let selection = state.principle_engine.select(
                            &ctx.call_id,
                            result.stage,
                            result.profile,
                            &result.objections,
                        );
                        info!(
                            call_id = %ctx.call_id,
                            stage = ?result.stage,
                            profile = ?result.profile,
                            principle = ?selection.principle,
                            "analyzer/principle evaluated"
                        );
                        turn_stage = result.stage;
                        turn_profile = result.profile;
                        turn_objections = result.objections.clone();
                        turn_language = result.language;
                        turn_sentiment = result.sentiment;
                        turn_principle = Some(selection.principle);
                    }
                    FSMAction::PlayFiller => {
                        if let Ok(filler) = state.hedge_selector.select(
                            &ctx.call_id,
                            turn_language,
                            turn_principle,
                            turn_profile,
                        ) {
                            if let Ok(pcm16k) = state.hedge_selector.index().load_audio(&filler) {
                                carrier_out.push(carrier.encode_audio_out(&pcm16k));
                            }
                            filler_deadline =
                                Some(Instant::now() + Duration::from_secs_f32(filler.duration_secs.max(0.0)));
                            turn_filler_id = Some(filler.id.clone());
                        }
                    }
                    FSMAction::StopFiller => filler_deadline = None,
                    FSMAction::SpeakApology => {
                        Self::speak_utterance(carrier.as_ref(), &carrier_out, &state, UtteranceKind::Apology, turn_language);
                    }
                    FSMAction::SpeakPromptToRepeat => {
                        Self::speak_utterance(
                            carrier.as_ref(),
                            &carrier_out,
                            &state,
                            UtteranceKind::PromptToRepeat,
                            turn_language,
                        );
                    }
                    FSMAction::EmitInterruptSignal => {
                        if let Some(frame) = carrier.encode_interrupt() {
                            carrier_out.push(frame);
                        }
                    }
                    FSMAction::CommitTurn { interrupted } => {
                        let turn = Turn {
                            index: turn_index,
                            user_transcript: turn_transcript.trim().to_string(),
                            agent_response: turn_agent_response.trim().to_string(),
                            started_at: turn_started_at,
                            completed_at: Some(Utc::now()),
                            stage: turn_stage,
                            profile: turn_profile,
                            objections: turn_objections.clone(),
                            principle: turn_principle,
                            filler_id: turn_filler_id.clone(),
                            sentiment: turn_sentiment,
                            interrupted: *interrupted,
                        };
                        let _ = state.turns.append(&ctx.call_id, &turn).await;

                        turn_index += 1;
                        turn_started_at = Utc::now();
                        turn_transcript.clear();
                        turn_agent_response.clear();
                        turn_objections.clear();
                        turn_principle = None;
                        turn_filler_id = None;
                    }
                    FSMAction::AppendCallLogEvent { detail } => {
                        let kind = match detail.as_str() {
                            "call answered" => CallLogEventKind::Answered,
                            "max duration exceeded" => CallLogEventKind::Completed,
                            _ => CallLogEventKind::Failed,
                        };
                        let event = CallLogEvent {
                            call_id: ctx.call_id.clone(),
                            campaign_id: None,
                            event: kind,
                            timestamp: Utc::now(),
                            details: detail.clone(),
                            provider_payload: None,
                        };
                        let _ = state.call_logs.append(&event).await;
                    }
                    FSMAction::RecordMetric { name, value } => {
                        metrics::gauge!(name.clone()).set(*value);
                    }
                    FSMAction::PersistCallRecord => {
                        let metrics_snapshot = fsm.metrics();
                        let call = Call {
                            id: ctx.call_id.clone(),
                            agent_id: ctx.agent_id.clone(),
                            lead_id: ctx.lead_id.clone(),
                            direction: CallDirection::Inbound,
                            start_at: call_record_start,
                            answered_at: Some(call_record_start),
                            ended_at: Some(Utc::now()),
                            status: CallStatus::Completed,
                            duration_secs: Some(
                                (Utc::now() - call_record_start).num_seconds().max(0) as u32,
                            ),
                            carrier_type: match ctx.carrier_kind {
                                CarrierKind::Telephony => CarrierType::Telephony,
                                CarrierKind::Browser => CarrierType::Browser,
                            },
                            recording_url: None,
                            outcome: None,
                            final_sentiment: None,
                            campaign_id: None,
                        };
                        let _ = state.calls.upsert(&call).await;
                        metrics::counter!("voice_agent_calls_ended_total").increment(1);
                        metrics::counter!("voice_agent_interruptions_total")
                            .increment(metrics_snapshot.interruptions as u64);
                        metrics::counter!("voice_agent_fillers_played_total")
                            .increment(metrics_snapshot.fillers_played as u64);
                    }
                    FSMAction::CloseModelSession => model.close(),
                    FSMAction::CloseCarrier => {
                        carrier_out.clear();
                        carrier_out.close();
                    }
                    FSMAction::DrainOutboundAudio => carrier_out.clear(),
                    FSMAction::EmitModelAudio => {
                        // Already forwarded to the carrier when the
                        // `ModelAudioOut` event was produced above.
                    }
                }
            }

            if fsm.state() == CallState::Ended {
                state.analyzer.forget(&ctx.call_id);
                state.principle_engine.forget(&ctx.call_id);
                state.hedge_selector.forget(&ctx.call_id);
                break;
            }
        }
    }

    /// Loads and plays a fixed verbal utterance (apology, prompt-to-repeat)
    /// from the filler index. Silently no-ops if the index has no matching
    /// entry, same degradation as an unresolvable hedge filler.
    fn speak_utterance(
        carrier: &dyn Carrier,
        carrier_out: &OutboundQueue,
        state: &AppState,
        kind: UtteranceKind,
        language: Language,
    ) {
        let Some(utterance) = state.hedge_selector.index().utterance(kind, language) else {
            return;
        };
        if let Ok(pcm16k) = state.hedge_selector.index().load_audio(utterance) {
            carrier_out.push(carrier.encode_audio_out(&pcm16k));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn tick_event(
        vad_enabled: bool,
        last_audio_at: Instant,
        silence_signaled: &mut bool,
        hedge_deadline: &mut Option<Instant>,
        thinking_deadline: &mut Option<Instant>,
        filler_deadline: &mut Option<Instant>,
        max_duration_signaled: &mut bool,
        fsm: &CallStateMachine,
    ) -> Option<ConversationEvent> {
        use voice_agent_core::CallGuards;

        let now = Instant::now();

        if !*max_duration_signaled && fsm.max_duration_exceeded() {
            *max_duration_signaled = true;
            return Some(ConversationEvent::MaxDurationExceeded);
        }

        if let Some(deadline) = *thinking_deadline {
            if now >= deadline {
                *thinking_deadline = None;
                return Some(ConversationEvent::ThinkingTimeout);
            }
        }

        if let Some(deadline) = *hedge_deadline {
            if now >= deadline {
                *hedge_deadline = None;
                return Some(ConversationEvent::HedgeTimerFired);
            }
        }

        if let Some(deadline) = *filler_deadline {
            if now >= deadline {
                *filler_deadline = None;
                return Some(ConversationEvent::FillerEnded);
            }
        }

        if vad_enabled && !*silence_signaled {
            let elapsed = last_audio_at.elapsed();
            if elapsed >= Duration::from_millis(SILENCE_DEBOUNCE_MS) {
                *silence_signaled = true;
                return Some(ConversationEvent::SilenceDetected {
                    duration_ms: elapsed.as_millis() as u64,
                });
            }
        }

        None
    }
}
