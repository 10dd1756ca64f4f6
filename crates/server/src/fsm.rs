//! Concrete call state machine: the five-state conversation lifecycle
//! (spec §4.9) implementing `voice_agent_core::ConversationFSM`.

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;

use voice_agent_core::{
    CallGuards, CallPolicy, CallState, ConversationEvent, ConversationFSM, FSMAction, FSMCheckpoint,
    FSMError, FSMMetrics,
};

/// Debounce before `SilenceDetected` is treated as end-of-utterance, distinct
/// from `CallPolicy::end_on_silence_secs` (which governs ending an entire
/// call after prolonged silence and is evaluated by the call supervisor).
const UTTERANCE_SILENCE_MS: u64 = 500;

/// Filler plays allowed in RECOVERY before giving up to a spoken
/// prompt-to-repeat and returning to LISTENING (spec §4.7).
const MAX_RECOVERY_FILLER_PLAYS: u32 = 2;

pub struct CallStateMachine {
    state: CallState,
    policy: CallPolicy,
    context: HashMap<String, Value>,
    checkpoints: Vec<FSMCheckpoint>,
    metrics: FSMMetrics,
    started_at: Instant,
    last_silence_duration_ms: u64,
    recovery_filler_plays: u32,
}

impl CallStateMachine {
    pub fn new(policy: CallPolicy) -> Self {
        Self {
            state: CallState::Idle,
            policy,
            context: HashMap::new(),
            checkpoints: Vec::new(),
            metrics: FSMMetrics::default(),
            started_at: Instant::now(),
            last_silence_duration_ms: 0,
            recovery_filler_plays: 0,
        }
    }
}

impl CallGuards for CallStateMachine {
    fn silence_threshold_met(&self) -> bool {
        self.last_silence_duration_ms >= UTTERANCE_SILENCE_MS
    }

    fn should_interrupt(&self) -> bool {
        // The supervisor only emits `InterruptDetected` after its own
        // sustained-RMS timer clears `INTERRUPT_SUSTAIN_MS`; by the time the
        // FSM sees the event, the guard has already been satisfied upstream.
        true
    }

    fn max_duration_exceeded(&self) -> bool {
        self.started_at.elapsed().as_secs() >= self.policy.max_duration_secs as u64
    }
}

fn event_name(event: &ConversationEvent) -> String {
    serde_json::to_value(event)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl ConversationFSM for CallStateMachine {
    fn state(&self) -> CallState {
        self.state
    }

    async fn transition(&mut self, event: ConversationEvent) -> Result<Vec<FSMAction>, FSMError> {
        use CallState::*;
        use ConversationEvent::*;

        let state = self.state;
        let mut actions = Vec::new();

        let new_state = match (state, &event) {
            (Idle, CallAnswered { .. }) => {
                actions.push(FSMAction::EnableVad);
                actions.push(FSMAction::AppendCallLogEvent {
                    detail: "call answered".to_string(),
                });
                Listening
            }

            (Listening, AudioIn { .. }) => {
                self.metrics.chunks_in += 1;
                Listening
            }

            (Listening, SilenceDetected { duration_ms }) => {
                self.last_silence_duration_ms = *duration_ms;
                if self.silence_threshold_met() {
                    actions.push(FSMAction::DisableVad);
                    actions.push(FSMAction::StartThinkingTimeout);
                    actions.push(FSMAction::StartHedgeTimer);
                    actions.push(FSMAction::RunAnalyzerAndPrinciple);
                    Thinking
                } else {
                    Listening
                }
            }

            (Thinking, HedgeTimerFired) => {
                actions.push(FSMAction::PlayFiller);
                self.metrics.fillers_played += 1;
                self.recovery_filler_plays = 1;
                Recovery
            }

            (Thinking, ModelAudioOut) => {
                actions.push(FSMAction::CancelThinkingTimeout);
                actions.push(FSMAction::CancelHedgeTimer);
                actions.push(FSMAction::StopFiller);
                actions.push(FSMAction::EmitModelAudio);
                self.metrics.chunks_out += 1;
                Speaking
            }

            (Thinking, ThinkingTimeout) => {
                actions.push(FSMAction::CancelHedgeTimer);
                actions.push(FSMAction::PlayFiller);
                self.metrics.fillers_played += 1;
                self.recovery_filler_plays = 1;
                Recovery
            }

            (Speaking, ModelAudioOut) => {
                actions.push(FSMAction::EmitModelAudio);
                self.metrics.chunks_out += 1;
                Speaking
            }

            (Speaking, ModelTurnComplete) => {
                actions.push(FSMAction::EnableVad);
                actions.push(FSMAction::CommitTurn { interrupted: false });
                Listening
            }

            (Speaking, InterruptDetected) | (Recovery, InterruptDetected) => {
                if self.should_interrupt() {
                    actions.push(FSMAction::DrainOutboundAudio);
                    actions.push(FSMAction::EmitInterruptSignal);
                    actions.push(FSMAction::EnableVad);
                    actions.push(FSMAction::CommitTurn { interrupted: true });
                    self.metrics.interruptions += 1;
                    self.recovery_filler_plays = 0;
                    Listening
                } else {
                    state
                }
            }

            (Speaking, ModelInterrupted) => {
                actions.push(FSMAction::DrainOutboundAudio);
                actions.push(FSMAction::EnableVad);
                actions.push(FSMAction::CommitTurn { interrupted: true });
                self.metrics.interruptions += 1;
                Listening
            }

            (Recovery, ModelAudioOut) => {
                actions.push(FSMAction::CancelThinkingTimeout);
                actions.push(FSMAction::CancelHedgeTimer);
                actions.push(FSMAction::StopFiller);
                actions.push(FSMAction::EmitModelAudio);
                self.metrics.chunks_out += 1;
                self.recovery_filler_plays = 0;
                Speaking
            }

            (Recovery, FillerEnded) => {
                if self.recovery_filler_plays < MAX_RECOVERY_FILLER_PLAYS {
                    actions.push(FSMAction::PlayFiller);
                    self.metrics.fillers_played += 1;
                    self.recovery_filler_plays += 1;
                    Recovery
                } else {
                    actions.push(FSMAction::CancelThinkingTimeout);
                    actions.push(FSMAction::SpeakPromptToRepeat);
                    actions.push(FSMAction::CommitTurn { interrupted: false });
                    actions.push(FSMAction::EnableVad);
                    self.recovery_filler_plays = 0;
                    Listening
                }
            }

            (Recovery, ThinkingTimeout) => {
                // Hard 3 s ceiling overrides the filler ladder: give up now
                // rather than wait for the current filler to finish.
                actions.push(FSMAction::StopFiller);
                actions.push(FSMAction::SpeakPromptToRepeat);
                actions.push(FSMAction::CommitTurn { interrupted: false });
                actions.push(FSMAction::EnableVad);
                self.recovery_filler_plays = 0;
                Listening
            }

            (s, MaxDurationExceeded) if s != Ended => {
                actions.push(FSMAction::AppendCallLogEvent {
                    detail: "max duration exceeded".to_string(),
                });
                actions.push(FSMAction::PersistCallRecord);
                actions.push(FSMAction::CloseModelSession);
                actions.push(FSMAction::CloseCarrier);
                if s == CallEnding {
                    Ended
                } else {
                    CallEnding
                }
            }

            (s, Hangup) if s != Ended => {
                actions.push(FSMAction::PersistCallRecord);
                actions.push(FSMAction::CloseModelSession);
                actions.push(FSMAction::CloseCarrier);
                if s == CallEnding {
                    Ended
                } else {
                    CallEnding
                }
            }

            (s, CarrierClosed) if s != Ended => {
                actions.push(FSMAction::PersistCallRecord);
                actions.push(FSMAction::CloseModelSession);
                if s == CallEnding {
                    Ended
                } else {
                    CallEnding
                }
            }

            (s, FatalModelError { detail }) if s != Ended => {
                actions.push(FSMAction::AppendCallLogEvent { detail: detail.clone() });
                actions.push(FSMAction::SpeakApology);
                actions.push(FSMAction::PersistCallRecord);
                actions.push(FSMAction::CloseModelSession);
                actions.push(FSMAction::CloseCarrier);
                if s == CallEnding {
                    Ended
                } else {
                    CallEnding
                }
            }

            (CallEnding, _) => Ended,

            _ => {
                return Err(FSMError::InvalidTransition {
                    from: state,
                    event: event_name(&event),
                })
            }
        };

        if new_state != state {
            self.metrics.state_changes += 1;
        }
        self.state = new_state;
        Ok(actions)
    }

    fn can_transition(&self, event: &ConversationEvent) -> bool {
        use CallState::*;
        use ConversationEvent::*;
        matches!(
            (self.state, event),
            (Idle, CallAnswered { .. })
                | (Listening, AudioIn { .. })
                | (Listening, SilenceDetected { .. })
                | (Thinking, HedgeTimerFired)
                | (Thinking, ModelAudioOut)
                | (Thinking, ThinkingTimeout)
                | (Speaking, ModelAudioOut)
                | (Speaking, ModelTurnComplete)
                | (Speaking, InterruptDetected)
                | (Recovery, InterruptDetected)
                | (Speaking, ModelInterrupted)
                | (Recovery, ModelAudioOut)
                | (Recovery, FillerEnded)
                | (Recovery, ThinkingTimeout)
        ) || (self.state != Ended
            && matches!(event, MaxDurationExceeded | Hangup | CarrierClosed | FatalModelError { .. }))
            || self.state == CallEnding
    }

    fn checkpoint(&mut self) -> FSMCheckpoint {
        let checkpoint = FSMCheckpoint {
            index: self.checkpoints.len(),
            state: self.state,
            context: self.context.clone(),
            timestamp_ms: now_ms(),
        };
        self.checkpoints.push(checkpoint.clone());
        checkpoint
    }

    fn restore(&mut self, checkpoint_index: usize) -> Result<(), FSMError> {
        let checkpoint = self
            .checkpoints
            .get(checkpoint_index)
            .ok_or(FSMError::NoCheckpoint(checkpoint_index))?;
        self.state = checkpoint.state;
        self.context = checkpoint.context.clone();
        Ok(())
    }

    fn checkpoints(&self) -> &[FSMCheckpoint] {
        &self.checkpoints
    }

    fn get_context(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    fn set_context(&mut self, key: &str, value: Value) {
        self.context.insert(key.to_string(), value);
    }

    fn metrics(&self) -> FSMMetrics {
        self.metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CallPolicy {
        CallPolicy {
            max_duration_secs: 600,
            end_on_silence_secs: 30,
            silence_energy_threshold: 20.0,
        }
    }

    #[tokio::test]
    async fn call_answered_moves_idle_to_listening() {
        let mut fsm = CallStateMachine::new(policy());
        let actions = fsm
            .transition(ConversationEvent::CallAnswered { stream_id: None })
            .await
            .unwrap();
        assert_eq!(fsm.state(), CallState::Listening);
        assert!(actions.iter().any(|a| matches!(a, FSMAction::EnableVad)));
    }

    #[tokio::test]
    async fn silence_below_debounce_does_not_transition() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 100 }).await.unwrap();
        assert_eq!(fsm.state(), CallState::Listening);
    }

    #[tokio::test]
    async fn full_turn_cycle_reaches_speaking_then_listening() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 600 }).await.unwrap();
        assert_eq!(fsm.state(), CallState::Thinking);
        fsm.transition(ConversationEvent::ModelAudioOut).await.unwrap();
        assert_eq!(fsm.state(), CallState::Speaking);
        fsm.transition(ConversationEvent::ModelTurnComplete).await.unwrap();
        assert_eq!(fsm.state(), CallState::Listening);
    }

    #[tokio::test]
    async fn thinking_timeout_enters_recovery_and_plays_a_filler() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 600 }).await.unwrap();
        let actions = fsm.transition(ConversationEvent::ThinkingTimeout).await.unwrap();
        assert_eq!(fsm.state(), CallState::Recovery);
        assert!(actions.iter().any(|a| matches!(a, FSMAction::PlayFiller)));
    }

    #[tokio::test]
    async fn recovery_escalates_two_fillers_before_prompt_to_repeat() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 600 }).await.unwrap();
        fsm.transition(ConversationEvent::ThinkingTimeout).await.unwrap();
        assert_eq!(fsm.state(), CallState::Recovery);

        let actions = fsm.transition(ConversationEvent::FillerEnded).await.unwrap();
        assert_eq!(fsm.state(), CallState::Recovery, "still no audio after first filler, try a second");
        assert!(actions.iter().any(|a| matches!(a, FSMAction::PlayFiller)));
        assert!(!actions.iter().any(|a| matches!(a, FSMAction::SpeakPromptToRepeat)));

        let actions = fsm.transition(ConversationEvent::FillerEnded).await.unwrap();
        assert_eq!(fsm.state(), CallState::Listening);
        assert!(actions.iter().any(|a| matches!(a, FSMAction::SpeakPromptToRepeat)));
        assert!(actions.iter().any(|a| matches!(a, FSMAction::CommitTurn { interrupted: false })));
        assert_eq!(fsm.metrics().fillers_played, 2);
    }

    #[tokio::test]
    async fn recovery_audio_arriving_after_filler_stops_it_and_speaks() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 600 }).await.unwrap();
        fsm.transition(ConversationEvent::HedgeTimerFired).await.unwrap();
        assert_eq!(fsm.state(), CallState::Recovery);

        let actions = fsm.transition(ConversationEvent::ModelAudioOut).await.unwrap();
        assert_eq!(fsm.state(), CallState::Speaking);
        assert!(actions.iter().any(|a| matches!(a, FSMAction::StopFiller)));
    }

    #[tokio::test]
    async fn interrupt_during_speaking_returns_to_listening_and_counts() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 600 }).await.unwrap();
        fsm.transition(ConversationEvent::ModelAudioOut).await.unwrap();
        fsm.transition(ConversationEvent::InterruptDetected).await.unwrap();
        assert_eq!(fsm.state(), CallState::Listening);
        assert_eq!(fsm.metrics().interruptions, 1);
    }

    #[tokio::test]
    async fn hangup_from_any_state_reaches_call_ending_then_ended() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        fsm.transition(ConversationEvent::Hangup).await.unwrap();
        assert_eq!(fsm.state(), CallState::CallEnding);
        fsm.transition(ConversationEvent::Hangup).await.unwrap();
        assert_eq!(fsm.state(), CallState::Ended);
    }

    #[tokio::test]
    async fn unhandled_event_in_idle_is_invalid_transition() {
        let mut fsm = CallStateMachine::new(policy());
        let result = fsm.transition(ConversationEvent::ModelAudioOut).await;
        assert!(matches!(result, Err(FSMError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn hedge_fires_and_enters_recovery_playing_a_filler() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        fsm.transition(ConversationEvent::SilenceDetected { duration_ms: 600 }).await.unwrap();
        let actions = fsm.transition(ConversationEvent::HedgeTimerFired).await.unwrap();
        assert_eq!(fsm.state(), CallState::Recovery);
        assert!(actions.iter().any(|a| matches!(a, FSMAction::PlayFiller)));
        assert_eq!(fsm.metrics().fillers_played, 1);
    }

    #[tokio::test]
    async fn max_duration_from_listening_tears_down_through_call_ending() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        let actions = fsm.transition(ConversationEvent::MaxDurationExceeded).await.unwrap();
        assert_eq!(fsm.state(), CallState::CallEnding);
        assert!(actions.iter().any(|a| matches!(a, FSMAction::PersistCallRecord)));
        fsm.transition(ConversationEvent::MaxDurationExceeded).await.unwrap();
        assert_eq!(fsm.state(), CallState::Ended);
    }

    #[tokio::test]
    async fn checkpoint_and_restore_round_trip() {
        let mut fsm = CallStateMachine::new(policy());
        fsm.transition(ConversationEvent::CallAnswered { stream_id: None }).await.unwrap();
        fsm.set_context("turn_count", serde_json::json!(1));
        let checkpoint = fsm.checkpoint();
        fsm.transition(ConversationEvent::Hangup).await.unwrap();
        assert_eq!(fsm.state(), CallState::CallEnding);
        fsm.restore(checkpoint.index).unwrap();
        assert_eq!(fsm.state(), CallState::Listening);
        assert_eq!(fsm.get_context("turn_count"), Some(&serde_json::json!(1)));
    }
}
