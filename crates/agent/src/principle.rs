//! Principle Engine: selects which of the six psychological principles
//! (spec §4.6) should guide the agent's next response, filtered by stage,
//! profile, and active objections, with a recency window so the same
//! principle is not reused back-to-back.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use voice_agent_core::{Objection, Principle, Profile, Stage};

/// How many of the most recently used principles are excluded from
/// reselection for a given call, before falling back to the full set.
const RECENCY_WINDOW: usize = 2;

#[derive(Debug, Clone)]
pub struct PrincipleSelection {
    pub principle: Principle,
    pub reasoning: String,
}

#[derive(Default)]
struct CallState {
    recent: VecDeque<Principle>,
    round_robin_cursor: usize,
}

/// One engine per process; per-call recency windows are keyed by call id.
#[derive(Default)]
pub struct PrincipleEngine {
    calls: Mutex<HashMap<String, CallState>>,
}

impl PrincipleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(
        &self,
        call_id: &str,
        stage: Stage,
        profile: Profile,
        objections: &HashSet<Objection>,
    ) -> PrincipleSelection {
        let mut eligible: Vec<Principle> = Principle::ALL
            .into_iter()
            .filter(|p| is_applicable(*p, stage, profile, objections))
            .collect();
        if eligible.is_empty() {
            eligible = Principle::ALL.to_vec();
        }

        let mut guard = self.calls.lock();
        let state = guard.entry(call_id.to_string()).or_default();

        let mut candidates: Vec<Principle> = eligible
            .iter()
            .copied()
            .filter(|p| !state.recent.contains(p))
            .collect();
        if candidates.is_empty() {
            candidates = eligible.clone();
        }
        candidates.sort_by_key(|p| *p as u8);

        let chosen = candidates[state.round_robin_cursor % candidates.len()];
        state.round_robin_cursor = state.round_robin_cursor.wrapping_add(1);

        state.recent.push_back(chosen);
        if state.recent.len() > RECENCY_WINDOW {
            state.recent.pop_front();
        }

        PrincipleSelection {
            principle: chosen,
            reasoning: reasoning_for(chosen, stage, profile, objections),
        }
    }

    pub fn forget(&self, call_id: &str) {
        self.calls.lock().remove(call_id);
    }
}

fn is_applicable(principle: Principle, stage: Stage, profile: Profile, objections: &HashSet<Objection>) -> bool {
    match principle {
        Principle::Reciprocity => {
            matches!(stage, Stage::Awareness | Stage::Consideration)
                && (profile == Profile::Emotional
                    || profile == Profile::RelationshipSeeker
                    || objections.contains(&Objection::Need))
        }
        Principle::Commitment => {
            matches!(stage, Stage::Consideration | Stage::Decision)
                && (profile == Profile::DecisionMaker || profile == Profile::Analytical)
        }
        Principle::SocialProof => {
            matches!(stage, Stage::Awareness | Stage::Consideration)
                && (objections.contains(&Objection::Trust)
                    || objections.contains(&Objection::Quality)
                    || profile == Profile::Skeptical)
        }
        Principle::Authority => {
            objections.contains(&Objection::Trust)
                || objections.contains(&Objection::Quality)
                || profile == Profile::Analytical
                || profile == Profile::Skeptical
        }
        Principle::Liking => profile == Profile::RelationshipSeeker || profile == Profile::Emotional,
        Principle::Scarcity => {
            stage == Stage::Decision
                && (objections.contains(&Objection::Timing) || profile == Profile::DecisionMaker)
        }
    }
}

fn reasoning_for(principle: Principle, stage: Stage, profile: Profile, objections: &HashSet<Objection>) -> String {
    let objection_note = if objections.is_empty() {
        "no active objections".to_string()
    } else {
        format!("active objections: {:?}", objections)
    };
    format!(
        "{:?} selected for stage {:?}, profile {:?} ({})",
        principle, stage, profile, objection_note
    )
}
