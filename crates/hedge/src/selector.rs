//! Hedge Selector: five-step graceful-degradation filler selection (spec
//! §4.7) — language, then principle, then profile, then variety, each
//! applied only if it leaves at least one candidate; effectiveness breaks
//! the final tie.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use voice_agent_core::{Filler, Language, Principle, Profile};

use crate::error::{HedgeError, Result};
use crate::index::FillerIndex;

/// How many of a call's most recently played fillers are excluded from
/// reselection by the variety step, before falling back.
const VARIETY_WINDOW: usize = 3;

#[derive(Default)]
struct CallState {
    recent: VecDeque<String>,
}

pub struct HedgeSelector {
    index: FillerIndex,
    calls: Mutex<HashMap<String, CallState>>,
}

impl HedgeSelector {
    pub fn new(index: FillerIndex) -> Self {
        Self {
            index,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// The backing filler index, for callers that need to load audio for a
    /// `Filler` this selector returned.
    pub fn index(&self) -> &FillerIndex {
        &self.index
    }

    /// Selects a filler for one hedge opportunity, narrowing by language,
    /// principle, profile, and recent-use variety in turn — each filter is
    /// applied only when it leaves at least one survivor, so an unmatched
    /// dimension degrades gracefully instead of returning nothing.
    pub fn select(
        &self,
        call_id: &str,
        language: Language,
        principle: Option<Principle>,
        profile: Profile,
    ) -> Result<Filler> {
        if self.index.is_empty() {
            return Err(HedgeError::EmptyIndex);
        }

        let mut candidates: Vec<&Filler> = self.index.all().iter().collect();

        candidates = narrow(candidates, |f| f.languages.contains(&language));

        if let Some(principle) = principle {
            candidates = narrow(candidates, |f| f.principles.contains(&principle));
        }

        candidates = narrow(candidates, |f| f.profiles.contains(&profile));

        let mut guard = self.calls.lock();
        let state = guard.entry(call_id.to_string()).or_default();
        candidates = narrow(candidates, |f| !state.recent.contains(&f.id));

        let chosen = candidates
            .into_iter()
            .max_by(|a, b| {
                a.effectiveness
                    .score()
                    .partial_cmp(&b.effectiveness.score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
            .ok_or(HedgeError::EmptyIndex)?;

        state.recent.push_back(chosen.id.clone());
        if state.recent.len() > VARIETY_WINDOW {
            state.recent.pop_front();
        }

        Ok(chosen)
    }

    pub fn forget(&self, call_id: &str) {
        self.calls.lock().remove(call_id);
    }
}

fn narrow<'a>(candidates: Vec<&'a Filler>, predicate: impl Fn(&&Filler) -> bool) -> Vec<&'a Filler> {
    let narrowed: Vec<&Filler> = candidates.iter().copied().filter(predicate).collect();
    if narrowed.is_empty() {
        candidates
    } else {
        narrowed
    }
}
