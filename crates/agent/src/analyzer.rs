//! Conversation Analyzer: classifies stage, profile, objections, language,
//! and sentiment from the lead's running transcript (spec §4.5). Heuristic
//! and lexicon-based — no ML/NLP model, per the spec's explicit non-goal.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use unicode_segmentation::UnicodeSegmentation;

use voice_agent_core::{Language, Objection, Profile, Stage};

/// Turns of hysteresis required before the sticky stage advances, so a
/// single off-hand remark doesn't flip the funnel stage back and forth.
const STAGE_HYSTERESIS_TURNS: usize = 2;

#[derive(Debug, Clone)]
pub struct AnalyzerResult {
    pub stage: Stage,
    pub profile: Profile,
    pub objections: HashSet<Objection>,
    pub language: Language,
    /// 0.0 (very negative) to 1.0 (very positive); 0.5 is neutral.
    pub sentiment: f32,
}

#[derive(Debug, Default)]
struct StickyState {
    stage: Option<Stage>,
    pending_stage: Option<Stage>,
    pending_stage_votes: usize,
    profile_votes: HashMap<Profile, u32>,
}

/// One analyzer per process; sticky state is keyed by call id so concurrent
/// calls never share hysteresis counters.
#[derive(Default)]
pub struct ConversationAnalyzer {
    sticky: Mutex<HashMap<String, StickyState>>,
}

impl ConversationAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies one user transcript in the context of `call_id`'s running
    /// history. Call-scoped state means the first turn of every call starts
    /// cold in Awareness with no sticky profile.
    pub fn analyze(&self, call_id: &str, transcript: &str) -> AnalyzerResult {
        let language = detect_language(transcript);
        let lowered = transcript.to_lowercase();

        let raw_stage = classify_stage(&lowered);
        let profile_votes = classify_profile_votes(&lowered);
        let objections = classify_objections(&lowered);
        let sentiment = score_sentiment(&lowered);

        let mut guard = self.sticky.lock();
        let state = guard.entry(call_id.to_string()).or_default();

        let stage = advance_stage(state, raw_stage);
        let profile = advance_profile(state, profile_votes);

        AnalyzerResult {
            stage,
            profile,
            objections,
            language,
            sentiment,
        }
    }

    pub fn forget(&self, call_id: &str) {
        self.sticky.lock().remove(call_id);
    }
}

/// Stage only ever advances (Awareness -> Consideration -> Decision) once
/// raw classification agrees for `STAGE_HYSTERESIS_TURNS` consecutive turns;
/// it never regresses mid-call.
fn advance_stage(state: &mut StickyState, raw_stage: Stage) -> Stage {
    let current = state.stage.unwrap_or(Stage::Awareness);
    if !is_forward(current, raw_stage) {
        state.pending_stage = None;
        state.pending_stage_votes = 0;
        return current;
    }

    if state.pending_stage == Some(raw_stage) {
        state.pending_stage_votes += 1;
    } else {
        state.pending_stage = Some(raw_stage);
        state.pending_stage_votes = 1;
    }

    if state.pending_stage_votes >= STAGE_HYSTERESIS_TURNS {
        state.stage = Some(raw_stage);
        state.pending_stage = None;
        state.pending_stage_votes = 0;
    }

    state.stage.unwrap_or(current)
}

fn is_forward(current: Stage, candidate: Stage) -> bool {
    stage_rank(candidate) >= stage_rank(current)
}

fn stage_rank(stage: Stage) -> u8 {
    match stage {
        Stage::Awareness => 0,
        Stage::Consideration => 1,
        Stage::Decision => 2,
    }
}

/// Profile is the plurality vote across the call so far, weighted toward
/// recent turns only by virtue of accumulating counts (spec leaves exact
/// weighting unspecified; a running tally is the simplest faithful model).
fn advance_profile(state: &mut StickyState, votes: Vec<Profile>) -> Profile {
    for profile in votes {
        *state.profile_votes.entry(profile).or_insert(0) += 1;
    }
    state
        .profile_votes
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(profile, _)| *profile)
        .unwrap_or(Profile::Analytical)
}

fn classify_stage(text: &str) -> Stage {
    const DECISION_MARKERS: &[&str] = &[
        "sign up", "sign me up", "let's proceed", "let's do it", "ready to start",
        "where do i pay", "send the contract", "i'm in", "let's go ahead",
    ];
    const CONSIDERATION_MARKERS: &[&str] = &[
        "compare", "versus", "vs ", "how much", "what's the difference", "pricing",
        "how does this compare", "other options", "competitor",
    ];

    if DECISION_MARKERS.iter().any(|m| text.contains(m)) {
        Stage::Decision
    } else if CONSIDERATION_MARKERS.iter().any(|m| text.contains(m)) {
        Stage::Consideration
    } else {
        Stage::Awareness
    }
}

fn classify_profile_votes(text: &str) -> Vec<Profile> {
    const ANALYTICAL: &[&str] = &["data", "statistics", "numbers", "roi", "metrics", "report"];
    const EMOTIONAL: &[&str] = &["feel", "worried", "excited", "love", "scared", "!"];
    const SKEPTICAL: &[&str] = &["not sure", "really?", "prove it", "sounds too good", "doubt"];
    const DECISION_MAKER: &[&str] = &["i decide", "i'm the owner", "my call", "i approve", "i'm in charge"];
    const RELATIONSHIP_SEEKER: &[&str] = &["how are you", "nice talking", "appreciate you", "thanks for calling"];

    let mut votes = Vec::new();
    if ANALYTICAL.iter().any(|m| text.contains(m)) {
        votes.push(Profile::Analytical);
    }
    if EMOTIONAL.iter().any(|m| text.contains(m)) {
        votes.push(Profile::Emotional);
    }
    if SKEPTICAL.iter().any(|m| text.contains(m)) {
        votes.push(Profile::Skeptical);
    }
    if DECISION_MAKER.iter().any(|m| text.contains(m)) {
        votes.push(Profile::DecisionMaker);
    }
    if RELATIONSHIP_SEEKER.iter().any(|m| text.contains(m)) {
        votes.push(Profile::RelationshipSeeker);
    }
    votes
}

fn classify_objections(text: &str) -> HashSet<Objection> {
    const PRICE: &[&str] = &["expensive", "cost too much", "can't afford", "too pricey", "budget"];
    const QUALITY: &[&str] = &["does it actually work", "is it reliable", "quality concern", "durable"];
    const TRUST: &[&str] = &["scam", "is this a scam", "trust", "guarantee", "legit"];
    const TIMING: &[&str] = &["not right now", "too busy", "call me later", "bad time", "next quarter"];
    const NEED: &[&str] = &["don't need", "already have", "not interested", "no use for this"];

    let mut objections = HashSet::new();
    if PRICE.iter().any(|m| text.contains(m)) {
        objections.insert(Objection::Price);
    }
    if QUALITY.iter().any(|m| text.contains(m)) {
        objections.insert(Objection::Quality);
    }
    if TRUST.iter().any(|m| text.contains(m)) {
        objections.insert(Objection::Trust);
    }
    if TIMING.iter().any(|m| text.contains(m)) {
        objections.insert(Objection::Timing);
    }
    if NEED.iter().any(|m| text.contains(m)) {
        objections.insert(Objection::Need);
    }
    objections
}

/// Lexicon-based sentiment in [0, 1], 0.5 neutral. A production model would
/// use a real classifier; this scores word overlap against small
/// positive/negative lexicons, which is sufficient for steering
/// principle/filler selection.
fn score_sentiment(text: &str) -> f32 {
    const POSITIVE: &[&str] = &["great", "love", "excited", "yes", "perfect", "awesome", "thank you"];
    const NEGATIVE: &[&str] = &["no", "not", "never", "hate", "annoyed", "frustrated", "stop"];

    let words: Vec<&str> = text.unicode_words().collect();
    if words.is_empty() {
        return 0.5;
    }

    let positive_hits = POSITIVE.iter().filter(|m| text.contains(*m)).count() as f32;
    let negative_hits = NEGATIVE.iter().filter(|m| text.contains(*m)).count() as f32;
    let total = positive_hits + negative_hits;
    if total == 0.0 {
        return 0.5;
    }
    let polarity = ((positive_hits - negative_hits) / total).clamp(-1.0, 1.0);
    (polarity + 1.0) / 2.0
}

/// Detects language from script and a small Hinglish marker lexicon.
/// Devanagari/Tamil/Telugu/Kannada script ranges identify the native-script
/// languages directly; Latin-script text with common transliterated Hindi
/// words is classified as Hinglish rather than plain English.
fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c)) {
        return if text.contains('\u{0933}') || text.contains("माझ्या") {
            Language::Marathi
        } else {
            Language::Hindi
        };
    }
    if text.chars().any(|c| ('\u{0B80}'..='\u{0BFF}').contains(&c)) {
        return Language::Tamil;
    }
    if text.chars().any(|c| ('\u{0C00}'..='\u{0C7F}').contains(&c)) {
        return Language::Telugu;
    }
    if text.chars().any(|c| ('\u{0C80}'..='\u{0CFF}').contains(&c)) {
        return Language::Kannada;
    }

    const HINGLISH_MARKERS: &[&str] = &["haan", "nahi", "kya", "theek hai", "bhai", "accha", "matlab"];
    let lowered = text.to_lowercase();
    if HINGLISH_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Language::Hinglish;
    }

    Language::English
}
