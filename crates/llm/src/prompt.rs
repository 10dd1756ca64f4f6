//! Prompt Builder: assembles the call's single system instruction from
//! agent configuration, knowledge, the initial principle, and the detected
//! lead name (spec §4.8). Executed once, before `Connect`.

use voice_agent_config::constants::prompt::MAX_PAYLOAD_CHARS;
use voice_agent_core::{AgentConfig, Language, Objection, Principle, Stage};

/// Builds the nine labeled sections of the system instruction. One builder
/// per call; consumed once via `build()`.
pub struct PromptBuilder<'a> {
    agent: &'a AgentConfig,
    principle: Option<Principle>,
    stage: Stage,
    objections: Vec<Objection>,
    lead_first_name: Option<String>,
    lead_last_name: Option<String>,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(agent: &'a AgentConfig) -> Self {
        Self {
            agent,
            principle: None,
            stage: Stage::Awareness,
            objections: Vec::new(),
            lead_first_name: None,
            lead_last_name: None,
        }
    }

    pub fn with_principle(mut self, principle: Principle) -> Self {
        self.principle = Some(principle);
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_objections(mut self, objections: Vec<Objection>) -> Self {
        self.objections = objections;
        self
    }

    pub fn with_lead_name(mut self, first: Option<String>, last: Option<String>) -> Self {
        self.lead_first_name = first;
        self.lead_last_name = last;
        self
    }

    fn core_identity(&self) -> String {
        let identity = &self.agent.identity;
        format!(
            "1. CORE IDENTITY\nYou are {}, a {} for {} in the {} industry. Persona: {}.",
            identity.display_name, identity.role, identity.target_audience, identity.industry, identity.persona
        )
    }

    fn voice_personality(&self) -> String {
        let voice = &self.agent.voice;
        format!(
            "2. VOICE & PERSONALITY\nSpeak in a {:?} tone with an emotional warmth of {:.1} out of 1.0. \
             Pace speed is {:.2}x and pitch is {:.2}x baseline, with pauses of roughly {} ms between \
             thoughts. Clarity level: {:?}. {}",
            voice.tone,
            voice.emotion,
            voice.speed,
            voice.pitch,
            voice.pause_ms,
            voice.clarity,
            self.agent.background_noise.steering_clause(),
        )
    }

    fn knowledge_base(&self, budget_chars: usize) -> String {
        let mut body = String::from("3. KNOWLEDGE BASE\n");
        let mut used = 0usize;
        let mut truncated = false;

        for (i, doc) in self.agent.knowledge.iter().enumerate() {
            let entry = format!("{}. {}: {}\n", i + 1, doc.title, doc.text);
            if used + entry.len() > budget_chars {
                let remaining = budget_chars.saturating_sub(used);
                if remaining > 0 {
                    let cut = floor_char_boundary(&entry, remaining);
                    body.push_str(&entry[..cut]);
                }
                truncated = true;
                break;
            }
            body.push_str(&entry);
            used += entry.len();
        }

        if truncated {
            tracing::warn!(
                agent_id = %self.agent.id,
                budget_chars,
                "knowledge base truncated to fit the system instruction character budget"
            );
        }

        body
    }

    fn principle_guidance(&self) -> String {
        match self.principle {
            Some(principle) => format!(
                "4. PRINCIPLE GUIDANCE\n{}",
                principle_pattern(principle)
            ),
            None => "4. PRINCIPLE GUIDANCE\nNo principle selected yet; lead with rapport-building.".to_string(),
        }
    }

    fn stage_guidance(&self) -> String {
        format!("5. STAGE GUIDANCE\n{}", stage_guidance_text(self.stage))
    }

    fn objection_handling(&self) -> String {
        if self.objections.is_empty() {
            return "6. OBJECTION HANDLING\nNo objections raised yet.".to_string();
        }
        let lines: Vec<String> = self
            .objections
            .iter()
            .map(|o| format!("- {}: {}", format!("{o:?}").to_uppercase(), objection_strategy(*o)))
            .collect();
        format!("6. OBJECTION HANDLING\n{}", lines.join("\n"))
    }

    fn language_culture(&self) -> String {
        let salutation = match (&self.lead_first_name, &self.lead_last_name) {
            (Some(first), last) => salutation(self.agent.language, first, last.as_deref()),
            (None, _) => "the caller".to_string(),
        };
        format!(
            "7. LANGUAGE & CULTURE\nConverse in {:?}. Address the lead as \"{}\". \
             Code-switch naturally only if the lead does so first; never force a language switch.",
            self.agent.language, salutation
        )
    }

    fn quality_guidelines(&self) -> String {
        let policy = &self.agent.speech_policy;
        format!(
            "8. QUALITY GUIDELINES\nKeep responses {:?}. Ask clarifying questions at roughly {}% \
             frequency. Use natural turn-taking cues and leave room for the lead to respond.",
            policy.response_length, policy.question_frequency
        )
    }

    fn critical_rules(&self) -> &'static str {
        "9. CRITICAL RULES\nNever invent facts not present in the knowledge base. \
         Acknowledge uncertainty plainly rather than guessing. If the call must end without \
         resolution, hand off gracefully and say so explicitly."
    }

    /// Assemble the full system instruction, truncating only the Knowledge
    /// Base section so every other labeled section survives intact.
    pub fn build(&self) -> String {
        let identity = self.core_identity();
        let voice = self.voice_personality();
        let principle = self.principle_guidance();
        let stage = self.stage_guidance();
        let objections = self.objection_handling();
        let language = self.language_culture();
        let quality = self.quality_guidelines();
        let rules = self.critical_rules();

        let fixed_len = identity.len()
            + voice.len()
            + principle.len()
            + stage.len()
            + objections.len()
            + language.len()
            + quality.len()
            + rules.len()
            + 8 * "\n\n".len();

        let knowledge_budget = MAX_PAYLOAD_CHARS.saturating_sub(fixed_len);
        let knowledge = self.knowledge_base(knowledge_budget);

        [
            identity, voice, knowledge, principle, stage, objections, language, quality,
            rules.to_string(),
        ]
        .join("\n\n")
    }
}

/// Floor the given byte offset down to the nearest UTF-8 character boundary.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Localized salutation rule (spec §4.8, §8 boundary behaviors).
pub fn salutation(language: Language, first_name: &str, last_name: Option<&str>) -> String {
    if language.uses_ji_salutation() {
        return format!("{first_name} Ji");
    }
    match last_name {
        Some(last) if !last.is_empty() => format!("Mr. {last}"),
        _ => first_name.to_string(),
    }
}

fn principle_pattern(principle: Principle) -> &'static str {
    match principle {
        Principle::Reciprocity => {
            "Offer something of value first (an insight, a quick win) before asking for commitment."
        }
        Principle::Commitment => {
            "Invite a small, consistent commitment and reference it when proposing the next step."
        }
        Principle::SocialProof => {
            "Reference how similar customers have succeeded with this offering."
        }
        Principle::Authority => {
            "Establish credibility with specific, verifiable expertise or credentials."
        }
        Principle::Liking => {
            "Build rapport through genuine common ground before advancing the conversation."
        }
        Principle::Scarcity => {
            "Note genuine time- or availability-limited aspects of the offer, never fabricated urgency."
        }
    }
}

fn stage_guidance_text(stage: Stage) -> &'static str {
    match stage {
        Stage::Awareness => {
            "The lead is still learning what this is. Focus on clear, simple explanations and curiosity-building questions."
        }
        Stage::Consideration => {
            "The lead is comparing options. Address specific features, differentiators, and concerns directly."
        }
        Stage::Decision => {
            "The lead is close to deciding. Be direct about next steps and make committing easy."
        }
    }
}

fn objection_strategy(objection: Objection) -> &'static str {
    match objection {
        Objection::Price => "Reframe around value and total cost of ownership, not sticker price.",
        Objection::Quality => "Cite concrete evidence and offer a low-risk way to verify quality.",
        Objection::Trust => "Slow down, acknowledge the concern directly, and offer verifiable proof points.",
        Objection::Timing => "Clarify what changes if they wait, without manufacturing pressure.",
        Objection::Need => "Reconnect the offering to a need the lead has already stated in their own words.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_core::model::*;

    fn test_agent(language: Language) -> AgentConfig {
        AgentConfig {
            id: "agent-1".into(),
            identity: AgentIdentity {
                display_name: "Aria".into(),
                role: "sales consultant".into(),
                persona: "warm and direct".into(),
                target_audience: "small business owners".into(),
                industry: "fintech".into(),
            },
            language,
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
            knowledge: vec![],
            call_policy: CallPolicy {
                max_duration_secs: 600,
                end_on_silence_secs: 30,
                silence_energy_threshold: 20.0,
            },
            plan_tier: PlanTier::Standard,
        }
    }

    #[test]
    fn salutation_hinglish_uses_ji() {
        assert_eq!(salutation(Language::Hinglish, "John", None), "John Ji");
    }

    #[test]
    fn salutation_english_with_last_name() {
        assert_eq!(salutation(Language::English, "John", Some("Smith")), "Mr. Smith");
    }

    #[test]
    fn salutation_english_without_last_name_falls_back_to_first() {
        assert_eq!(salutation(Language::English, "John", None), "John");
    }

    #[test]
    fn build_contains_all_nine_sections() {
        let agent = test_agent(Language::English);
        let prompt = PromptBuilder::new(&agent)
            .with_stage(Stage::Consideration)
            .with_principle(Principle::Liking)
            .with_objections(vec![Objection::Price])
            .with_lead_name(Some("Jane".into()), Some("Doe".into()))
            .build();

        for marker in [
            "1. CORE IDENTITY",
            "2. VOICE & PERSONALITY",
            "3. KNOWLEDGE BASE",
            "4. PRINCIPLE GUIDANCE",
            "5. STAGE GUIDANCE",
            "6. OBJECTION HANDLING",
            "7. LANGUAGE & CULTURE",
            "8. QUALITY GUIDELINES",
            "9. CRITICAL RULES",
        ] {
            assert!(prompt.contains(marker), "missing section: {marker}");
        }
        assert!(prompt.contains("Mr. Doe"));
    }

    #[test]
    fn oversize_knowledge_is_truncated_to_budget() {
        let mut agent = test_agent(Language::English);
        agent.knowledge = vec![KnowledgeDocument {
            title: "Overview".into(),
            text: "x".repeat(45_000),
        }];
        let prompt = PromptBuilder::new(&agent).build();
        assert!(prompt.len() <= MAX_PAYLOAD_CHARS);
        assert!(prompt.contains("9. CRITICAL RULES"));
    }
}
