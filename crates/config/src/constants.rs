//! Centralized constants for the voice agent.
//!
//! Values here are the generic operational parameters named throughout the
//! spec — timeouts, reconnect backoff, audio defaults, cache/prompt budgets.
//! Anything agent- or campaign-specific lives in `AgentConfig`, not here.

/// Timeouts and budgets for the model session and call state machine.
pub mod timeouts {
    /// Bound on waiting for `setupComplete` after `Connect` (spec §4.3).
    pub const MODEL_SETUP_SECS: u64 = 10;

    /// LLM-thinking timeout in THINKING before falling back to RECOVERY (spec §4.9).
    pub const LLM_THINKING_SECS: u64 = 3;

    /// Silence gap after which the hedge filler starts streaming (spec §4.7).
    pub const HEDGE_SILENCE_MS: u64 = 400;

    /// Sustained inbound RMS duration that triggers an interruption (spec §4.9).
    pub const INTERRUPT_SUSTAIN_MS: u64 = 300;

    /// Hot-path budget from `shouldInterrupt` firing to LISTENING (spec §5, §8).
    pub const INTERRUPT_BUDGET_MS: u64 = 50;

    /// Cooperative task teardown deadline before a forced teardown (spec §5).
    pub const TASK_TEARDOWN_MS: u64 = 200;

    /// Hard teardown deadline (spec §5).
    pub const HARD_TEARDOWN_SECS: u64 = 2;
}

/// Model session reconnect policy (spec §4.3).
pub mod reconnect {
    /// Exponential backoff in seconds, one entry per attempt.
    pub const BACKOFF_SECS: [u64; 3] = [1, 2, 4];

    /// Maximum reconnect attempts per call (spec §8 invariant 9).
    pub const MAX_ATTEMPTS: usize = 3;
}

/// Context cache manager constants (spec §4.4).
pub mod cache {
    /// TTL applied on create and on every `RefreshTTL` (seconds).
    pub const TTL_SECS: u64 = 3600;

    /// Approximate minimum token count the model requires for a cache entry
    /// to be eligible; below this, `GetOrCreate` returns `None`.
    pub const MIN_TOKENS: usize = 32_768;
}

/// Prompt builder / model-session payload budget (spec §4.3, §4.8).
pub mod prompt {
    /// Hard ceiling on the full system-instruction payload, in characters.
    pub const MAX_PAYLOAD_CHARS: usize = 20_000;
}

/// Audio processing defaults (spec §4.1, §3).
pub mod audio {
    /// The core's canonical internal/inbound sample rate (Hz).
    pub const CANONICAL_SAMPLE_RATE: u32 = 16000;

    /// Default voice-activity RMS threshold on the -32768..32767 scale.
    pub const DEFAULT_VAD_THRESHOLD: f32 = 20.0;

    /// PCM16 normalization divisor, for callers that need float PCM.
    pub const PCM16_NORMALIZE: f32 = 32768.0;

    /// PCM16 scaling multiplier, for callers that need float PCM.
    pub const PCM16_SCALE: f32 = 32767.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_backoff_matches_policy() {
        assert_eq!(reconnect::BACKOFF_SECS, [1, 2, 4]);
        assert_eq!(reconnect::BACKOFF_SECS.len(), reconnect::MAX_ATTEMPTS);
    }

    #[test]
    fn cache_ttl_is_one_hour() {
        assert_eq!(cache::TTL_SECS, 3600);
    }

    #[test]
    fn prompt_budget_matches_spec() {
        assert_eq!(prompt::MAX_PAYLOAD_CHARS, 20_000);
    }

    #[test]
    fn timeout_constants_positive() {
        assert!(timeouts::MODEL_SETUP_SECS > 0);
        assert!(timeouts::LLM_THINKING_SECS > 0);
        assert!(timeouts::HEDGE_SILENCE_MS > 0);
    }
}
