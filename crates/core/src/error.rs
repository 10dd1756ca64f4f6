//! Crate-wide error taxonomy (spec §7): transport, protocol, timeout,
//! resource, audio, and fatal kinds. Reader/writer tasks never interpret
//! these; only the call supervisor matches on them to decide retry,
//! degrade, or terminate.

use thiserror::Error;

pub use crate::audio::AudioCodecError;

#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Carrier or model socket failure. Recoverable where the model
    /// reconnect policy applies; otherwise terminal for the call.
    #[error("transport error: {0}")]
    Transport(String),

    /// Unexpected or missing event fields. Terminal for the call.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No `setupComplete` within the configured bound.
    #[error("model setup timed out")]
    SetupTimeout,

    /// No model audio within the configured LLM-thinking bound.
    #[error("model thinking timed out")]
    LLMThinkingTimeout,

    /// Call policy max duration exceeded.
    #[error("call exceeded max duration")]
    MaxDurationExceeded,

    /// System instruction + knowledge payload exceeded the hard ceiling.
    #[error("payload too large: {0} chars")]
    PayloadTooLarge(usize),

    /// Cache creation/refresh failed; caller degrades to inline instruction.
    #[error("cache operation failed: {0}")]
    CacheUnavailable(String),

    /// Bad audio frame; the frame is dropped and a counter incremented.
    #[error(transparent)]
    Audio(#[from] AudioCodecError),

    /// Reconnect attempts exhausted, or an unrecoverable model `error` was
    /// received, or the carrier closed in a non-terminal call state.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
