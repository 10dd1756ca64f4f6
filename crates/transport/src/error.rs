use thiserror::Error;
use voice_agent_core::AudioCodecError;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// Missing `streamId`/`channelId`/`callId` after `answer`, or any other
    /// structurally-broken carrier handshake. Terminal for the call.
    #[error("carrier protocol error: {0}")]
    CarrierProtocol(String),

    /// A bad audio frame (odd length, bad base64). The frame is dropped and
    /// a counter incremented; this never escalates to a terminal error.
    #[error(transparent)]
    BadFrame(#[from] AudioCodecError),

    /// A JSON frame with an `event`/`type` the adapter does not recognize.
    /// Logged and dropped, not terminal.
    #[error("unknown carrier event/type: {0}")]
    UnknownEvent(String),
}
