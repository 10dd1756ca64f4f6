//! Carrier adapter: translates between the core's canonical 16 kHz mono PCM
//! representation and the two supported carrier wire formats.

pub mod browser;
pub mod error;
pub mod telephony;

pub use error::TransportError;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// A raw frame as received from the carrier websocket, before any
/// format-specific decoding. Kept independent of any particular WebSocket
/// crate's `Message` type so this crate has no transport-library dependency.
#[derive(Debug, Clone)]
pub enum RawInbound {
    Json(String),
    Binary(Vec<u8>),
}

/// Canonical inbound event the carrier adapter hands to the call supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CarrierEvent {
    /// Telephony `answer` or a browser's first connection.
    CallAnswered {
        stream_id: Option<String>,
        channel_id: Option<String>,
        call_id: Option<String>,
    },
    /// Inbound audio, already resampled to 16 kHz mono.
    AudioIn {
        pcm16k: Vec<i16>,
        energy: Option<f32>,
    },
}

/// An outbound frame ready to write to the carrier socket.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub bytes: Vec<u8>,
    pub is_text: bool,
}

impl OutboundFrame {
    pub fn text(s: String) -> Self {
        Self {
            bytes: s.into_bytes(),
            is_text: true,
        }
    }
}

/// Outbound frame queue shared between the call supervisor and the
/// websocket writer task. A plain `mpsc` channel can't be cleared from the
/// sending side; this gives the supervisor direct access to drop
/// already-queued frames on interruption (spec §5) without the writer
/// task's cooperation.
#[derive(Clone)]
pub struct OutboundQueue {
    frames: Arc<Mutex<VecDeque<OutboundFrame>>>,
    notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enqueues a frame for the writer task.
    pub fn push(&self, frame: OutboundFrame) {
        self.frames.lock().unwrap().push_back(frame);
        self.notify.notify_one();
    }

    /// Discards every frame currently queued but not yet written to the
    /// wire.
    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }

    /// Marks the queue closed; a pending or future `recv` returns `None`
    /// once the backlog has drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Waits for and removes the next queued frame, or returns `None` once
    /// `close` has been called and nothing is left to drain.
    pub async fn recv(&self) -> Option<OutboundFrame> {
        loop {
            if let Some(frame) = self.frames.lock().unwrap().pop_front() {
                return Some(frame);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            self.notify.notified().await;
        }
    }
}

/// The carrier-specific adapter. One implementation per wire format
/// (`telephony::TelephonyCarrier`, `browser::BrowserCarrier`), dispatched by
/// the supervisor through a tagged `CarrierKind`, never by introspecting the
/// payload shape.
pub trait Carrier: Send {
    /// Called once when the underlying socket is accepted. Browser carriers
    /// answer immediately; telephony carriers wait for an explicit `answer`
    /// frame and return `None` here.
    fn on_connect(&mut self) -> Option<CarrierEvent> {
        None
    }

    /// Decode one raw frame into zero or one canonical event. Unknown
    /// events are logged by the caller and represented as `Ok(None)`.
    fn decode_frame(&mut self, raw: RawInbound) -> Result<Option<CarrierEvent>, TransportError>;

    /// Encode outbound model/filler audio (16 kHz mono PCM) into the
    /// carrier's expected envelope and rate.
    fn encode_audio_out(&self, pcm16k: &[i16]) -> OutboundFrame;

    /// Encode an interruption signal, if this carrier has one. Telephony
    /// has none — interruption is expressed by simply not emitting further
    /// `reverse-media` frames.
    fn encode_interrupt(&self) -> Option<OutboundFrame>;
}

/// Which wire format a call's carrier socket speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierKind {
    Telephony,
    Browser,
}

pub fn new_carrier(kind: CarrierKind) -> Box<dyn Carrier> {
    match kind {
        CarrierKind::Telephony => Box::new(telephony::TelephonyCarrier::new()),
        CarrierKind::Browser => Box::new(browser::BrowserCarrier::new()),
    }
}
