//! Model Session: the bidirectional streaming connection to the multimodal
//! model (spec §4.3). Owns exactly one writer; emits a stream of
//! [`ModelEvent`]s the call supervisor drives its state machine from.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use voice_agent_config::constants::{prompt::MAX_PAYLOAD_CHARS, reconnect, timeouts};
use voice_agent_core::{audio, Error, Result};

use crate::cache::is_valid_cache_handle;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection parameters for one call's model session. Exactly one of
/// `cached_content`/`system_instruction` must be set (spec §4.3).
#[derive(Debug, Clone)]
pub struct ModelSessionConfig {
    pub endpoint: String,
    pub model_id: String,
    pub cached_content: Option<String>,
    pub system_instruction: Option<String>,
}

/// Events the call supervisor reacts to. `AudioOut` carries 24 kHz PCM16 as
/// emitted by the model; callers resample to the 16 kHz canonical rate.
/// `Transcript` surfaces the model's live input/output transcription, used
/// to feed the conversation analyzer (no separate STT stage exists).
#[derive(Debug, Clone)]
pub enum ModelEvent {
    AudioOut(Vec<i16>),
    Transcript { role: TranscriptRole, text: String },
    TurnComplete,
    Interrupted,
    FatalError { detail: String },
    Closed { code: Option<u16>, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptRole {
    User,
    Model,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupMessage {
    setup: SetupBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetupBody {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    input_audio_transcription: EmptyObject,
    output_audio_transcription: EmptyObject,
}

/// Gemini Live `Content` shape: instructions are parts, not a bare string.
#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

/// Serializes as `{}`; the provider enables transcription on presence of
/// the key alone, per the live-session wire protocol.
#[derive(Debug, Serialize, Default)]
struct EmptyObject {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInputMessage {
    realtime_input: RealtimeInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput {
    media_chunks: Vec<MediaChunk>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaChunk {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    #[serde(default)]
    setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    server_content: Option<ServerContent>,
    #[serde(default)]
    error: Option<ServerErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    #[serde(default)]
    model_turn: Option<ModelTurn>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    input_transcription: Option<TranscriptionBody>,
    #[serde(default)]
    output_transcription: Option<TranscriptionBody>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionBody {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(rename = "inlineData", default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Debug, Deserialize)]
struct ServerErrorBody {
    message: String,
}

/// Handle to a running model session. Cloning is cheap; all clones share the
/// same underlying socket and writer task.
#[derive(Clone)]
pub struct ModelSession {
    audio_tx: mpsc::Sender<Vec<i16>>,
    close_tx: watch::Sender<bool>,
}

enum ConnectionOutcome {
    ClosedByUser,
    Disconnected { made_progress: bool },
    Fatal(String),
}

impl ModelSession {
    /// Dials the model, performs the `setup`/`setupComplete` handshake
    /// synchronously (bounded by `MODEL_SETUP_SECS`), then hands off to a
    /// background task that owns the socket and the reconnect loop.
    pub async fn connect(config: ModelSessionConfig) -> Result<(Self, mpsc::Receiver<ModelEvent>)> {
        let ws = Self::dial_and_setup(&config).await?;

        let (audio_tx, audio_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        let (close_tx, close_rx) = watch::channel(false);

        tokio::spawn(Self::drive(ws, config, audio_rx, event_tx, close_rx));

        Ok((Self { audio_tx, close_tx }, event_rx))
    }

    pub async fn send_audio(&self, pcm16k: &[i16]) -> Result<()> {
        self.audio_tx
            .send(pcm16k.to_vec())
            .await
            .map_err(|_| Error::Transport("model session writer closed".to_string()))
    }

    /// Idempotent; suppresses the background task's auto-reconnect.
    pub fn close(&self) {
        let _ = self.close_tx.send(true);
    }

    fn build_setup_message(config: &ModelSessionConfig) -> Result<String> {
        match (&config.cached_content, &config.system_instruction) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(Error::Protocol(
                    "setup requires exactly one of cachedContent or systemInstruction".to_string(),
                ));
            }
            _ => {}
        }
        if let Some(instruction) = &config.system_instruction {
            if instruction.len() > MAX_PAYLOAD_CHARS {
                return Err(Error::PayloadTooLarge(instruction.len()));
            }
        }
        if let Some(handle) = &config.cached_content {
            if !is_valid_cache_handle(handle) {
                return Err(Error::Protocol(format!("invalid cache handle: {handle}")));
            }
        }

        let body = SetupMessage {
            setup: SetupBody {
                model: config.model_id.clone(),
                cached_content: config.cached_content.clone(),
                system_instruction: config.system_instruction.as_ref().map(|text| SystemInstruction {
                    parts: vec![Part { text: text.clone() }],
                }),
                input_audio_transcription: EmptyObject::default(),
                output_audio_transcription: EmptyObject::default(),
            },
        };
        serde_json::to_string(&body).map_err(|e| Error::Protocol(e.to_string()))
    }

    fn build_audio_message(pcm16k: &[i16]) -> Result<String> {
        let message = RealtimeInputMessage {
            realtime_input: RealtimeInput {
                media_chunks: vec![MediaChunk {
                    mime_type: "audio/pcm;rate=16000",
                    data: audio::encode_pcm16_b64(pcm16k),
                }],
            },
        };
        serde_json::to_string(&message).map_err(|e| Error::Protocol(e.to_string()))
    }

    fn parse_server_message(text: &str) -> Result<Vec<ModelEvent>> {
        let message: ServerMessage = serde_json::from_str(text)
            .map_err(|e| Error::Protocol(format!("malformed server message: {e}")))?;

        if let Some(err) = message.error {
            return Err(Error::Fatal(err.message));
        }

        let mut events = Vec::new();
        if let Some(content) = message.server_content {
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    if let Some(inline) = part.inline_data {
                        let pcm24k = audio::decode_pcm16_b64(&inline.data)?;
                        events.push(ModelEvent::AudioOut(pcm24k));
                    }
                }
            }
            if let Some(transcription) = content.input_transcription {
                if !transcription.text.is_empty() {
                    events.push(ModelEvent::Transcript {
                        role: TranscriptRole::User,
                        text: transcription.text,
                    });
                }
            }
            if let Some(transcription) = content.output_transcription {
                if !transcription.text.is_empty() {
                    events.push(ModelEvent::Transcript {
                        role: TranscriptRole::Model,
                        text: transcription.text,
                    });
                }
            }
            if content.interrupted {
                events.push(ModelEvent::Interrupted);
            }
            if content.turn_complete {
                events.push(ModelEvent::TurnComplete);
            }
        }
        Ok(events)
    }

    /// Dial, send `setup`, and block until `setupComplete` or the setup
    /// timeout, per spec §4.3.
    async fn dial_and_setup(config: &ModelSessionConfig) -> Result<WsStream> {
        let (mut ws, _response) = connect_async(&config.endpoint)
            .await
            .map_err(|e| Error::Transport(format!("connect failed: {e}")))?;

        let setup_text = Self::build_setup_message(config)?;
        ws.send(WsMessage::Text(setup_text))
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let wait_for_setup = async {
            loop {
                match ws.next().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        let message: ServerMessage = serde_json::from_str(&text)
                            .map_err(|e| Error::Protocol(format!("malformed setup response: {e}")))?;
                        if message.setup_complete.is_some() {
                            return Ok(());
                        }
                        if let Some(err) = message.error {
                            return Err(Error::Fatal(err.message));
                        }
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(Error::Transport(e.to_string())),
                    None => return Err(Error::Transport("socket closed during setup".to_string())),
                }
            }
        };

        timeout(Duration::from_secs(timeouts::MODEL_SETUP_SECS), wait_for_setup)
            .await
            .map_err(|_| Error::SetupTimeout)??;

        Ok(ws)
    }

    async fn run_connection(
        ws: &mut WsStream,
        audio_rx: &mut mpsc::Receiver<Vec<i16>>,
        event_tx: &mpsc::Sender<ModelEvent>,
        close_rx: &mut watch::Receiver<bool>,
    ) -> ConnectionOutcome {
        let mut made_progress = false;
        loop {
            tokio::select! {
                changed = close_rx.changed() => {
                    if changed.is_err() {
                        return ConnectionOutcome::ClosedByUser;
                    }
                    if *close_rx.borrow() {
                        return ConnectionOutcome::ClosedByUser;
                    }
                }
                audio = audio_rx.recv() => {
                    match audio {
                        Some(pcm16k) => {
                            let text = match Self::build_audio_message(&pcm16k) {
                                Ok(t) => t,
                                Err(e) => return ConnectionOutcome::Fatal(e.to_string()),
                            };
                            if ws.send(WsMessage::Text(text)).await.is_err() {
                                return ConnectionOutcome::Disconnected { made_progress };
                            }
                        }
                        None => return ConnectionOutcome::ClosedByUser,
                    }
                }
                incoming = ws.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            made_progress = true;
                            match Self::parse_server_message(&text) {
                                Ok(events) => {
                                    for event in events {
                                        if event_tx.send(event).await.is_err() {
                                            return ConnectionOutcome::ClosedByUser;
                                        }
                                    }
                                }
                                Err(e) => return ConnectionOutcome::Fatal(e.to_string()),
                            }
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            let (code, reason) = match frame {
                                Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                                None => (None, String::new()),
                            };
                            let _ = event_tx.send(ModelEvent::Closed { code, reason }).await;
                            return ConnectionOutcome::Disconnected { made_progress };
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(_)) => return ConnectionOutcome::Disconnected { made_progress },
                        None => return ConnectionOutcome::Disconnected { made_progress },
                    }
                }
            }
        }
    }

    async fn drive(
        mut ws: WsStream,
        config: ModelSessionConfig,
        mut audio_rx: mpsc::Receiver<Vec<i16>>,
        event_tx: mpsc::Sender<ModelEvent>,
        mut close_rx: watch::Receiver<bool>,
    ) {
        let mut attempts = 0usize;
        loop {
            let outcome = Self::run_connection(&mut ws, &mut audio_rx, &event_tx, &mut close_rx).await;
            match outcome {
                ConnectionOutcome::ClosedByUser => {
                    let _ = ws.close(None).await;
                    return;
                }
                ConnectionOutcome::Fatal(detail) => {
                    let _ = event_tx.send(ModelEvent::FatalError { detail }).await;
                    return;
                }
                ConnectionOutcome::Disconnected { made_progress } => {
                    if made_progress {
                        attempts = 0;
                    }
                    attempts += 1;
                    if attempts > reconnect::MAX_ATTEMPTS {
                        let _ = event_tx
                            .send(ModelEvent::FatalError {
                                detail: "reconnect attempts exhausted".to_string(),
                            })
                            .await;
                        return;
                    }
                    let backoff = reconnect::BACKOFF_SECS[attempts - 1];
                    warn!(attempt = attempts, backoff_secs = backoff, "model session disconnected; reconnecting");
                    tokio::time::sleep(Duration::from_secs(backoff)).await;

                    match Self::dial_and_setup(&config).await {
                        Ok(new_ws) => {
                            ws = new_ws;
                            info!("model session reconnected");
                        }
                        Err(e) => {
                            let _ = event_tx
                                .send(ModelEvent::FatalError { detail: e.to_string() })
                                .await;
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_requires_exactly_one_of_cache_or_instruction() {
        let both = ModelSessionConfig {
            endpoint: "wss://example".into(),
            model_id: "m".into(),
            cached_content: Some("cachedContents/abc".into()),
            system_instruction: Some("hi".into()),
        };
        assert!(ModelSession::build_setup_message(&both).is_err());

        let neither = ModelSessionConfig {
            endpoint: "wss://example".into(),
            model_id: "m".into(),
            cached_content: None,
            system_instruction: None,
        };
        assert!(ModelSession::build_setup_message(&neither).is_err());
    }

    #[test]
    fn setup_rejects_invalid_cache_handle() {
        let config = ModelSessionConfig {
            endpoint: "wss://example".into(),
            model_id: "m".into(),
            cached_content: Some("not-a-handle".into()),
            system_instruction: None,
        };
        assert!(ModelSession::build_setup_message(&config).is_err());
    }

    #[test]
    fn setup_rejects_oversize_instruction() {
        let config = ModelSessionConfig {
            endpoint: "wss://example".into(),
            model_id: "m".into(),
            cached_content: None,
            system_instruction: Some("x".repeat(MAX_PAYLOAD_CHARS + 1)),
        };
        assert!(matches!(
            ModelSession::build_setup_message(&config),
            Err(Error::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn setup_message_serializes_with_cache_handle() {
        let config = ModelSessionConfig {
            endpoint: "wss://example".into(),
            model_id: "gemini-2.0-flash-live".into(),
            cached_content: Some("cachedContents/abc-123".into()),
            system_instruction: None,
        };
        let text = ModelSession::build_setup_message(&config).unwrap();
        assert!(text.contains("cachedContent"));
        assert!(!text.contains("systemInstruction"));
    }

    #[test]
    fn system_instruction_serializes_as_content_parts() {
        let config = ModelSessionConfig {
            endpoint: "wss://example".into(),
            model_id: "gemini-2.0-flash-live".into(),
            cached_content: None,
            system_instruction: Some("be concise".into()),
        };
        let text = ModelSession::build_setup_message(&config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value["setup"]["systemInstruction"]["parts"][0]["text"],
            "be concise"
        );
    }

    #[test]
    fn parses_server_content_audio_and_turn_complete() {
        let samples = vec![1i16, 2, 3];
        let payload = audio::encode_pcm16_b64(&samples);
        let text = format!(
            r#"{{"serverContent":{{"modelTurn":{{"parts":[{{"inlineData":{{"data":"{payload}"}}}}]}},"turnComplete":true}}}}"#
        );
        let events = ModelSession::parse_server_message(&text).unwrap();
        assert!(events.iter().any(|e| matches!(e, ModelEvent::AudioOut(_))));
        assert!(events.iter().any(|e| matches!(e, ModelEvent::TurnComplete)));
    }

    #[test]
    fn server_error_becomes_fatal_result() {
        let text = r#"{"error":{"message":"quota exceeded"}}"#;
        let err = ModelSession::parse_server_message(text).unwrap_err();
        assert!(matches!(err, Error::Fatal(_)));
    }
}
