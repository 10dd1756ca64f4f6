//! Browser/test wire format: JSON audio frames at 48 kHz, with an
//! `INTERRUPT` control frame (spec §4.2, §6).

use serde::{Deserialize, Serialize};
use voice_agent_core::{audio, SampleRate};

use crate::{Carrier, CarrierEvent, OutboundFrame, RawInbound, TransportError};

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum BrowserInbound {
    #[serde(rename = "AUDIO")]
    Audio {
        audio: String,
        #[serde(rename = "sampleRate")]
        #[allow(dead_code)]
        sample_rate: u32,
        #[serde(rename = "energyLevel")]
        energy_level: Option<f32>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum BrowserOutbound {
    #[serde(rename = "AUDIO")]
    Audio {
        audio: String,
        #[serde(rename = "sampleRate")]
        sample_rate: u32,
    },
}

pub struct BrowserCarrier {
    connected: bool,
}

impl BrowserCarrier {
    pub fn new() -> Self {
        Self { connected: false }
    }
}

impl Default for BrowserCarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl Carrier for BrowserCarrier {
    fn on_connect(&mut self) -> Option<CarrierEvent> {
        self.connected = true;
        Some(CarrierEvent::CallAnswered {
            stream_id: None,
            channel_id: None,
            call_id: None,
        })
    }

    fn decode_frame(&mut self, raw: RawInbound) -> Result<Option<CarrierEvent>, TransportError> {
        let text = match raw {
            RawInbound::Json(text) => text,
            RawInbound::Binary(bytes) => std::str::from_utf8(&bytes)
                .map_err(|e| TransportError::UnknownEvent(format!("non-utf8 browser frame: {e}")))?
                .to_string(),
        };

        let parsed: BrowserInbound = serde_json::from_str(&text)
            .map_err(|e| TransportError::UnknownEvent(format!("malformed browser frame: {e}")))?;

        match parsed {
            BrowserInbound::Audio {
                audio,
                sample_rate: _,
                energy_level,
            } => {
                let pcm_48k = audio::decode_pcm16_b64(&audio)?;
                let pcm16k = audio::resample(&pcm_48k, SampleRate::Hz48000, SampleRate::Hz16000);
                let energy = energy_level.unwrap_or_else(|| audio::rms(&pcm16k));
                Ok(Some(CarrierEvent::AudioIn {
                    pcm16k,
                    energy: Some(energy),
                }))
            }
            BrowserInbound::Unknown => Ok(None),
        }
    }

    fn encode_audio_out(&self, pcm16k: &[i16]) -> OutboundFrame {
        let pcm48k = audio::resample(pcm16k, SampleRate::Hz16000, SampleRate::Hz48000);
        let frame = BrowserOutbound::Audio {
            audio: audio::encode_pcm16_b64(&pcm48k),
            sample_rate: 48000,
        };
        OutboundFrame::text(serde_json::to_string(&frame).expect("BrowserOutbound always serializes"))
    }

    fn encode_interrupt(&self) -> Option<OutboundFrame> {
        Some(OutboundFrame::text(r#"{"type":"INTERRUPT"}"#.to_string()))
    }
}
