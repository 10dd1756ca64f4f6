//! Telephony-PBX wire format: JSON control/media frames, with a binary
//! alternate media path, at 44.1 kHz inbound / 8 kHz outbound (spec §4.2, §6).

use serde::{Deserialize, Serialize};
use voice_agent_core::{audio, SampleRate};

use crate::{Carrier, CarrierEvent, OutboundFrame, RawInbound, TransportError};

#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
enum TelephonyInbound {
    #[serde(rename = "answer")]
    Answer {
        #[serde(rename = "streamId")]
        stream_id: String,
        #[serde(rename = "channelId")]
        channel_id: String,
        #[serde(rename = "callId")]
        call_id: String,
        #[serde(rename = "mediaFormat")]
        media_format: MediaFormat,
    },
    #[serde(rename = "media")]
    Media { payload: String, chunk: Option<u64> },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MediaFormat {
    #[serde(rename = "sampleRate")]
    #[allow(dead_code)]
    sample_rate: u32,
    #[allow(dead_code)]
    encoding: String,
}

#[derive(Debug, Serialize)]
struct ReverseMedia<'a> {
    event: &'static str,
    payload: String,
    #[serde(rename = "streamId")]
    stream_id: &'a str,
    #[serde(rename = "channelId")]
    channel_id: &'a str,
    #[serde(rename = "callId")]
    call_id: &'a str,
}

pub struct TelephonyCarrier {
    stream_id: Option<String>,
    channel_id: Option<String>,
    call_id: Option<String>,
}

impl TelephonyCarrier {
    pub fn new() -> Self {
        Self {
            stream_id: None,
            channel_id: None,
            call_id: None,
        }
    }

    fn decode_json(&mut self, text: &str) -> Result<Option<CarrierEvent>, TransportError> {
        let parsed: TelephonyInbound = serde_json::from_str(text)
            .map_err(|e| TransportError::UnknownEvent(format!("malformed telephony frame: {e}")))?;

        match parsed {
            TelephonyInbound::Answer {
                stream_id,
                channel_id,
                call_id,
                media_format: _,
            } => {
                if stream_id.is_empty() || channel_id.is_empty() || call_id.is_empty() {
                    return Err(TransportError::CarrierProtocol(
                        "answer frame missing streamId/channelId/callId".to_string(),
                    ));
                }
                self.stream_id = Some(stream_id.clone());
                self.channel_id = Some(channel_id.clone());
                self.call_id = Some(call_id.clone());
                Ok(Some(CarrierEvent::CallAnswered {
                    stream_id: Some(stream_id),
                    channel_id: Some(channel_id),
                    call_id: Some(call_id),
                }))
            }
            TelephonyInbound::Media { payload, .. } => {
                let pcm_44k = audio::decode_pcm16_b64(&payload)?;
                let pcm16k = audio::resample(&pcm_44k, SampleRate::Hz44100, SampleRate::Hz16000);
                let energy = audio::rms(&pcm16k);
                Ok(Some(CarrierEvent::AudioIn {
                    pcm16k,
                    energy: Some(energy),
                }))
            }
            TelephonyInbound::Unknown => Ok(None),
        }
    }

    fn decode_binary(&mut self, bytes: &[u8]) -> Result<Option<CarrierEvent>, TransportError> {
        // Detection per spec §4.2: first byte != '{' and != '[' means raw
        // PCM at 44.1 kHz rather than a JSON frame carried over a binary
        // websocket message.
        match bytes.first() {
            Some(b'{') | Some(b'[') => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| TransportError::UnknownEvent(format!("non-utf8 json frame: {e}")))?;
                self.decode_json(text)
            }
            _ => {
                let pcm_44k = voice_agent_core::audio::pcm16_from_bytes(bytes)?;
                let pcm16k = audio::resample(&pcm_44k, SampleRate::Hz44100, SampleRate::Hz16000);
                let energy = audio::rms(&pcm16k);
                Ok(Some(CarrierEvent::AudioIn {
                    pcm16k,
                    energy: Some(energy),
                }))
            }
        }
    }
}

impl Default for TelephonyCarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl Carrier for TelephonyCarrier {
    fn decode_frame(&mut self, raw: RawInbound) -> Result<Option<CarrierEvent>, TransportError> {
        match raw {
            RawInbound::Json(text) => self.decode_json(&text),
            RawInbound::Binary(bytes) => self.decode_binary(&bytes),
        }
    }

    fn encode_audio_out(&self, pcm16k: &[i16]) -> OutboundFrame {
        let pcm8k = audio::resample(pcm16k, SampleRate::Hz16000, SampleRate::Hz8000);
        let payload = audio::encode_pcm16_b64(&pcm8k);
        let frame = ReverseMedia {
            event: "reverse-media",
            payload,
            stream_id: self.stream_id.as_deref().unwrap_or(""),
            channel_id: self.channel_id.as_deref().unwrap_or(""),
            call_id: self.call_id.as_deref().unwrap_or(""),
        };
        OutboundFrame::text(serde_json::to_string(&frame).expect("ReverseMedia always serializes"))
    }

    fn encode_interrupt(&self) -> Option<OutboundFrame> {
        // Telephony has no control frame for interruption: the supervisor
        // simply stops emitting `reverse-media` frames (spec §4.2).
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_frame_sets_ids_and_emits_call_answered() {
        let mut carrier = TelephonyCarrier::new();
        let frame = r#"{"event":"answer","streamId":"s1","channelId":"c1","callId":"k1","mediaFormat":{"sampleRate":44100,"encoding":"LINEAR16"}}"#;
        let event = carrier
            .decode_frame(RawInbound::Json(frame.to_string()))
            .unwrap()
            .unwrap();
        match event {
            CarrierEvent::CallAnswered {
                stream_id,
                channel_id,
                call_id,
            } => {
                assert_eq!(stream_id.as_deref(), Some("s1"));
                assert_eq!(channel_id.as_deref(), Some("c1"));
                assert_eq!(call_id.as_deref(), Some("k1"));
            }
            _ => panic!("expected CallAnswered"),
        }
    }

    #[test]
    fn media_frame_resamples_to_16k() {
        let mut carrier = TelephonyCarrier::new();
        let samples = vec![1000i16; 441];
        let payload = audio::encode_pcm16_b64(&samples);
        let frame = format!(r#"{{"event":"media","payload":"{payload}","chunk":1}}"#);
        let event = carrier
            .decode_frame(RawInbound::Json(frame))
            .unwrap()
            .unwrap();
        match event {
            CarrierEvent::AudioIn { pcm16k, energy } => {
                assert_eq!(pcm16k.len(), (441.0 * 16000.0 / 44100.0f64).floor() as usize);
                assert!(energy.unwrap() > 0.0);
            }
            _ => panic!("expected AudioIn"),
        }
    }

    #[test]
    fn binary_frame_starting_with_brace_is_parsed_as_json() {
        let mut carrier = TelephonyCarrier::new();
        let frame = br#"{"event":"media","payload":"AAA=","chunk":1}"#.to_vec();
        let result = carrier.decode_frame(RawInbound::Binary(frame));
        assert!(result.is_ok());
    }

    #[test]
    fn binary_frame_without_brace_is_raw_pcm() {
        let mut carrier = TelephonyCarrier::new();
        let samples: Vec<i16> = vec![500; 441];
        let bytes = audio::pcm16_to_bytes(&samples);
        let event = carrier
            .decode_frame(RawInbound::Binary(bytes))
            .unwrap()
            .unwrap();
        assert!(matches!(event, CarrierEvent::AudioIn { .. }));
    }

    #[test]
    fn missing_ids_in_answer_is_protocol_error() {
        let mut carrier = TelephonyCarrier::new();
        let frame = r#"{"event":"answer","streamId":"","channelId":"c1","callId":"k1","mediaFormat":{"sampleRate":44100,"encoding":"LINEAR16"}}"#;
        let err = carrier
            .decode_frame(RawInbound::Json(frame.to_string()))
            .unwrap_err();
        assert!(matches!(err, TransportError::CarrierProtocol(_)));
    }

    #[test]
    fn unknown_event_is_dropped_not_errored() {
        let mut carrier = TelephonyCarrier::new();
        let frame = r#"{"event":"ping"}"#;
        let result = carrier.decode_frame(RawInbound::Json(frame.to_string())).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn outbound_audio_resamples_to_8k_and_echoes_ids() {
        let mut carrier = TelephonyCarrier::new();
        carrier
            .decode_frame(RawInbound::Json(
                r#"{"event":"answer","streamId":"s1","channelId":"c1","callId":"k1","mediaFormat":{"sampleRate":44100,"encoding":"LINEAR16"}}"#.to_string(),
            ))
            .unwrap();

        let pcm16k = vec![100i16; 160];
        let frame = carrier.encode_audio_out(&pcm16k);
        assert!(frame.is_text);
        let text = String::from_utf8(frame.bytes).unwrap();
        assert!(text.contains("\"event\":\"reverse-media\""));
        assert!(text.contains("\"streamId\":\"s1\""));
    }

    #[test]
    fn telephony_has_no_interrupt_frame() {
        let carrier = TelephonyCarrier::new();
        assert!(carrier.encode_interrupt().is_none());
    }
}
