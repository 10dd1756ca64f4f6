//! Audio codec: linear PCM resampling, RMS energy, voice-activity test, base64 framing.
//!
//! All operations here work on raw 16-bit signed mono PCM. There is no DSP
//! beyond piecewise-linear interpolation and RMS — by design, the model and
//! the carriers do their own encoding; this module only moves samples
//! between the canonical rates the rest of the system understands.

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical sample rates used across the carrier/model boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleRate {
    /// 8 kHz — telephony outbound (`reverse-media`).
    Hz8000,
    /// 16 kHz — the core's canonical inbound/internal rate.
    Hz16000,
    /// 24 kHz — model audio output.
    Hz24000,
    /// 44.1 kHz — telephony inbound.
    Hz44100,
    /// 48 kHz — browser carrier.
    Hz48000,
}

impl SampleRate {
    pub fn as_u32(self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz24000 => 24000,
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
        }
    }
}

impl std::fmt::Display for SampleRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Hz", self.as_u32())
    }
}

/// Failure mode for the codec. The carrier adapter drops the offending frame
/// and increments a counter; it never propagates this further.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioCodecError {
    #[error("bad audio frame: {0}")]
    BadAudioFrame(String),
}

/// Default RMS voice-activity threshold on the -32768..32767 absolute scale,
/// used when an agent's call policy does not override it.
pub const DEFAULT_VOICE_ACTIVE_THRESHOLD: f32 = 20.0;

/// Piecewise-linear resampling on 16-bit signed mono samples.
///
/// Output length is `floor(inSamples * dstRate / srcRate)`. Ties (a source
/// index that falls exactly between two samples is not the tie in question
/// here — the tie is when the fractional source position lands on an
/// integer) break toward the nearest-lower source sample index, i.e. the
/// `idx_floor` side of the interpolation.
pub fn resample(src: &[i16], src_rate: SampleRate, dst_rate: SampleRate) -> Vec<i16> {
    if src_rate == dst_rate || src.is_empty() {
        return src.to_vec();
    }

    let ratio = dst_rate.as_u32() as f64 / src_rate.as_u32() as f64;
    let dst_len = ((src.len() as f64) * ratio).floor() as usize;
    let last = src.len() - 1;

    let mut out = Vec::with_capacity(dst_len);
    for i in 0..dst_len {
        let src_pos = i as f64 / ratio;
        let idx_floor = (src_pos.floor() as usize).min(last);
        let idx_ceil = (idx_floor + 1).min(last);
        let frac = src_pos - idx_floor as f64;

        let a = src[idx_floor] as f64;
        let b = src[idx_ceil] as f64;
        let interp = a + (b - a) * frac;
        out.push(interp.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }
    out
}

/// Root-mean-square of raw 16-bit samples, on the absolute -32768..32767
/// scale (not normalized to [-1,1]) so thresholds configured in agent policy
/// are reproducible across callers.
pub fn rms(pcm16: &[i16]) -> f32 {
    if pcm16.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = pcm16.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / pcm16.len() as f64).sqrt() as f32
}

/// RMS-threshold voice-activity test.
pub fn is_voice_active(pcm16: &[i16], threshold: f32) -> bool {
    rms(pcm16) > threshold
}

pub fn b64encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn b64decode(s: &str) -> Result<Vec<u8>, AudioCodecError> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| AudioCodecError::BadAudioFrame(format!("invalid base64: {e}")))
}

/// Decode little-endian 16-bit PCM bytes into samples. An odd-length buffer
/// is a `BadAudioFrame`.
pub fn pcm16_from_bytes(bytes: &[u8]) -> Result<Vec<i16>, AudioCodecError> {
    if bytes.len() % 2 != 0 {
        return Err(AudioCodecError::BadAudioFrame(format!(
            "odd-length PCM buffer: {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Decode a base64 carrier payload directly into PCM16 samples, combining
/// `b64decode` and `pcm16_from_bytes` with one error type.
pub fn decode_pcm16_b64(payload: &str) -> Result<Vec<i16>, AudioCodecError> {
    pcm16_from_bytes(&b64decode(payload)?)
}

/// Encode PCM16 samples as a base64 carrier payload.
pub fn encode_pcm16_b64(samples: &[i16]) -> String {
    b64encode(&pcm16_to_bytes(samples))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_length_matches_formula() {
        let src = vec![0i16; 441];
        let out = resample(&src, SampleRate::Hz44100, SampleRate::Hz16000);
        let expected = (441.0 * 16000.0 / 44100.0f64).floor() as usize;
        assert_eq!(out.len(), expected);
    }

    #[test]
    fn resample_identity_is_noop() {
        let src: Vec<i16> = (0..100).collect();
        let out = resample(&src, SampleRate::Hz16000, SampleRate::Hz16000);
        assert_eq!(src, out);
    }

    #[test]
    fn resample_round_trip_preserves_length_within_one_sample() {
        let src: Vec<i16> = (0..1600).map(|i| ((i % 200) as i16) - 100).collect();
        let down = resample(&src, SampleRate::Hz16000, SampleRate::Hz8000);
        let back = resample(&down, SampleRate::Hz8000, SampleRate::Hz16000);
        let diff = (back.len() as i64 - src.len() as i64).abs();
        assert!(diff <= 1, "round trip length diverged by {diff}");
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[0i16; 320]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_is_large() {
        let loud = vec![20000i16; 320];
        assert!(rms(&loud) > 19000.0);
    }

    #[test]
    fn voice_active_threshold() {
        let quiet = vec![5i16; 320];
        let loud = vec![5000i16; 320];
        assert!(!is_voice_active(&quiet, DEFAULT_VOICE_ACTIVE_THRESHOLD));
        assert!(is_voice_active(&loud, DEFAULT_VOICE_ACTIVE_THRESHOLD));
    }

    #[test]
    fn b64_round_trip() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let encoded = b64encode(&bytes);
        let decoded = b64decode(&encoded).unwrap();
        assert_eq!(bytes, decoded);
    }

    #[test]
    fn odd_length_pcm_is_bad_audio_frame() {
        let err = pcm16_from_bytes(&[0x01, 0x02, 0x03]).unwrap_err();
        assert!(matches!(err, AudioCodecError::BadAudioFrame(_)));
    }

    #[test]
    fn pcm16_byte_round_trip() {
        let samples: Vec<i16> = vec![0, 1, -1, 32767, -32768, 1234];
        let bytes = pcm16_to_bytes(&samples);
        let back = pcm16_from_bytes(&bytes).unwrap();
        assert_eq!(samples, back);
    }

    #[test]
    fn invalid_base64_is_bad_audio_frame() {
        let err = decode_pcm16_b64("not base64!!").unwrap_err();
        assert!(matches!(err, AudioCodecError::BadAudioFrame(_)));
    }
}
