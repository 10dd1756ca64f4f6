//! Filler index: loads the on-disk filler manifest (spec §6) into memory and
//! can decode a filler's backing WAV file into canonical 16 kHz PCM16.

use std::path::Path;

use voice_agent_core::{audio, Filler, Language, SampleRate, UtteranceKind};

use crate::error::{HedgeError, Result};

#[derive(Debug, Default)]
pub struct FillerIndex {
    fillers: Vec<Filler>,
}

impl FillerIndex {
    /// Loads a JSON manifest: a top-level array of `Filler` records (spec §6).
    pub fn load_manifest(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| HedgeError::ManifestRead {
            path: path.display().to_string(),
            source,
        })?;
        let fillers: Vec<Filler> = serde_json::from_str(&contents).map_err(|source| HedgeError::ManifestParse {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self { fillers })
    }

    pub fn from_fillers(fillers: Vec<Filler>) -> Self {
        Self { fillers }
    }

    pub fn all(&self) -> &[Filler] {
        &self.fillers
    }

    pub fn is_empty(&self) -> bool {
        self.fillers.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Filler> {
        self.fillers.iter().find(|f| f.id == id)
    }

    /// Fixed verbal utterance (prompt-to-repeat, apology) for `kind`,
    /// language-matched with an English fallback. Unlike hedge selection
    /// there is no principle/profile narrowing: these play once, outside
    /// the turn's persuasion context.
    pub fn utterance(&self, kind: UtteranceKind, language: Language) -> Option<&Filler> {
        self.fillers
            .iter()
            .find(|f| f.kind == kind && f.languages.contains(&language))
            .or_else(|| {
                self.fillers
                    .iter()
                    .find(|f| f.kind == kind && f.languages.contains(&Language::English))
            })
    }

    /// Decodes a filler's backing WAV file into canonical 16 kHz mono PCM16,
    /// resampling if the file's native rate differs.
    pub fn load_audio(&self, filler: &Filler) -> Result<Vec<i16>> {
        let mut reader = hound::WavReader::open(&filler.file_path).map_err(|source| HedgeError::AudioRead {
            path: filler.file_path.clone(),
            source,
        })?;
        let spec = reader.spec();
        let samples: Vec<i16> = match spec.sample_format {
            hound::SampleFormat::Int => reader
                .samples::<i16>()
                .collect::<std::result::Result<Vec<i16>, _>>()
                .map_err(|source| HedgeError::AudioRead {
                    path: filler.file_path.clone(),
                    source,
                })?,
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v * 32767.0) as i16))
                .collect::<std::result::Result<Vec<i16>, _>>()
                .map_err(|source| HedgeError::AudioRead {
                    path: filler.file_path.clone(),
                    source,
                })?,
        };

        let source_rate = match spec.sample_rate {
            8000 => SampleRate::Hz8000,
            24000 => SampleRate::Hz24000,
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            _ => SampleRate::Hz16000,
        };

        if source_rate.as_u32() == SampleRate::Hz16000.as_u32() {
            Ok(samples)
        } else {
            Ok(audio::resample(&samples, source_rate, SampleRate::Hz16000))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use voice_agent_core::{FillerEffectiveness, Language, Principle, Profile, VoiceTone};

    fn sample_filler(id: &str) -> Filler {
        Filler {
            id: id.to_string(),
            file_path: format!("/fillers/{id}.wav"),
            duration_secs: 0.8,
            languages: HashSet::from([Language::English]),
            principles: HashSet::from([Principle::Liking]),
            profiles: HashSet::from([Profile::RelationshipSeeker]),
            tone: VoiceTone::Warm,
            effectiveness: FillerEffectiveness {
                completion_rate: 0.9,
                sentiment_lift: 0.5,
                principle_reinforcement: 0.6,
            },
            kind: Default::default(),
        }
    }

    #[test]
    fn manifest_json_round_trips_into_fillers() {
        let fillers = vec![sample_filler("f1"), sample_filler("f2")];
        let json = serde_json::to_string(&fillers).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fillers.json");
        std::fs::write(&path, json).unwrap();

        let index = FillerIndex::load_manifest(&path).unwrap();
        assert_eq!(index.all().len(), 2);
        assert!(index.get("f1").is_some());
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let result = FillerIndex::load_manifest("/nonexistent/fillers.json");
        assert!(result.is_err());
    }

    #[test]
    fn utterance_falls_back_to_english_when_language_unmatched() {
        let mut apology = sample_filler("apology-en");
        apology.kind = UtteranceKind::Apology;
        let index = FillerIndex::from_fillers(vec![sample_filler("hedge-en"), apology]);

        let found = index.utterance(UtteranceKind::Apology, Language::Hindi).unwrap();
        assert_eq!(found.id, "apology-en");
        assert!(index.utterance(UtteranceKind::PromptToRepeat, Language::English).is_none());
    }
}
