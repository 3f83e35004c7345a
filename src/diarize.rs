/*
 * Meeting Pipeline Core - Diarization Facade
 * Copyright (c) 2024 Meeting Pipeline Contributors
 *
 * One call from waveform plus transcript to speaker-labeled transcript.
 */

use serde_json::json;

use crate::clustering::SpeakerClusterer;
use crate::config::DiarizerConfig;
use crate::features::FeatureExtractor;
use crate::segments::assign_speakers;
use crate::types::{LabeledSegment, Result, SpeakerLabel, TranscriptSegment};

/// Runs feature extraction, speaker clustering, and segment labeling as one
/// chain.
///
/// Errors propagate unchanged so the caller can fall back to
/// [`crate::segments::without_speakers`] and still produce a plain
/// transcript.
pub struct Diarizer {
    extractor: FeatureExtractor,
    clusterer: SpeakerClusterer,
}

impl Diarizer {
    pub fn new(config: DiarizerConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.features),
            clusterer: SpeakerClusterer::new(config.clustering),
        }
    }

    /// `expected_speakers` of zero auto-detects the speaker count.
    pub fn diarize(
        &self,
        samples: &[f32],
        sample_rate: u32,
        segments: &[TranscriptSegment],
        expected_speakers: usize,
    ) -> Result<Vec<LabeledSegment>> {
        let features = self.extractor.extract(samples, sample_rate)?;
        let assignment = self.clusterer.cluster(&features, expected_speakers)?;
        assign_speakers(segments, &assignment, features.hop)
    }
}

impl Default for Diarizer {
    fn default() -> Self {
        Self::new(DiarizerConfig::default())
    }
}

/// JSON summary of a labeled transcript for downstream consumers.
pub fn export_summary(segments: &[LabeledSegment]) -> serde_json::Value {
    let mut speakers: Vec<String> = segments
        .iter()
        .filter(|s| s.speaker != SpeakerLabel::Unknown)
        .map(|s| s.speaker.to_string())
        .collect();
    speakers.sort();
    speakers.dedup();

    json!({
        "speakers": speakers,
        "total_speakers": speakers.len(),
        "total_segments": segments.len(),
        "total_duration": segments.iter().map(|s| s.end - s.start).sum::<f64>(),
        "segments": segments,
    })
}
