/*
 * Meeting Pipeline Core - Shared Types
 * Copyright (c) 2024 Meeting Pipeline Contributors
 *
 * This work is licensed under the Creative Commons Attribution-NonCommercial 4.0 International License.
 * To view a copy of this license, visit http://creativecommons.org/licenses/by-nc/4.0/
 *
 * You are free to share and adapt this work for non-commercial purposes with attribution.
 * Commercial use is prohibited without explicit written permission.
 *
 * For commercial licensing inquiries, please contact the project maintainers.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Calendar event as fetched by the calendar collaborator.
///
/// Immutable once fetched; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source_id: String,
}

/// How a recording timestamp relates to the matched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchConfidence {
    /// Timestamp falls inside the event interval.
    Exact,
    /// Timestamp only falls within the tolerance window of the event start.
    Fuzzy,
    /// No candidate qualified; the caller picks a fallback name.
    None,
}

/// Outcome of matching a recording against the candidate events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub event: Option<CalendarEvent>,
    pub confidence: MatchConfidence,
}

/// Transcript segment produced by the external transcription engine.
///
/// Times are seconds from the start of the recording. Segments arrive
/// ordered and non-overlapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Speaker identity within a single recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeakerLabel {
    /// Zero-based cluster id; ids carry no meaning across recordings.
    Speaker(usize),
    /// Sentinel for segments the diarizer could not cover.
    Unknown,
}

impl std::fmt::Display for SpeakerLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeakerLabel::Speaker(id) => write!(f, "Speaker {}", id + 1),
            SpeakerLabel::Unknown => write!(f, "Unknown Speaker"),
        }
    }
}

/// Transcript segment with its speaker attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub speaker: SpeakerLabel,
}

/// Cepstral features for one analysis frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameFeatures {
    /// Cepstral coefficients, optionally followed by their deltas.
    pub coefficients: Vec<f64>,
    /// RMS energy of the raw frame.
    pub energy: f64,
    /// Below the configured energy floor. Silent frames are still emitted
    /// so frame indices stay aligned across the pipeline.
    pub silent: bool,
}

/// Time-ordered feature frames plus the timing geometry that produced them.
///
/// Frame order is meaningful; consumers must never reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSequence {
    pub frames: Vec<FrameFeatures>,
    /// Seconds covered by one frame.
    pub frame_len: f64,
    /// Seconds between consecutive frame starts.
    pub hop: f64,
}

impl FeatureSequence {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames above the silence floor.
    pub fn voiced_count(&self) -> usize {
        self.frames.iter().filter(|f| !f.silent).count()
    }
}

/// Dense per-frame speaker labels for one recording.
///
/// Label 0 is the most frequently assigned cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    labels: Vec<usize>,
    num_speakers: usize,
}

impl ClusterAssignment {
    pub(crate) fn new(labels: Vec<usize>, num_speakers: usize) -> Self {
        Self {
            labels,
            num_speakers,
        }
    }

    /// Label for a frame index, `None` past the end of coverage.
    pub fn label(&self, frame: usize) -> Option<usize> {
        self.labels.get(frame).copied()
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn num_speakers(&self) -> usize {
        self.num_speakers
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Error types for the processing core
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid identifier format: {0}")]
    InvalidIdentifierFormat(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    #[error("Misordered segments: {0}")]
    MisorderedSegments(String),

    #[error("Audio decode error: {0}")]
    Audio(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
