/*
 * Meeting Pipeline Core - Rust Edition
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

//! Core algorithms for a meeting-recording pipeline.
//!
//! Two concerns live here: recovering a recording's creation time from its
//! time-ordered identifier and matching it against calendar events, and
//! partitioning a transcribed waveform into per-speaker segments with
//! CPU-only acoustic clustering. Everything around these (downloading,
//! transcription engines, ticket trackers, file naming) talks to this crate
//! through plain data and stays outside it.
//!
//! All components are pure, synchronous, and deterministic: the same input
//! and configuration always produce the same output, so reruns after an
//! upstream failure relabel a recording identically.

pub mod audio;
pub mod calendar_match;
pub mod clustering;
pub mod config;
pub mod diarize;
pub mod features;
pub mod recording_id;
pub mod segments;
pub mod types;

pub use calendar_match::{find_match, EventMatcher};
pub use clustering::SpeakerClusterer;
pub use config::{ClusterConfig, DiarizerConfig, FeatureConfig, MatchConfig};
pub use diarize::{export_summary, Diarizer};
pub use features::FeatureExtractor;
pub use recording_id::RecordingId;
pub use segments::{assign_speakers, without_speakers};
pub use types::{
    CalendarEvent, ClusterAssignment, FeatureSequence, FrameFeatures, LabeledSegment,
    MatchConfidence, MatchResult, PipelineError, Result, SpeakerLabel, TranscriptSegment,
};
