/*
 * Meeting Pipeline Core - Transcript Segment Labeling
 * Copyright (c) 2024 Meeting Pipeline Contributors
 *
 * Merges per-frame speaker labels with transcript segment boundaries from
 * the external transcription engine.
 */

use crate::types::{
    ClusterAssignment, LabeledSegment, PipelineError, Result, SpeakerLabel, TranscriptSegment,
};

/// Labels each transcript segment with the majority speaker of the frames
/// it covers.
///
/// `frame_hop` is the extractor's hop in seconds. Segments that fall
/// entirely outside frame coverage (clock drift between the transcriber and
/// the feature extractor) get [`SpeakerLabel::Unknown`] instead of failing
/// the batch. Output preserves input order and length.
pub fn assign_speakers(
    segments: &[TranscriptSegment],
    assignment: &ClusterAssignment,
    frame_hop: f64,
) -> Result<Vec<LabeledSegment>> {
    // Transcript order is a contract with the upstream transcriber;
    // breaking it upstream must fail loudly rather than mislabel quietly.
    for pair in segments.windows(2) {
        if pair[1].start < pair[0].start {
            return Err(PipelineError::MisorderedSegments(format!(
                "segment at {:.2}s follows segment at {:.2}s",
                pair[1].start, pair[0].start
            )));
        }
    }

    let labeled = segments
        .iter()
        .map(|segment| {
            let speaker = match frame_range(segment.start, segment.end, frame_hop, assignment.len())
            {
                Some((first, last)) => majority_label(assignment, first, last),
                None => {
                    tracing::warn!(
                        start = segment.start,
                        end = segment.end,
                        "transcript segment outside frame coverage"
                    );
                    SpeakerLabel::Unknown
                }
            };
            LabeledSegment {
                start: segment.start,
                end: segment.end,
                text: segment.text.clone(),
                speaker,
            }
        })
        .collect();

    Ok(labeled)
}

/// Fallback labeling when diarization is unavailable: same segments, every
/// speaker unknown, so a plain transcript can still be produced.
pub fn without_speakers(segments: &[TranscriptSegment]) -> Vec<LabeledSegment> {
    segments
        .iter()
        .map(|segment| LabeledSegment {
            start: segment.start,
            end: segment.end,
            text: segment.text.clone(),
            speaker: SpeakerLabel::Unknown,
        })
        .collect()
}

/// Maps a segment's time range onto the covered frame index range,
/// half-open. `None` when the range misses frame coverage entirely.
fn frame_range(start: f64, end: f64, hop: f64, num_frames: usize) -> Option<(usize, usize)> {
    if hop <= 0.0 || num_frames == 0 || end <= start {
        return None;
    }
    let first = (start / hop).floor().max(0.0) as usize;
    let last = ((end / hop).ceil().max(0.0) as usize).min(num_frames);
    if first >= last {
        return None;
    }
    Some((first, last))
}

/// Majority vote over the covered frames; ties go to the label seen at the
/// earliest frame in the range.
fn majority_label(assignment: &ClusterAssignment, first: usize, last: usize) -> SpeakerLabel {
    let num_speakers = assignment.num_speakers();
    if num_speakers == 0 {
        return SpeakerLabel::Unknown;
    }

    let mut counts = vec![0usize; num_speakers];
    let mut first_seen = vec![usize::MAX; num_speakers];
    for (frame, &label) in assignment.labels()[first..last].iter().enumerate() {
        counts[label] += 1;
        if first_seen[label] == usize::MAX {
            first_seen[label] = first + frame;
        }
    }

    let mut best = 0usize;
    for label in 1..num_speakers {
        let wins = counts[label] > counts[best]
            || (counts[label] == counts[best] && first_seen[label] < first_seen[best]);
        if wins {
            best = label;
        }
    }
    SpeakerLabel::Speaker(best)
}
