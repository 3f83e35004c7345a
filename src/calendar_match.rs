/*
 * Meeting Pipeline Core - Calendar Event Matching
 * Copyright (c) 2024 Meeting Pipeline Contributors
 *
 * Correlates a decoded recording timestamp with already-fetched calendar
 * events so recordings can be named after the meeting they captured.
 */

use chrono::{DateTime, Duration, Utc};

use crate::config::MatchConfig;
use crate::types::{CalendarEvent, MatchConfidence, MatchResult};

/// Picks the calendar event that best explains a recording timestamp.
pub struct EventMatcher {
    config: MatchConfig,
}

impl EventMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Matches against the configured tolerance window.
    pub fn find_match(&self, recorded_at: DateTime<Utc>, events: &[CalendarEvent]) -> MatchResult {
        find_match(recorded_at, events, self.config.tolerance())
    }
}

impl Default for EventMatcher {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

/// Finds the best event for `recorded_at` among the candidates.
///
/// An event qualifies when its interval contains the timestamp or its start
/// lies within `tolerance` of it. Containing events always beat
/// tolerance-only ones; remaining ties go to the smallest start offset, then
/// the earliest start, then the lexicographically smallest title, so the
/// outcome never depends on candidate order.
pub fn find_match(
    recorded_at: DateTime<Utc>,
    events: &[CalendarEvent],
    tolerance: Duration,
) -> MatchResult {
    let mut best: Option<Candidate<'_>> = None;

    for event in events {
        if event.end < event.start {
            tracing::warn!(
                title = %event.title,
                source_id = %event.source_id,
                "skipping calendar event that ends before it starts"
            );
            continue;
        }

        let offset = signed_abs(recorded_at - event.start);
        let contains = event.start <= recorded_at && recorded_at <= event.end;
        if !contains && offset > tolerance {
            continue;
        }

        let candidate = Candidate {
            event,
            offset,
            contains,
        };
        if best.as_ref().map_or(true, |cur| candidate.beats(cur)) {
            best = Some(candidate);
        }
    }

    match best {
        Some(chosen) => MatchResult {
            confidence: if chosen.contains {
                MatchConfidence::Exact
            } else {
                MatchConfidence::Fuzzy
            },
            event: Some(chosen.event.clone()),
        },
        None => MatchResult {
            event: None,
            confidence: MatchConfidence::None,
        },
    }
}

struct Candidate<'a> {
    event: &'a CalendarEvent,
    offset: Duration,
    contains: bool,
}

impl Candidate<'_> {
    fn beats(&self, other: &Self) -> bool {
        if self.contains != other.contains {
            return self.contains;
        }
        if self.offset != other.offset {
            return self.offset < other.offset;
        }
        if self.event.start != other.event.start {
            return self.event.start < other.event.start;
        }
        self.event.title < other.event.title
    }
}

fn signed_abs(duration: Duration) -> Duration {
    if duration < Duration::zero() {
        -duration
    } else {
        duration
    }
}
