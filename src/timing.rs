use serde::Serialize;

use crate::error::{SegmentError, SegmentResult};
use crate::segment::{Segment, SuggestedEdit, TimingStatus};
use crate::utils::word_count;

/// Speech-rate model used to judge whether narration fits its time slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechRate {
    pub words_per_minute: f64,
    /// Upper bound, as a fraction of the slot, that narration may fill.
    pub buffer_fraction: f64,
    /// Lower bound, as a fraction of the slot, below which narration is too thin.
    pub min_fill: f64,
}

impl SpeechRate {
    pub fn seconds_for(&self, words: usize) -> f64 {
        words as f64 / self.words_per_minute * 60.0
    }
}

/// Annotates every segment with a `TimingStatus`. Text, word counts and
/// timestamps are left untouched, and re-running on annotated output gives
/// the same result.
pub fn validate_timing(segments: &[Segment], rate: &SpeechRate) -> Vec<Segment> {
    segments
        .iter()
        .map(|segment| {
            let mut checked = segment.clone();
            let needed = rate.seconds_for(segment.word_count);
            let ceiling = segment.duration * rate.buffer_fraction;
            let floor = segment.duration * rate.min_fill;

            let (status, warning, edit) = if needed > ceiling {
                (
                    TimingStatus::TooManyWords,
                    Some(format!(
                        "Too many words ({}) for {}s segment: needs {:.1}s, limit {:.1}s",
                        segment.word_count, segment.duration, needed, ceiling
                    )),
                    Some(SuggestedEdit::Shorten),
                )
            } else if needed < floor {
                (
                    TimingStatus::TooFewWords,
                    Some(format!(
                        "Too few words ({}) for {}s segment: needs {:.1}s, minimum {:.1}s",
                        segment.word_count, segment.duration, needed, floor
                    )),
                    Some(SuggestedEdit::Expand),
                )
            } else {
                (TimingStatus::Ok, None, None)
            };

            checked.timing_status = Some(status);
            checked.warning = warning;
            checked.suggested_edit = edit;
            checked
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineTiming {
    pub line: String,
    pub seconds: f64,
}

/// Per-line pacing for flat scripts whose line count is fixed by the caller.
pub fn estimate_line_timing(
    lines: &[String],
    words_per_minute: f64,
    min_seconds: f64,
) -> SegmentResult<Vec<LineTiming>> {
    if !(words_per_minute > 0.0) {
        return Err(SegmentError::InvalidInput(format!(
            "words per minute must be positive, got {words_per_minute}"
        )));
    }
    Ok(lines
        .iter()
        .map(|line| LineTiming {
            line: line.clone(),
            seconds: (word_count(line) as f64 / words_per_minute * 60.0).max(min_seconds),
        })
        .collect())
}
