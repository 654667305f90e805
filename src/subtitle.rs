use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::segment::Segment;
use crate::timing::SpeechRate;
use crate::utils::word_count;

const LINE_WIDTH: usize = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct SrtCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// One cue per sentence. Each sentence is given the time it takes to speak
/// at `rate`, starting at its segment's slot and never spilling past it.
pub fn build_cues(segments: &[Segment], rate: &SpeechRate) -> Vec<SrtCue> {
    let mut cues = Vec::new();
    for segment in segments {
        let mut cursor = segment.start_time;
        for sentence in segment.sentences() {
            let spoken = rate.seconds_for(word_count(sentence));
            let end = (cursor + spoken).min(segment.end_time);
            if end > cursor {
                cues.push(SrtCue {
                    start: cursor,
                    end,
                    text: sentence.clone(),
                });
            }
            cursor = end;
        }
    }
    cues
}

pub fn render_srt(cues: &[SrtCue]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        writeln!(out, "{}", i + 1)?;
        writeln!(
            out,
            "{} --> {}",
            format_srt_time(cue.start),
            format_srt_time(cue.end)
        )?;
        for line in wrap_text(&cue.text, LINE_WIDTH) {
            writeln!(out, "{line}")?;
        }
        writeln!(out)?;
    }
    Ok(out)
}

pub fn write_srt(path: &Path, cues: &[SrtCue]) -> anyhow::Result<()> {
    let srt = render_srt(cues).context("Failed to render subtitles")?;
    fs::write(path, srt)
        .with_context(|| format!("Failed to write subtitles to {}", path.display()))
}

fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let (h, rest) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (m, rest) = (rest / 60_000, rest % 60_000);
    let (s, ms) = (rest / 1000, rest % 1000);
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        match lines.last_mut() {
            Some(line) if line.len() + 1 + word.len() <= width => {
                line.push(' ');
                line.push_str(word);
            }
            _ => lines.push(word.to_string()),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{SegmentPlan, segment_script};
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_hours_minutes_and_millis() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(3725.4567), "01:02:05,457");
    }

    #[test]
    fn wraps_at_word_boundaries() {
        assert_eq!(
            wrap_text("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
        assert!(wrap_text("   ", 10).is_empty());
    }

    #[test]
    fn cues_follow_segment_slots() {
        let plan = SegmentPlan {
            num_segments: 2,
            segment_duration: 4.0,
            words_per_minute: 120.0,
            buffer_fraction: 1.0,
        };
        // 2 words per second at 120 wpm.
        let segments = segment_script(
            "One two. Three four five six. Seven eight nine ten eleven twelve.",
            &plan,
        )
        .unwrap();
        let rate = SpeechRate {
            words_per_minute: 120.0,
            buffer_fraction: 1.0,
            min_fill: 0.0,
        };
        let cues = build_cues(&segments, &rate);
        assert_eq!(
            cues,
            vec![
                SrtCue {
                    start: 0.0,
                    end: 1.0,
                    text: "One two.".into(),
                },
                SrtCue {
                    start: 1.0,
                    end: 3.0,
                    text: "Three four five six.".into(),
                },
                SrtCue {
                    start: 4.0,
                    end: 7.0,
                    text: "Seven eight nine ten eleven twelve.".into(),
                },
            ]
        );
        let srt = render_srt(&cues).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,000\nOne two.\n\n2\n"));
    }

    #[test]
    fn cues_are_clamped_to_their_segment() {
        let plan = SegmentPlan {
            num_segments: 1,
            segment_duration: 2.0,
            words_per_minute: 120.0,
            buffer_fraction: 1.0,
        };
        let segments = segment_script("One two three four five six.", &plan).unwrap();
        let rate = SpeechRate {
            words_per_minute: 120.0,
            buffer_fraction: 1.0,
            min_fill: 0.0,
        };
        let cues = build_cues(&segments, &rate);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].end, 2.0);
    }
}
