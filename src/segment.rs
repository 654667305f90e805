use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{SegmentError, SegmentResult};
use crate::utils::{split_sentences, word_count};

/// Speakability verdict attached by the timing validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingStatus {
    Ok,
    TooManyWords,
    TooFewWords,
}

/// How a flagged segment's narration should change to fit its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedEdit {
    Shorten,
    Expand,
}

/// A contiguous slice of narration that owns one fixed time slot of the video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// 1-based position, kept contiguous after every merge or split.
    pub index: usize,
    pub text: String,
    pub word_count: usize,
    pub duration: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub timing_status: Option<TimingStatus>,
    pub warning: Option<String>,
    pub suggested_edit: Option<SuggestedEdit>,
    #[serde(skip)]
    sentences: Vec<String>,
}

impl Segment {
    fn from_sentences(sentences: Vec<String>, duration: f64) -> Self {
        let text = sentences.join(" ");
        Self {
            index: 0,
            word_count: word_count(&text),
            text,
            duration,
            start_time: 0.0,
            end_time: 0.0,
            timing_status: None,
            warning: None,
            suggested_edit: None,
            sentences,
        }
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    fn absorb(&mut self, next: Segment) {
        self.text.push(' ');
        self.text.push_str(&next.text);
        self.word_count += next.word_count;
        self.sentences.extend(next.sentences);
    }
}

/// Segmentation parameters, taken from an already validated `Config`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPlan {
    pub num_segments: usize,
    pub segment_duration: f64,
    pub words_per_minute: f64,
    pub buffer_fraction: f64,
}

impl SegmentPlan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            num_segments: config.num_segments(),
            segment_duration: config.video.segment_duration,
            words_per_minute: config.timing.words_per_minute,
            buffer_fraction: config.timing.buffer_percentage,
        }
    }

    pub fn words_per_segment(&self) -> usize {
        (self.segment_duration / 60.0 * self.words_per_minute * self.buffer_fraction).floor()
            as usize
    }

    fn check(&self) -> SegmentResult<()> {
        if self.num_segments == 0 {
            return Err(SegmentError::InvalidInput(
                "number of segments must be at least 1".into(),
            ));
        }
        if !(self.segment_duration > 0.0) {
            return Err(SegmentError::InvalidInput(format!(
                "segment duration must be positive, got {}",
                self.segment_duration
            )));
        }
        if !(self.words_per_minute > 0.0) {
            return Err(SegmentError::InvalidInput(format!(
                "words per minute must be positive, got {}",
                self.words_per_minute
            )));
        }
        if !(self.buffer_fraction > 0.0 && self.buffer_fraction <= 1.0) {
            return Err(SegmentError::InvalidInput(format!(
                "buffer fraction must be in (0, 1], got {}",
                self.buffer_fraction
            )));
        }
        Ok(())
    }
}

/// Partitions `text` into exactly `plan.num_segments` timed segments made of
/// whole sentences, in narration order.
pub fn segment_script(text: &str, plan: &SegmentPlan) -> SegmentResult<Vec<Segment>> {
    plan.check()?;
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Err(SegmentError::InvalidInput("narration text is empty".into()));
    }

    let mut segments = pack_sentences(sentences, plan);
    debug!(
        "Packed {} initial segments (target {} words each)",
        segments.len(),
        plan.words_per_segment()
    );

    while segments.len() > plan.num_segments {
        merge_lightest_pair(&mut segments);
    }
    while segments.len() < plan.num_segments {
        split_heaviest(&mut segments, plan)?;
    }

    assign_times(&mut segments, plan.segment_duration);
    Ok(segments)
}

fn pack_sentences(sentences: Vec<String>, plan: &SegmentPlan) -> Vec<Segment> {
    let target = plan.words_per_segment();
    let mut segments = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_words = 0;

    for sentence in sentences {
        let words = word_count(&sentence);
        if current_words + words > target && !current.is_empty() {
            segments.push(Segment::from_sentences(
                std::mem::take(&mut current),
                plan.segment_duration,
            ));
            current_words = 0;
        }
        current.push(sentence);
        current_words += words;
    }
    if !current.is_empty() {
        segments.push(Segment::from_sentences(current, plan.segment_duration));
    }

    reindex(&mut segments);
    segments
}

// Leftmost pair wins ties.
fn merge_lightest_pair(segments: &mut Vec<Segment>) {
    let mut merge_at = 0;
    let mut lightest = usize::MAX;
    for (i, pair) in segments.windows(2).enumerate() {
        let combined = pair[0].word_count + pair[1].word_count;
        if combined < lightest {
            lightest = combined;
            merge_at = i;
        }
    }

    let next = segments.remove(merge_at + 1);
    segments[merge_at].absorb(next);
    reindex(segments);
}

// Picks the heaviest segment that still has two or more sentences; leftmost
// wins ties. Single-sentence segments are never split into an empty half.
fn split_heaviest(segments: &mut Vec<Segment>, plan: &SegmentPlan) -> SegmentResult<()> {
    let mut target: Option<usize> = None;
    for (i, segment) in segments.iter().enumerate() {
        if segment.sentences.len() < 2 {
            continue;
        }
        match target {
            Some(best) if segments[best].word_count >= segment.word_count => {}
            _ => target = Some(i),
        }
    }

    let Some(at) = target else {
        return Err(SegmentError::Unconvergeable {
            requested: plan.num_segments,
            reached: segments.len(),
        });
    };

    let mut first = segments[at].sentences.clone();
    let second = first.split_off(first.len() / 2);
    segments[at] = Segment::from_sentences(first, plan.segment_duration);
    segments.insert(
        at + 1,
        Segment::from_sentences(second, plan.segment_duration),
    );
    reindex(segments);
    Ok(())
}

fn reindex(segments: &mut [Segment]) {
    for (i, segment) in segments.iter_mut().enumerate() {
        segment.index = i + 1;
    }
}

fn assign_times(segments: &mut [Segment], duration: f64) {
    for segment in segments.iter_mut() {
        segment.start_time = (segment.index - 1) as f64 * duration;
        segment.end_time = segment.start_time + duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plan(num_segments: usize, segment_duration: f64, wpm: f64, buffer: f64) -> SegmentPlan {
        SegmentPlan {
            num_segments,
            segment_duration,
            words_per_minute: wpm,
            buffer_fraction: buffer,
        }
    }

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    fn sample_script() -> String {
        [
            "Containers package an application with everything it needs to run.",
            "They share the host kernel instead of booting a whole operating system.",
            "That makes them start in seconds.",
            "An image is the recipe.",
            "A container is a running instance of that recipe.",
            "Registries store images so teams can share them.",
            "Orchestrators schedule many containers across a cluster of machines.",
            "If one crashes, a replacement starts automatically.",
            "Networking rules decide which containers can talk to each other.",
            "Volumes keep data alive after a container stops.",
            "Together these pieces make deployments repeatable.",
        ]
        .join(" ")
    }

    #[test]
    fn words_per_segment_follows_rate_and_buffer() {
        assert_eq!(plan(9, 5.0, 150.0, 0.9).words_per_segment(), 11);
        assert_eq!(plan(1, 60.0, 1.0, 1.0).words_per_segment(), 1);
    }

    #[test]
    fn merges_leftmost_lightest_pairs_first() {
        // One word per segment forces four packed segments.
        let segments = segment_script("A. B. C. D.", &plan(2, 60.0, 1.0, 1.0)).unwrap();
        assert_eq!(texts(&segments), vec!["A. B.", "C. D."]);
        assert_eq!(segments[0].word_count, 2);
        assert_eq!(segments[1].sentences(), ["C.", "D."]);
    }

    #[test]
    fn merge_prefers_lighter_pair_over_leftmost() {
        let segments =
            segment_script("One two three. Four. Five.", &plan(2, 60.0, 1.0, 1.0)).unwrap();
        assert_eq!(texts(&segments), vec!["One two three.", "Four. Five."]);
    }

    #[test]
    fn splits_heaviest_segment_at_middle_sentence() {
        let segments = segment_script(
            "One. Two words. Three words here. Four words right here.",
            &plan(2, 60.0, 100.0, 1.0),
        )
        .unwrap();
        assert_eq!(
            texts(&segments),
            vec!["One. Two words.", "Three words here. Four words right here."]
        );
    }

    #[test]
    fn split_skips_single_sentence_segments() {
        // Packing yields ["Alpha beta gamma delta epsilon.", "One. Two."]; the
        // heavier segment cannot be split so the lighter one is.
        let segments = segment_script(
            "Alpha beta gamma delta epsilon. One. Two.",
            &plan(3, 60.0, 2.0, 1.0),
        )
        .unwrap();
        assert_eq!(
            texts(&segments),
            vec!["Alpha beta gamma delta epsilon.", "One.", "Two."]
        );
    }

    #[test]
    fn single_long_sentence_cannot_reach_three_segments() {
        let sentence = format!("{}.", vec!["word"; 200].join(" "));
        let err = segment_script(&sentence, &plan(3, 5.0, 150.0, 0.9)).unwrap_err();
        assert_eq!(
            err,
            SegmentError::Unconvergeable {
                requested: 3,
                reached: 1,
            }
        );
    }

    #[test]
    fn rejects_invalid_input() {
        let good = plan(3, 5.0, 150.0, 0.9);
        assert!(matches!(
            segment_script("   ", &good),
            Err(SegmentError::InvalidInput(_))
        ));
        for bad in [
            plan(0, 5.0, 150.0, 0.9),
            plan(3, 0.0, 150.0, 0.9),
            plan(3, 5.0, -1.0, 0.9),
            plan(3, 5.0, 150.0, 0.0),
            plan(3, 5.0, 150.0, 1.5),
            plan(3, f64::NAN, 150.0, 0.9),
        ] {
            assert!(
                matches!(
                    segment_script("Some text.", &bad),
                    Err(SegmentError::InvalidInput(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn preserves_sentences_count_indices_and_times() {
        let script = sample_script();
        for num_segments in 1..=11 {
            let p = plan(num_segments, 5.0, 150.0, 0.9);
            let segments = segment_script(&script, &p).unwrap();

            assert_eq!(segments.len(), num_segments);

            let joined = texts(&segments).join(" ");
            assert_eq!(split_sentences(&joined), split_sentences(&script));

            for (i, segment) in segments.iter().enumerate() {
                assert_eq!(segment.index, i + 1);
                assert!(segment.word_count >= 1);
                assert_eq!(segment.word_count, word_count(&segment.text));
                assert_eq!(segment.end_time - segment.start_time, 5.0);
                assert_eq!(segment.start_time, i as f64 * 5.0);
                assert_eq!(segment.duration, 5.0);
                assert_eq!(segment.timing_status, None);
            }
            for pair in segments.windows(2) {
                assert_eq!(pair[0].end_time, pair[1].start_time);
            }
        }
    }

    #[test]
    fn more_segments_than_sentences_is_unconvergeable() {
        let err = segment_script("One. Two.", &plan(3, 5.0, 150.0, 0.9)).unwrap_err();
        assert_eq!(
            err,
            SegmentError::Unconvergeable {
                requested: 3,
                reached: 2,
            }
        );
    }

    #[test]
    fn is_deterministic() {
        let script = sample_script();
        let p = plan(6, 5.0, 150.0, 0.9);
        assert_eq!(
            segment_script(&script, &p).unwrap(),
            segment_script(&script, &p).unwrap()
        );
    }

    #[test]
    fn independent_calls_run_on_many_threads() {
        let script = sample_script();
        let expected = segment_script(&script, &plan(4, 5.0, 150.0, 0.9)).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let script = script.clone();
                std::thread::spawn(move || segment_script(&script, &plan(4, 5.0, 150.0, 0.9)))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), expected);
        }
    }
}
