use std::fmt::{self, Write as _};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::script::TextGenerator;
use crate::segment::Segment;
use crate::utils::{clean_prompt, truncate_chars};

const OPENING_HINT: &str = "Start with an establishing shot.";
const CLOSING_HINT: &str = "End with a concluding visual that summarizes the concept.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualSegment {
    #[serde(flatten)]
    pub segment: Segment,
    pub visual_prompt: String,
    pub transition_in: Option<String>,
    pub transition_out: Option<String>,
}

struct SceneContext<'a> {
    topic: &'a str,
    theme: &'a str,
    segment: &'a Segment,
    total: usize,
    previous: Option<&'a str>,
    next: Option<&'a str>,
    tone: &'a str,
    metaphor: Option<&'a str>,
}

pub fn theme_prompt(topic: &str, segments: &[Segment], config: &Config) -> String {
    let style = match &config.project.metaphor_world {
        Some(metaphor) => format!("Use the metaphor of {metaphor} throughout."),
        None => "Use clear, literal visuals.".to_string(),
    };
    format!(
        "Define a consistent visual style for a video explaining \"{topic}\".\n\n\
         The video will have {count} scenes, each {duration} seconds long.\n\
         {style}\n\
         Tone: {tone}\n\n\
         Describe:\n\
         1. Overall visual style (realistic, animated, abstract, etc.)\n\
         2. Color palette\n\
         3. Key visual elements to repeat across scenes\n\
         4. How to show progression/continuity\n\n\
         Keep it brief and actionable.",
        count = segments.len(),
        duration = config.video.segment_duration,
        tone = config.project.tone,
    )
}

fn scene_prompt(ctx: &SceneContext<'_>) -> String {
    let mut prompt = format!(
        "Create a {duration}-second video scene prompt.\n\n\
         Narration for this segment: \"{text}\"\n\n\
         This is scene {n} of {total}.\n\
         Overall topic: {topic}\n\
         Visual theme: {theme}\n\
         Tone: {tone}\n",
        duration = ctx.segment.duration,
        text = ctx.segment.text,
        n = ctx.segment.index,
        total = ctx.total,
        topic = ctx.topic,
        theme = ctx.theme,
        tone = ctx.tone,
    );
    match ctx.metaphor {
        Some(metaphor) => prompt.push_str(&format!("Metaphor: {metaphor}\n")),
        None => prompt.push_str("Style: Literal/educational\n"),
    }
    if let Some(previous) = ctx.previous {
        prompt.push_str(&format!("Previous narration: \"{previous}\"\n"));
    }
    if let Some(next) = ctx.next {
        prompt.push_str(&format!("Next narration: \"{next}\"\n"));
    }
    prompt.push_str(&format!(
        "\nRequirements:\n\
         - Directly illustrate what's being said in the narration\n\
         - Maintain visual continuity with the theme\n\
         - Include motion/animation appropriate for {} seconds\n\
         - Be specific about camera angles, movements, and key visual elements\n\n\
         Write a concise, specific prompt for video generation:",
        ctx.segment.duration
    ));
    prompt
}

/// Produces the shared visual theme and one cleaned visual prompt per
/// segment. A failed generator call yields a literal fallback prompt built
/// from the narration rather than aborting the run.
pub async fn generate_visuals(
    generator: &dyn TextGenerator,
    topic: &str,
    segments: &[Segment],
    config: &Config,
) -> (String, Vec<VisualSegment>) {
    let theme = match generator.complete(&theme_prompt(topic, segments, config)).await {
        Ok(theme) => theme,
        Err(e) => {
            warn!("Visual theme generation failed, using a plain theme: {e:#}");
            format!("Clean, literal illustrations of {topic}")
        }
    };

    let mut visuals = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        let ctx = SceneContext {
            topic,
            theme: &theme,
            segment,
            total: segments.len(),
            previous: i.checked_sub(1).map(|p| segments[p].text.as_str()),
            next: segments.get(i + 1).map(|s| s.text.as_str()),
            tone: &config.project.tone,
            metaphor: config.project.metaphor_world.as_deref(),
        };
        let raw = match generator.complete(&scene_prompt(&ctx)).await {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Visual prompt for segment {} failed: {e:#}", segment.index);
                format!("Illustrate: {}", segment.text)
            }
        };
        debug!(
            "Segment {} visual: {}",
            segment.index,
            truncate_chars(&raw, 80)
        );
        visuals.push(VisualSegment {
            segment: segment.clone(),
            visual_prompt: clean_prompt(&raw),
            transition_in: None,
            transition_out: None,
        });
    }

    add_transitions(&mut visuals);
    (theme, visuals)
}

/// Marks cuts between neighbours and frames the opening and closing scenes.
pub fn add_transitions(visuals: &mut [VisualSegment]) {
    let last = visuals.len().saturating_sub(1);
    for (i, visual) in visuals.iter_mut().enumerate() {
        visual.transition_in = (i > 0).then(|| "smooth cut".to_string());
        visual.transition_out = (i < last).then(|| "smooth cut".to_string());
        let hint = if i == 0 {
            OPENING_HINT
        } else if i == last {
            CLOSING_HINT
        } else {
            continue;
        };
        if !visual.visual_prompt.ends_with(hint) {
            visual.visual_prompt = format!("{} {hint}", visual.visual_prompt);
        }
    }
}

pub fn storyboard_summary(topic: &str, visuals: &[VisualSegment]) -> Result<String, fmt::Error> {
    let total: f64 = visuals.iter().map(|v| v.segment.duration).sum();
    let mut out = format!("# Storyboard: {topic}\n\n");
    writeln!(out, "Total Duration: {total} seconds")?;
    writeln!(out, "Segments: {}\n", visuals.len())?;

    for visual in visuals {
        let seg = &visual.segment;
        writeln!(
            out,
            "## Scene {} [{:02.0}:{:02.0}]",
            seg.index, seg.start_time, seg.end_time
        )?;
        writeln!(out, "**Narration:** {}", truncate_chars(&seg.text, 100))?;
        writeln!(out, "**Visuals:** {}", visual.visual_prompt)?;
        writeln!(
            out,
            "**Words:** {} | **Duration:** {}s\n",
            seg.word_count, seg.duration
        )?;
    }
    Ok(out)
}
