use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::utils::{slugify, truncate_chars};
use crate::visuals::VisualSegment;

const PROMPT_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSegment {
    pub index: usize,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub words: usize,
    pub visual_prompt: String,
}

/// A prompt sent to one of the generation services during the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub model: String,
    pub content: String,
}

impl PromptRecord {
    pub fn new(kind: &str, model: &str, content: &str) -> Self {
        Self {
            kind: kind.to_string(),
            model: short_model_name(model),
            content: truncate_chars(content, PROMPT_PREVIEW_CHARS),
        }
    }
}

/// Summary of a finished run, written next to the video as JSON and HTML.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    pub project_name: String,
    pub topic: String,
    pub timestamp: String,
    pub total_duration: f64,
    pub segment_count: usize,
    pub segment_duration: f64,
    pub total_words: usize,
    /// Wall-clock seconds, one decimal.
    pub generation_time: f64,
    pub script_model: String,
    pub voice_model: String,
    pub video_model: String,
    pub music_model: Option<String>,
    pub tone: String,
    pub metaphor_world: Option<String>,
    pub segments: Vec<DashboardSegment>,
    pub prompts: Vec<PromptRecord>,
}

impl DashboardData {
    pub fn collect(
        topic: &str,
        config: &Config,
        visuals: &[VisualSegment],
        prompts: Vec<PromptRecord>,
        elapsed: Duration,
    ) -> Self {
        let segments: Vec<DashboardSegment> = visuals
            .iter()
            .map(|visual| DashboardSegment {
                index: visual.segment.index,
                text: visual.segment.text.clone(),
                start_time: visual.segment.start_time,
                end_time: visual.segment.end_time,
                words: visual.segment.word_count,
                visual_prompt: visual.visual_prompt.clone(),
            })
            .collect();

        let voice_model = Path::new(&config.services.piper_model)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.services.piper_model.clone());

        Self {
            project_name: slugify(topic),
            topic: topic.to_string(),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            total_duration: config.video.total_duration,
            segment_count: segments.len(),
            segment_duration: config.video.segment_duration,
            total_words: segments.iter().map(|s| s.words).sum(),
            generation_time: (elapsed.as_secs_f64() * 10.0).round() / 10.0,
            script_model: short_model_name(&config.services.llm_model),
            voice_model,
            video_model: short_model_name(&config.services.video_model),
            music_model: config
                .music
                .enabled
                .then(|| short_model_name(&config.music.model)),
            tone: config.project.tone.clone(),
            metaphor_world: config.project.metaphor_world.clone(),
            segments,
            prompts,
        }
    }
}

/// `"google/veo-3"` -> `"veo-3"`.
pub fn short_model_name(model: &str) -> String {
    model.rsplit('/').next().unwrap_or(model).to_string()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_html(data: &DashboardData) -> Result<String, fmt::Error> {
    let mut html = String::new();
    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"en\">")?;
    writeln!(html, "<head>")?;
    writeln!(html, "<meta charset=\"utf-8\">")?;
    writeln!(html, "<title>{}</title>", escape_html(&data.project_name))?;
    writeln!(
        html,
        "<style>body{{font-family:sans-serif;margin:2em}}\
         table{{border-collapse:collapse}}\
         td,th{{border:1px solid #ccc;padding:4px 8px;vertical-align:top}}</style>"
    )?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;
    writeln!(html, "<h1>{}</h1>", escape_html(&data.topic))?;
    writeln!(
        html,
        "<p>Generated {} in {:.1}s</p>",
        data.timestamp, data.generation_time
    )?;

    writeln!(html, "<h2>Overview</h2>")?;
    writeln!(html, "<ul>")?;
    writeln!(html, "<li>Duration: {}s</li>", data.total_duration)?;
    writeln!(
        html,
        "<li>Segments: {} x {}s</li>",
        data.segment_count, data.segment_duration
    )?;
    writeln!(html, "<li>Words: {}</li>", data.total_words)?;
    writeln!(html, "<li>Tone: {}</li>", escape_html(&data.tone))?;
    if let Some(metaphor) = &data.metaphor_world {
        writeln!(html, "<li>Metaphor: {}</li>", escape_html(metaphor))?;
    }
    writeln!(html, "</ul>")?;

    writeln!(html, "<h2>Models</h2>")?;
    writeln!(html, "<ul>")?;
    writeln!(html, "<li>Script: {}</li>", escape_html(&data.script_model))?;
    writeln!(html, "<li>Voice: {}</li>", escape_html(&data.voice_model))?;
    writeln!(html, "<li>Video: {}</li>", escape_html(&data.video_model))?;
    if let Some(music) = &data.music_model {
        writeln!(html, "<li>Music: {}</li>", escape_html(music))?;
    }
    writeln!(html, "</ul>")?;

    writeln!(html, "<h2>Segments</h2>")?;
    writeln!(html, "<table>")?;
    writeln!(
        html,
        "<tr><th>#</th><th>Time</th><th>Narration</th><th>Visual</th></tr>"
    )?;
    for segment in &data.segments {
        writeln!(
            html,
            "<tr><td>{}</td><td>{:.0}s - {:.0}s</td><td>{}</td><td>{}</td></tr>",
            segment.index,
            segment.start_time,
            segment.end_time,
            escape_html(&segment.text),
            escape_html(&segment.visual_prompt)
        )?;
    }
    writeln!(html, "</table>")?;

    if !data.prompts.is_empty() {
        writeln!(html, "<h2>Prompts</h2>")?;
        for prompt in &data.prompts {
            writeln!(
                html,
                "<h3>{} ({})</h3>",
                escape_html(&prompt.kind),
                escape_html(&prompt.model)
            )?;
            writeln!(html, "<pre>{}</pre>", escape_html(&prompt.content))?;
        }
    }

    writeln!(html, "</body>")?;
    writeln!(html, "</html>")?;
    Ok(html)
}

/// Writes `dashboard_data.json` and `dashboard.html` into `out_dir` and
/// returns their paths in that order.
pub fn write_dashboard(
    data: &DashboardData,
    out_dir: &Path,
) -> anyhow::Result<(PathBuf, PathBuf)> {
    let json_path = out_dir.join("dashboard_data.json");
    fs::write(&json_path, serde_json::to_string_pretty(data)?)
        .with_context(|| format!("Failed to write {}", json_path.display()))?;

    let html_path = out_dir.join("dashboard.html");
    let html = render_html(data).context("Failed to render dashboard")?;
    fs::write(&html_path, html)
        .with_context(|| format!("Failed to write {}", html_path.display()))?;

    info!("Dashboard generated at {}", html_path.display());
    Ok((json_path, html_path))
}
