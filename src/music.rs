use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::write_silence;
use crate::config::Config;
use crate::render::{GenerationReply, download_to};

/// Topic keyword groups and the musical style and mood each maps to.
const STYLES: &[(&[&str], &str, &str)] = &[
    (
        &["technology", "tech", "software", "computer", "digital", "ai"],
        "ambient electronic, tech house, futuristic",
        "innovative, forward-thinking",
    ),
    (
        &["science", "biology", "chemistry", "physics", "nature"],
        "atmospheric, orchestral, documentary",
        "wonder, discovery",
    ),
    (
        &["business", "finance", "corporate", "management"],
        "corporate, uplifting, professional",
        "confident, productive",
    ),
    (
        &["health", "medical", "medicine", "wellness"],
        "calming, healing, ambient",
        "peaceful, reassuring",
    ),
    (
        &["history", "ancient", "classical", "traditional"],
        "orchestral, period-appropriate, cinematic",
        "epic, timeless",
    ),
];

pub fn music_prompt(topic: &str, tone: &str) -> String {
    let words: Vec<String> = topic
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();

    let (style, mood) = STYLES
        .iter()
        .find(|(keys, _, _)| keys.iter().any(|k| words.iter().any(|w| w == k)))
        .map(|(_, style, mood)| (*style, *mood))
        .unwrap_or(("ambient, educational, modern", "engaging, clear"));

    match tone {
        "epic" => format!("{style}, epic cinematic, {mood}, dramatic builds"),
        "playful" => format!("{style}, upbeat, playful, {mood}, light and fun"),
        "professional" => format!("{style}, {mood}, sophisticated, subtle"),
        _ => format!("{style}, {mood}, clear, supportive, not distracting"),
    }
}

#[derive(Debug, Serialize)]
struct MusicRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    duration: f64,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

/// Produces a background track for the whole video. Returns `None` when
/// music is disabled or generation fails; the narration is then used alone.
pub async fn generate_music(topic: &str, config: &Config, out_dir: &Path) -> Option<PathBuf> {
    if !config.music.enabled {
        return None;
    }
    let path = out_dir.join("background_music.wav");
    let prompt = music_prompt(topic, &config.project.tone);
    info!("Music prompt: {}", prompt);

    let result = if config.services.use_stubs {
        debug!("[stub] music for {:.0}s", config.video.total_duration);
        write_silence(&path, config.video.total_duration)
    } else {
        request_music(&prompt, config, &path).await
    };

    match result {
        Ok(()) => Some(path),
        Err(e) => {
            warn!("Background music generation failed, continuing without it: {e:#}");
            None
        }
    }
}

async fn request_music(prompt: &str, config: &Config, path: &Path) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let reply: GenerationReply = client
        .post(&config.music.endpoint)
        .json(&MusicRequest {
            model: &config.music.model,
            prompt,
            duration: config.video.total_duration,
            format: "wav",
            seed: config.project.seed,
        })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("Unexpected music service response")?;
    download_to(&client, &reply.url, path).await
}

fn mix_args(voice: &Path, music: &Path, out: &Path, volume: f64) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        voice.display().to_string(),
        "-i".into(),
        music.display().to_string(),
        "-filter_complex".into(),
        format!("[1:a]volume={volume}[music];[0:a][music]amix=inputs=2:duration=shortest"),
        "-ac".into(),
        "2".into(),
        out.display().to_string(),
    ]
}

/// Lays `music` under `voice`. Falls back to a copy of the narration if ffmpeg fails.
pub fn mix_tracks(voice: &Path, music: &Path, out: &Path, volume: f64) -> anyhow::Result<PathBuf> {
    info!("Mixing music at volume {} under narration", volume);
    let status = Command::new("ffmpeg")
        .args(mix_args(voice, music, out, volume))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(s) if s.success() => Ok(out.to_path_buf()),
        other => {
            warn!("ffmpeg audio mix failed ({other:?}); using narration only");
            fs::copy(voice, out).with_context(|| {
                format!("Failed to copy {} to {}", voice.display(), out.display())
            })?;
            Ok(out.to_path_buf())
        }
    }
}
