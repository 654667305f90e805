use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::utils::truncate_chars;
use crate::visuals::VisualSegment;

/// Reply shape shared by the generation services: where to fetch the result.
#[derive(Debug, Deserialize)]
pub struct GenerationReply {
    pub url: String,
}

#[derive(Debug, Serialize)]
struct VideoRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    duration: f64,
    fps: u32,
    aspect_ratio: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

pub async fn download_to(client: &reqwest::Client, url: &str, path: &Path) -> anyhow::Result<()> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    fs::write(path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Downloaded {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

pub fn clip_path(segments_dir: &Path, index: usize) -> PathBuf {
    segments_dir.join(format!("segment_{index:02}.mp4"))
}

/// Per-segment seed so clips differ but stay reproducible.
fn segment_seed(base: Option<i64>, index: usize) -> Option<i64> {
    base.map(|seed| seed + index as i64)
}

/// Renders one clip per segment, in index order. A clip that cannot be
/// generated is replaced by a placeholder file so composition can proceed.
pub async fn render_segments(
    visuals: &[VisualSegment],
    config: &Config,
    out_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let segments_dir = out_dir.join("segments");
    fs::create_dir_all(&segments_dir)
        .with_context(|| format!("Failed to create {}", segments_dir.display()))?;

    let client = reqwest::Client::new();
    let api_key = std::env::var(&config.services.video_api_key_env).ok();
    let mut clips = Vec::with_capacity(visuals.len());

    for visual in visuals {
        let index = visual.segment.index;
        let path = clip_path(&segments_dir, index);
        info!("Rendering segment {}/{}", index, visuals.len());

        if config.services.use_stubs {
            debug!("[stub] placeholder clip {}", path.display());
            write_placeholder_clip(&path, visual)?;
        } else if let Err(e) =
            request_clip(&client, api_key.as_deref(), visual, config, &path).await
        {
            warn!("Segment {} render failed, writing placeholder: {e:#}", index);
            write_placeholder_clip(&path, visual)?;
        }
        clips.push(path);
    }
    Ok(clips)
}

fn write_placeholder_clip(path: &Path, visual: &VisualSegment) -> anyhow::Result<()> {
    let note = format!(
        "Segment {}: {}",
        visual.segment.index,
        truncate_chars(&visual.visual_prompt, 50)
    );
    fs::write(path, note).with_context(|| format!("Failed to write {}", path.display()))
}

async fn request_clip(
    client: &reqwest::Client,
    api_key: Option<&str>,
    visual: &VisualSegment,
    config: &Config,
    path: &Path,
) -> anyhow::Result<()> {
    let body = VideoRequest {
        model: &config.services.video_model,
        prompt: &visual.visual_prompt,
        duration: visual.segment.duration,
        fps: config.video.fps,
        aspect_ratio: &config.video.aspect_ratio,
        seed: segment_seed(config.project.seed, visual.segment.index),
    };
    let mut request = client.post(&config.services.video_endpoint).json(&body);
    if let Some(key) = api_key {
        request = request.header(AUTHORIZATION, format!("Bearer {key}"));
    }
    let reply: GenerationReply = request
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("Unexpected video service response")?;
    download_to(client, &reply.url, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::segment_script;
    use pretty_assertions::assert_eq;

    #[test]
    fn seeds_vary_per_segment() {
        assert_eq!(segment_seed(Some(42), 3), Some(45));
        assert_eq!(segment_seed(None, 3), None);
    }

    #[test]
    fn clip_names_are_zero_padded() {
        assert_eq!(
            clip_path(Path::new("out/segments"), 7),
            PathBuf::from("out/segments/segment_07.mp4")
        );
    }

    #[tokio::test]
    async fn stub_mode_writes_placeholders_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.video.total_duration = 10.0;
        let segments =
            segment_script("First idea here. Second idea here.", &config.segment_plan()).unwrap();
        let visuals: Vec<VisualSegment> = segments
            .into_iter()
            .map(|segment| VisualSegment {
                visual_prompt: format!("Shot of idea {}.", segment.index),
                segment,
                transition_in: None,
                transition_out: None,
            })
            .collect();

        let clips = render_segments(&visuals, &config, dir.path()).await.unwrap();
        assert_eq!(
            clips,
            vec![
                dir.path().join("segments/segment_01.mp4"),
                dir.path().join("segments/segment_02.mp4"),
            ]
        );
        assert_eq!(
            fs::read_to_string(&clips[1]).unwrap(),
            "Segment 2: Shot of idea 2."
        );
    }
}
