use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audio::wav_duration_seconds;
use crate::compose::compose_or_placeholder;
use crate::config::Config;
use crate::dashboard::{DashboardData, PromptRecord, write_dashboard};
use crate::music::{generate_music, mix_tracks, music_prompt};
use crate::publish::Publisher;
use crate::render::render_segments;
use crate::script::{TextGenerator, generate_script, placeholder_script, script_prompt};
use crate::segment::{Segment, TimingStatus, segment_script};
use crate::subtitle::{build_cues, write_srt};
use crate::timing::{estimate_line_timing, validate_timing};
use crate::tts::{placeholder_narration, synthesize_narration};
use crate::utils::split_sentences;
use crate::visuals::{generate_visuals, storyboard_summary, theme_prompt};

const STEPS: usize = 10;

/// Paths of everything a run produced, in the order they were made.
#[derive(Debug, Default, Serialize)]
pub struct Artifacts {
    pub script: PathBuf,
    pub timed_script: PathBuf,
    pub segments: PathBuf,
    pub captions: PathBuf,
    pub transcript: PathBuf,
    pub storyboard: Option<PathBuf>,
    pub narration: Option<PathBuf>,
    pub music: Option<PathBuf>,
    pub audio: Option<PathBuf>,
    pub clips: Vec<PathBuf>,
    pub video: Option<PathBuf>,
    pub published: Vec<String>,
    pub dashboard: Option<PathBuf>,
    pub dashboard_data: Option<PathBuf>,
    pub segment_count: usize,
    pub timing_warnings: usize,
}

/// Fixed, linear sequence of stages from topic to finished video.
pub struct Pipeline<'a> {
    config: &'a Config,
    generator: Box<dyn TextGenerator>,
    publisher: Option<Box<dyn Publisher>>,
}

fn step(n: usize, name: &str) -> Instant {
    info!("Step {}/{}: {}", n, STEPS, name);
    Instant::now()
}

fn done(name: &str, started: Instant) {
    info!(
        "{} completed in {:.2}s",
        name,
        started.elapsed().as_secs_f64()
    );
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        generator: Box<dyn TextGenerator>,
        publisher: Option<Box<dyn Publisher>>,
    ) -> Self {
        Self {
            config,
            generator,
            publisher,
        }
    }

    /// Runs every stage. With `segment_only` the run stops once the
    /// planning documents are written.
    pub async fn run(
        &self,
        topic: &str,
        script_override: Option<String>,
        segment_only: bool,
    ) -> anyhow::Result<Artifacts> {
        let started = Instant::now();
        let config = self.config;
        let out_dir = config.output.directory.as_path();
        let mut prompts = Vec::new();
        fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

        let t = step(1, "Script");
        let script = match script_override {
            Some(text) => {
                info!("Using provided narration ({} chars)", text.len());
                text
            }
            None if config.services.use_stubs => placeholder_script(topic, config),
            None => {
                let prompt = script_prompt(topic, config);
                prompts.push(PromptRecord::new(
                    "Script Generation",
                    &config.services.llm_model,
                    &prompt,
                ));
                generate_script(self.generator.as_ref(), topic, config).await?
            }
        };
        info!("Script preview: {:.120}", script.replace('\n', " "));
        done("Script", t);

        let t = step(2, "Segmentation and timing");
        let segments = segment_script(&script, &config.segment_plan())?;
        let segments = validate_timing(&segments, &config.speech_rate());
        let timing_warnings = report_timing(&segments);
        info!(
            "{} segments of {}s, {} with timing warnings",
            segments.len(),
            config.video.segment_duration,
            timing_warnings
        );
        done("Segmentation", t);

        let mut artifacts = self.write_plan(topic, &script, &segments, out_dir)?;
        artifacts.segment_count = segments.len();
        artifacts.timing_warnings = timing_warnings;
        if segment_only {
            info!("Segment-only run; stopping after planning documents");
            return Ok(artifacts);
        }

        let t = step(3, "Visual prompts");
        prompts.push(PromptRecord::new(
            "Visual Theme",
            &config.services.llm_model,
            &theme_prompt(topic, &segments, config),
        ));
        let (theme, visuals) =
            generate_visuals(self.generator.as_ref(), topic, &segments, config).await;
        debug!("Visual theme: {}", theme);
        let storyboard = out_dir.join("STORYBOARD.md");
        let summary = storyboard_summary(topic, &visuals)
            .context("Failed to render storyboard")?;
        write_file(&storyboard, &summary)?;
        artifacts.storyboard = Some(storyboard);
        done("Visual prompts", t);

        let t = step(4, "Narration");
        let narration = out_dir.join("narration.wav");
        self.narrate(&script, &narration)?;
        artifacts.narration = Some(narration.clone());
        done("Narration", t);

        let t = step(5, "Background music");
        let music = generate_music(topic, config, out_dir).await;
        if config.music.enabled {
            prompts.push(PromptRecord::new(
                "Background Music",
                &config.music.model,
                &music_prompt(topic, &config.project.tone),
            ));
        }
        artifacts.music = music.clone();
        done("Background music", t);

        let t = step(6, "Audio mix");
        let audio = match &music {
            Some(track) if !config.services.use_stubs => mix_tracks(
                &narration,
                track,
                &out_dir.join("final_audio.wav"),
                config.music.volume,
            )?,
            Some(_) => {
                debug!("[stub] skipping mix, narration used as final audio");
                narration.clone()
            }
            None => narration.clone(),
        };
        artifacts.audio = Some(audio.clone());
        done("Audio mix", t);

        let t = step(7, "Segment rendering");
        let clips = render_segments(&visuals, config, out_dir).await?;
        artifacts.clips = clips.clone();
        done("Segment rendering", t);

        let t = step(8, "Composition");
        let video = compose_or_placeholder(
            &clips,
            &audio,
            out_dir,
            &out_dir.join("final_video.mp4"),
            config.services.use_stubs,
        )?;
        artifacts.video = Some(video.clone());
        done("Composition", t);

        let t = step(9, "Publishing");
        match &self.publisher {
            Some(publisher) => {
                for path in [&video, &audio] {
                    match publisher.publish(path).await {
                        Ok(reference) => artifacts.published.push(reference),
                        Err(e) => warn!("Publishing {} failed: {e:#}", path.display()),
                    }
                }
            }
            None => info!("Publishing disabled"),
        }
        done("Publishing", t);

        let t = step(10, "Dashboard");
        let data = DashboardData::collect(topic, config, &visuals, prompts, started.elapsed());
        let (data_path, html_path) = write_dashboard(&data, out_dir)?;
        artifacts.dashboard_data = Some(data_path);
        artifacts.dashboard = Some(html_path);
        done("Dashboard", t);

        info!("Run finished in {:.1}s", started.elapsed().as_secs_f64());
        Ok(artifacts)
    }

    fn narrate(&self, script: &str, out: &Path) -> anyhow::Result<()> {
        let config = self.config;
        if config.services.use_stubs {
            placeholder_narration(script, config.timing.words_per_minute, out)?;
        } else if let Err(e) = synthesize_narration(&config.services.piper_model, script, out) {
            warn!("Narration synthesis failed, using silent placeholder: {e:#}");
            placeholder_narration(script, config.timing.words_per_minute, out)?;
        }

        match wav_duration_seconds(out) {
            Ok(seconds) => {
                let drift = (seconds - config.video.total_duration).abs();
                if drift > config.video.segment_duration {
                    warn!(
                        "Narration runs {:.1}s against a {:.0}s video",
                        seconds, config.video.total_duration
                    );
                } else {
                    info!("Narration length {:.1}s", seconds);
                }
            }
            Err(e) => warn!("Could not measure narration length: {e:#}"),
        }
        Ok(())
    }

    fn write_plan(
        &self,
        topic: &str,
        script: &str,
        segments: &[Segment],
        out_dir: &Path,
    ) -> anyhow::Result<Artifacts> {
        let config = self.config;

        let script_path = out_dir.join("SCRIPT.md");
        write_file(&script_path, &format!("# {topic}\n\n{}\n", script.trim()))?;

        let timed_path = out_dir.join("TIMED_SCRIPT.md");
        write_file(&timed_path, &timed_script(script, segments, config)?)?;

        let segments_path = out_dir.join("segments.json");
        write_file(&segments_path, &serde_json::to_string_pretty(segments)?)?;

        let captions = out_dir.join("captions.srt");
        write_srt(&captions, &build_cues(segments, &config.speech_rate()))?;

        let transcript = out_dir.join("transcript.txt");
        let lines: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        write_file(&transcript, &format!("{}\n", lines.join("\n")))?;

        Ok(Artifacts {
            script: script_path,
            timed_script: timed_path,
            segments: segments_path,
            captions,
            transcript,
            ..Artifacts::default()
        })
    }
}

fn report_timing(segments: &[Segment]) -> usize {
    let mut warnings = 0;
    for segment in segments {
        if let Some(warning) = &segment.warning {
            warn!("Segment {}: {}", segment.index, warning);
            warnings += 1;
        }
    }
    warnings
}

fn status_label(status: Option<TimingStatus>) -> &'static str {
    match status {
        Some(TimingStatus::Ok) => "ok",
        Some(TimingStatus::TooManyWords) => "too many words",
        Some(TimingStatus::TooFewWords) => "too few words",
        None => "unchecked",
    }
}

fn timed_script(script: &str, segments: &[Segment], config: &Config) -> anyhow::Result<String> {
    let mut out = String::from("# Timed script\n\n");
    for segment in segments {
        writeln!(
            out,
            "- [{:.1}s - {:.1}s] {} ({} words): {}",
            segment.start_time,
            segment.end_time,
            status_label(segment.timing_status),
            segment.word_count,
            segment.text
        )?;
    }

    out.push_str("\n## Sentence pacing\n\n");
    let sentences = split_sentences(script);
    let pacing = estimate_line_timing(
        &sentences,
        config.timing.words_per_minute,
        config.timing.min_line_seconds,
    )?;
    for line in pacing {
        writeln!(out, "{:.2}s: {}", line.seconds, line.line)?;
    }
    Ok(out)
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentError;
    use crate::publish::DryRunPublisher;
    use crate::script::StubGenerator;
    use pretty_assertions::assert_eq;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.output.directory = dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn stub_run_produces_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.music.enabled = true;
        let publisher = DryRunPublisher {
            bucket: "renders".into(),
            prefix: "videos".into(),
            run_id: "how-dns-works".into(),
        };
        let pipeline = Pipeline::new(
            &config,
            Box::new(StubGenerator),
            Some(Box::new(publisher)),
        );

        let artifacts = pipeline.run("how DNS works", None, false).await.unwrap();

        assert_eq!(artifacts.segment_count, 9);
        assert_eq!(artifacts.timing_warnings, 0);
        assert_eq!(artifacts.clips.len(), 9);
        assert_eq!(
            artifacts.clips[0],
            dir.path().join("segments/segment_01.mp4")
        );
        for path in [
            &artifacts.script,
            &artifacts.timed_script,
            &artifacts.segments,
            &artifacts.captions,
            &artifacts.transcript,
        ] {
            assert!(path.exists(), "{} missing", path.display());
        }
        assert!(artifacts.storyboard.as_ref().unwrap().exists());
        assert!(artifacts.music.as_ref().unwrap().exists());
        assert_eq!(artifacts.audio, artifacts.narration);
        assert!(artifacts.video.as_ref().unwrap().exists());
        assert_eq!(
            artifacts.published,
            vec![
                "s3://renders/videos/how-dns-works/final_video.mp4",
                "s3://renders/videos/how-dns-works/narration.wav",
            ]
        );

        let transcript = fs::read_to_string(&artifacts.transcript).unwrap();
        assert_eq!(transcript.lines().count(), 9);

        let data_path = artifacts.dashboard_data.as_ref().unwrap();
        assert_eq!(data_path, &dir.path().join("dashboard_data.json"));
        assert!(artifacts.dashboard.as_ref().unwrap().exists());
        let data: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(data_path).unwrap()).unwrap();
        assert_eq!(data["project_name"], "how-dns-works");
        assert_eq!(data["segment_count"], 9);
        assert_eq!(data["segments"].as_array().unwrap().len(), 9);
        assert_eq!(data["music_model"], "musicgen");
        let kinds: Vec<&str> = data["prompts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["Visual Theme", "Background Music"]);
    }

    #[tokio::test]
    async fn segment_only_stops_after_planning() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.video.total_duration = 10.0;
        let pipeline = Pipeline::new(&config, Box::new(StubGenerator), None);

        let artifacts = pipeline
            .run(
                "tides",
                Some(
                    "The moon pulls the ocean. Water bulges toward it. Coasts see high tide."
                        .into(),
                ),
                true,
            )
            .await
            .unwrap();

        assert_eq!(artifacts.segment_count, 2);
        assert_eq!(artifacts.storyboard, None);
        assert_eq!(artifacts.dashboard, None);
        assert!(artifacts.clips.is_empty());
        assert!(!dir.path().join("segments").exists());

        let timed = fs::read_to_string(&artifacts.timed_script).unwrap();
        assert!(timed.contains(
            "- [0.0s - 5.0s] ok (9 words): The moon pulls the ocean. Water bulges toward it.\n"
        ));
        assert!(timed.contains(
            "- [5.0s - 10.0s] too few words (4 words): Coasts see high tide.\n"
        ));
        assert!(timed.contains("## Sentence pacing"));
        assert!(timed.contains("2.00s: The moon pulls the ocean."));
    }

    #[tokio::test]
    async fn unconvergeable_script_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let pipeline = Pipeline::new(&config, Box::new(StubGenerator), None);

        let err = pipeline
            .run("anything", Some("Only two. Sentences here.".into()), false)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<SegmentError>(),
            Some(&SegmentError::Unconvergeable {
                requested: 9,
                reached: 2,
            })
        );
    }
}
