use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::args::Args;
use crate::segment::SegmentPlan;
use crate::timing::SpeechRate;

/// Upper bound on `total_duration / segment_duration`.
pub const MAX_SEGMENTS: usize = 1000;

/// Run configuration. Built once in `main` from defaults, an optional YAML
/// file and CLI flags (in that order), then only ever borrowed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub video: VideoConfig,
    pub timing: TimingConfig,
    pub project: ProjectConfig,
    pub output: OutputConfig,
    pub services: ServicesConfig,
    pub music: MusicConfig,
    pub publish: PublishConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoConfig {
    pub total_duration: f64,
    pub segment_duration: f64,
    pub aspect_ratio: String,
    pub fps: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            total_duration: 45.0,
            segment_duration: 5.0,
            aspect_ratio: "16:9".into(),
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub words_per_minute: f64,
    pub buffer_percentage: f64,
    pub min_fill: f64,
    pub min_line_seconds: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            words_per_minute: 150.0,
            buffer_percentage: 0.9,
            min_fill: 0.7,
            min_line_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub tone: String,
    pub metaphor_world: Option<String>,
    pub seed: Option<i64>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            tone: "educational".into(),
            metaphor_world: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServicesConfig {
    /// Replace every external service with local placeholders.
    pub use_stubs: bool,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub llm_api_key_env: String,
    pub video_endpoint: String,
    pub video_model: String,
    pub video_api_key_env: String,
    pub piper_model: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            use_stubs: true,
            llm_endpoint: "https://api.openai.com/v1/chat/completions".into(),
            llm_model: "gpt-4o-mini".into(),
            llm_api_key_env: "LLM_API_KEY".into(),
            video_endpoint: "http://localhost:8088/v1/video".into(),
            video_model: "google/veo-3".into(),
            video_api_key_env: "VIDEO_API_KEY".into(),
            piper_model: "./tts/en_US-hfc_male-medium.onnx".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MusicConfig {
    pub enabled: bool,
    /// Music gain relative to the narration, 0.0 to 1.0.
    pub volume: f64,
    pub endpoint: String,
    pub model: String,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: 0.2,
            endpoint: "http://localhost:8088/v1/music".into(),
            model: "meta/musicgen".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishConfig {
    pub enabled: bool,
    pub bucket: String,
    pub prefix: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket: "prompt2video-renders".into(),
            prefix: "videos".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse configuration YAML")
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Defaults, then the file named by `--config`, then individual flags.
    pub fn resolve(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(v) = args.duration {
            self.video.total_duration = v;
        }
        if let Some(v) = args.segment_duration {
            self.video.segment_duration = v;
        }
        if let Some(v) = args.wpm {
            self.timing.words_per_minute = v;
        }
        if let Some(v) = args.buffer {
            self.timing.buffer_percentage = v;
        }
        if let Some(v) = &args.out_dir {
            self.output.directory = v.clone();
        }
        if let Some(v) = &args.tone {
            self.project.tone = v.clone();
        }
        if let Some(v) = &args.metaphor {
            self.project.metaphor_world = Some(v.clone());
        }
        if let Some(v) = args.seed {
            self.project.seed = Some(v);
        }
        if let Some(v) = &args.piper_model {
            self.services.piper_model = v.clone();
        }
        if args.music {
            self.music.enabled = true;
        }
        if args.publish {
            self.publish.enabled = true;
        }
        if args.live {
            self.services.use_stubs = false;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.video.total_duration > 0.0) {
            bail!("video.total_duration must be positive");
        }
        if !(self.video.segment_duration > 0.0) {
            bail!("video.segment_duration must be positive");
        }
        let ratio = self.video.total_duration / self.video.segment_duration;
        if ratio > MAX_SEGMENTS as f64 {
            bail!(
                "video.total_duration ({}) splits into more than {} segments of {}s",
                self.video.total_duration,
                MAX_SEGMENTS,
                self.video.segment_duration
            );
        }
        if self.num_segments() == 0 {
            bail!(
                "video.total_duration ({}) is shorter than one segment ({})",
                self.video.total_duration,
                self.video.segment_duration
            );
        }
        if !(self.timing.words_per_minute > 0.0) {
            bail!("timing.words_per_minute must be positive");
        }
        if !(self.timing.buffer_percentage > 0.0 && self.timing.buffer_percentage <= 1.0) {
            bail!("timing.buffer_percentage must be in (0, 1]");
        }
        if !(0.0..=1.0).contains(&self.timing.min_fill) {
            bail!("timing.min_fill must be in [0, 1]");
        }
        if self.timing.min_fill > self.timing.buffer_percentage {
            bail!(
                "timing.min_fill ({}) exceeds timing.buffer_percentage ({})",
                self.timing.min_fill,
                self.timing.buffer_percentage
            );
        }
        if !(0.0..=1.0).contains(&self.music.volume) {
            bail!("music.volume must be in [0, 1]");
        }
        Ok(())
    }

    pub fn num_segments(&self) -> usize {
        (self.video.total_duration / self.video.segment_duration).floor() as usize
    }

    /// Word budget for the whole narration at the configured speech rate.
    pub fn target_words(&self) -> usize {
        (self.video.total_duration / 60.0 * self.timing.words_per_minute).floor() as usize
    }

    pub fn segment_plan(&self) -> SegmentPlan {
        SegmentPlan::from_config(self)
    }

    pub fn speech_rate(&self) -> SpeechRate {
        SpeechRate {
            words_per_minute: self.timing.words_per_minute,
            buffer_fraction: self.timing.buffer_percentage,
            min_fill: self.timing.min_fill,
        }
    }
}
