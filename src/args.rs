use clap::Parser;
use std::path::PathBuf;

/// Turn a topic into a narrated, segment-timed explainer video.
#[derive(Parser, Debug)]
#[command(name = "prompt2video", version)]
pub struct Args {
    /// What the video should explain, e.g. "how docker works"
    pub topic: String,

    /// YAML configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Total video length in seconds
    #[clap(long)]
    pub duration: Option<f64>,

    /// Length of every segment in seconds
    #[clap(long)]
    pub segment_duration: Option<f64>,

    /// Assumed narration speed
    #[clap(long)]
    pub wpm: Option<f64>,

    /// Fraction of each segment narration may fill
    #[clap(long)]
    pub buffer: Option<f64>,

    #[clap(long)]
    pub out_dir: Option<PathBuf>,

    #[clap(long)]
    pub tone: Option<String>,

    #[clap(long)]
    pub metaphor: Option<String>,

    #[clap(long)]
    pub seed: Option<i64>,

    #[clap(long)]
    pub piper_model: Option<String>,

    /// Narration text to use instead of generating one
    #[clap(long)]
    pub script_file: Option<PathBuf>,

    /// Generate and mix background music
    #[clap(long, default_value_t = false)]
    pub music: bool,

    /// Upload the final artifacts
    #[clap(long, default_value_t = false)]
    pub publish: bool,

    /// Call real services instead of writing placeholders
    #[clap(long, default_value_t = false)]
    pub live: bool,

    /// Stop after segmentation and write the planning documents only
    #[clap(long, default_value_t = false)]
    pub segment_only: bool,
}
