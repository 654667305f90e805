mod args;
mod audio;
mod compose;
mod config;
mod dashboard;
mod error;
mod logging;
mod music;
mod pipeline;
mod publish;
mod render;
mod script;
mod segment;
mod subtitle;
mod timing;
mod tts;
mod utils;
mod visuals;

use std::fs;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::args::Args;
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::publish::{DryRunPublisher, Publisher, S3Publisher};
use crate::script::{ChatClient, StubGenerator, TextGenerator};
use crate::utils::slugify;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::resolve(&args)?;

    logging::init(&config.logging.level, &config.output.directory)?;

    info!("Starting video pipeline for {:?}", args.topic);
    info!(
        "{}s video in {} segments of {}s at {} wpm ({} mode)",
        config.video.total_duration,
        config.num_segments(),
        config.video.segment_duration,
        config.timing.words_per_minute,
        if config.services.use_stubs {
            "stub"
        } else {
            "live"
        }
    );

    let script = match &args.script_file {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read script file {}", path.display()))?,
        ),
        None => None,
    };

    let generator: Box<dyn TextGenerator> = if config.services.use_stubs {
        Box::new(StubGenerator)
    } else {
        Box::new(ChatClient::from_config(&config))
    };

    let run_id = slugify(&args.topic);
    let publisher: Option<Box<dyn Publisher>> =
        match (config.publish.enabled, config.services.use_stubs) {
            (false, _) => None,
            (true, true) => Some(Box::new(DryRunPublisher {
                bucket: config.publish.bucket.clone(),
                prefix: config.publish.prefix.clone(),
                run_id,
            })),
            (true, false) => {
                let s3 = S3Publisher::from_env(&config.publish, &run_id).await;
                Some(Box::new(s3))
            }
        };

    let pipeline = Pipeline::new(&config, generator, publisher);
    let artifacts = pipeline.run(&args.topic, script, args.segment_only).await?;

    let manifest = config.output.directory.join("artifacts.json");
    fs::write(&manifest, serde_json::to_string_pretty(&artifacts)?)
        .with_context(|| format!("Failed to write {}", manifest.display()))?;

    if let Some(video) = &artifacts.video {
        info!("Final video written to {}", video.display());
    }
    for reference in &artifacts.published {
        info!("Published {}", reference);
    }
    info!(
        "Process complete. Artifacts listed in {}",
        manifest.display()
    );
    Ok(())
}
