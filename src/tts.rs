use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::{debug, error, info};

use crate::audio::write_silence;

/// Speaks `text` into `out_path` with the Piper CLI.
pub fn synthesize_narration(model: &str, text: &str, out_path: &Path) -> anyhow::Result<()> {
    info!("Calling Piper TTS for {}", out_path.display());
    let mut child = Command::new("piper")
        .arg("--model")
        .arg(model)
        .arg("--output_file")
        .arg(out_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
        .context("Failed to spawn piper; is it on PATH?")?;

    {
        let stdin = child
            .stdin
            .as_mut()
            .context("Failed to open piper stdin")?;
        stdin.write_all(text.as_bytes())?;
    }

    let status = child.wait()?;
    if !status.success() {
        error!("Piper TTS failed for {}", out_path.display());
        anyhow::bail!("TTS engine returned non-zero status {status}");
    }
    Ok(())
}

/// Writes silent audio of the narration's expected length instead of calling Piper.
pub fn placeholder_narration(
    text: &str,
    words_per_minute: f64,
    out_path: &Path,
) -> anyhow::Result<()> {
    let seconds = crate::utils::word_count(text) as f64 / words_per_minute * 60.0;
    debug!(
        "[stub] narration of {:.1}s -> {}",
        seconds,
        out_path.display()
    );
    write_silence(out_path, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav_duration_seconds;

    #[test]
    fn placeholder_matches_speech_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narration.wav");
        placeholder_narration("one two three four five six", 120.0, &path).unwrap();
        let seconds = wav_duration_seconds(&path).unwrap();
        assert!((seconds - 3.0).abs() < 1e-3, "got {seconds}");
    }
}
