use std::path::Path;

use anyhow::Context;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

const PLACEHOLDER_SAMPLE_RATE: u32 = 22_050;

pub fn wav_duration_seconds(path: &Path) -> anyhow::Result<f64> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();
    let frames = reader.len() as f64 / spec.channels as f64;
    Ok(frames / spec.sample_rate as f64)
}

/// Writes a mono 16-bit silent WAV, used as a stand-in for audio a service
/// would have produced.
pub fn write_silence(path: &Path, seconds: f64) -> anyhow::Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: PLACEHOLDER_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file {}", path.display()))?;
    let frames = (seconds.max(0.0) * PLACEHOLDER_SAMPLE_RATE as f64).round() as u64;
    for _ in 0..frames {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_requested_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiet.wav");
        write_silence(&path, 2.5).unwrap();
        let seconds = wav_duration_seconds(&path).unwrap();
        assert!((seconds - 2.5).abs() < 1e-3, "got {seconds}");
    }

    #[test]
    fn missing_file_is_an_error() {
        let missing = Path::new("/nonexistent/narration.wav");
        assert!(wav_duration_seconds(missing).is_err());
    }
}
