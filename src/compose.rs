use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::{debug, error, info, warn};

/// Writes an ffmpeg concat list naming `clips` in playback order.
pub fn write_concat_list(work_dir: &Path, clips: &[PathBuf]) -> anyhow::Result<PathBuf> {
    let list_path = work_dir.join("clips.txt");
    let mut body = String::new();
    for clip in clips {
        let absolute = fs::canonicalize(clip).unwrap_or_else(|_| clip.clone());
        // Single quotes inside a concat entry are closed, escaped and reopened.
        let escaped = absolute.display().to_string().replace('\'', r"'\''");
        body.push_str(&format!("file '{escaped}'\n"));
    }
    fs::write(&list_path, body)
        .with_context(|| format!("Failed to write concat list {}", list_path.display()))?;
    Ok(list_path)
}

fn concat_args(list: &Path, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list.display().to_string(),
        "-c".into(),
        "copy".into(),
        out.display().to_string(),
    ]
}

fn mux_args(video: &Path, audio: &Path, out: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        video.display().to_string(),
        "-i".into(),
        audio.display().to_string(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-c:v".into(),
        "copy".into(),
        "-c:a".into(),
        "aac".into(),
        "-shortest".into(),
        out.display().to_string(),
    ]
}

fn run_ffmpeg(args: &[String]) -> anyhow::Result<()> {
    debug!("ffmpeg {}", args.join(" "));
    let status = Command::new("ffmpeg")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("Failed to spawn ffmpeg; is it on PATH?")?;
    if !status.success() {
        anyhow::bail!("ffmpeg exited with {status}");
    }
    Ok(())
}

/// Concatenates `clips` (first clip plays first) and muxes `audio` over them.
pub fn compose_video(
    clips: &[PathBuf],
    audio: &Path,
    work_dir: &Path,
    out: &Path,
) -> anyhow::Result<()> {
    if clips.is_empty() {
        anyhow::bail!("no clips to compose");
    }
    let list = write_concat_list(work_dir, clips)?;
    let joined = work_dir.join("joined.mp4");
    info!(
        "Concatenating {} clips into {}",
        clips.len(),
        joined.display()
    );
    run_ffmpeg(&concat_args(&list, &joined)).context("ffmpeg failed to concatenate clips")?;

    info!("Muxing {} into {}", audio.display(), out.display());
    run_ffmpeg(&mux_args(&joined, audio, out)).context("ffmpeg failed to mux audio")?;
    Ok(())
}

/// Runs `compose_video`, writing a placeholder output if ffmpeg is missing
/// or fails. In stub mode ffmpeg is never invoked.
pub fn compose_or_placeholder(
    clips: &[PathBuf],
    audio: &Path,
    work_dir: &Path,
    out: &Path,
    use_stubs: bool,
) -> anyhow::Result<PathBuf> {
    if use_stubs {
        write_concat_list(work_dir, clips)?;
        debug!("[stub] skipping ffmpeg, placeholder at {}", out.display());
        write_placeholder(clips, audio, out)?;
    } else if let Err(e) = compose_video(clips, audio, work_dir, out) {
        error!("Composition failed: {e:#}");
        warn!("Writing placeholder video to {}", out.display());
        write_placeholder(clips, audio, out)?;
    }
    Ok(out.to_path_buf())
}

fn write_placeholder(clips: &[PathBuf], audio: &Path, out: &Path) -> anyhow::Result<()> {
    let names: Vec<String> = clips
        .iter()
        .filter_map(|c| c.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    let body = format!("composed video: {} + {}\n", names.join(", "), audio.display());
    fs::write(out, body).with_context(|| format!("Failed to write {}", out.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn concat_list_preserves_order_and_escapes_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let clips = vec![
            PathBuf::from("/tmp/nope/segment_02.mp4"),
            PathBuf::from("/tmp/nope/it's_01.mp4"),
        ];
        let list = write_concat_list(dir.path(), &clips).unwrap();
        assert_eq!(
            fs::read_to_string(list).unwrap(),
            "file '/tmp/nope/segment_02.mp4'\nfile '/tmp/nope/it'\\''s_01.mp4'\n"
        );
    }

    #[test]
    fn mux_keeps_video_and_encodes_audio() {
        let args = mux_args(
            Path::new("joined.mp4"),
            Path::new("mix.wav"),
            Path::new("final.mp4"),
        );
        assert_eq!(
            args.join(" "),
            "-y -i joined.mp4 -i mix.wav -map 0:v:0 -map 1:a:0 \
             -c:v copy -c:a aac -shortest final.mp4"
        );
        assert_eq!(
            concat_args(Path::new("l.txt"), Path::new("j.mp4"))[6],
            "l.txt"
        );
    }

    #[test]
    fn empty_clip_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("o.mp4");
        let result = compose_video(&[], Path::new("a.wav"), dir.path(), &out);
        assert!(result.is_err());
    }

    #[test]
    fn stub_composition_names_clips_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let clips = vec![
            dir.path().join("segment_01.mp4"),
            dir.path().join("segment_02.mp4"),
        ];
        let out = dir.path().join("final.mp4");
        compose_or_placeholder(&clips, Path::new("narration.wav"), dir.path(), &out, true).unwrap();
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "composed video: segment_01.mp4, segment_02.mp4 + narration.wav\n"
        );
        assert!(dir.path().join("clips.txt").exists());
    }
}
