//! ffprobe metadata extraction and ffmpeg normalization.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

use super::MediaError;

/// Audio file metadata as reported by ffprobe.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Total duration in seconds.
    pub duration: f64,
    /// Codec name of the audio stream (e.g. "pcm_s16le", "aac").
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub bit_rate: Option<u64>,
    pub size_bytes: Option<u64>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

// ffprobe emits numeric fields as JSON strings
#[derive(Deserialize, Default)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

/// Probe a media file with ffprobe.
///
/// Fails with [`MediaError::InvalidMedia`] when the container is
/// unreadable or reports no playable duration.
pub async fn probe(path: &Path) -> Result<MediaInfo, MediaError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration,bit_rate:stream=codec_type,codec_name,sample_rate,channels",
            "-of",
            "json",
        ])
        .arg(path.as_os_str())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::InvalidMedia(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| MediaError::InvalidMedia(format!("unparseable ffprobe output: {e}")))?;

    let duration = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    if duration <= 0.0 {
        return Err(MediaError::InvalidMedia(
            "container reports no playable duration".to_string(),
        ));
    }

    let audio_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .or(parsed.streams.first());

    let size_bytes = tokio::fs::metadata(path).await.ok().map(|m| m.len());

    Ok(MediaInfo {
        duration,
        codec: audio_stream
            .and_then(|s| s.codec_name.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        sample_rate: audio_stream
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse().ok())
            .unwrap_or(44_100),
        channels: audio_stream.and_then(|s| s.channels).unwrap_or(2),
        bit_rate: parsed
            .format
            .bit_rate
            .as_deref()
            .and_then(|b| b.parse().ok()),
        size_bytes,
    })
}

/// Demux and transcode a video file's audio track to 16 kHz mono WAV.
///
/// The output path is deterministic for a given input: `<stem>_audio.wav`
/// inside `out_dir`.
pub async fn extract_audio(video_path: &Path, out_dir: &Path) -> Result<PathBuf, MediaError> {
    let stem = video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let output_path = out_dir.join(format!("{stem}_audio.wav"));

    info!(input = %video_path.display(), output = %output_path.display(), "extracting audio from video");

    run_ffmpeg(
        Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(video_path.as_os_str())
            .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y"])
            .arg(output_path.as_os_str()),
    )
    .await?;

    ensure_nonempty(&output_path).await?;
    Ok(output_path)
}

/// Re-encode any audio input to the canonical 16 kHz mono WAV profile.
pub async fn normalize_to_wav(audio_path: &Path, out_dir: &Path) -> Result<PathBuf, MediaError> {
    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let output_path = out_dir.join(format!("{stem}_16k.wav"));

    run_ffmpeg(
        Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(audio_path.as_os_str())
            .args(["-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y"])
            .arg(output_path.as_os_str()),
    )
    .await?;

    ensure_nonempty(&output_path).await?;
    Ok(output_path)
}

pub(super) async fn run_ffmpeg(cmd: &mut Command) -> Result<(), MediaError> {
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(MediaError::Transcode(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(())
}

async fn ensure_nonempty(path: &Path) -> Result<(), MediaError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaError::Transcode("output file not created".to_string()))?;
    if meta.len() == 0 {
        return Err(MediaError::Transcode("output file is empty".to_string()));
    }
    Ok(())
}
