//! Bounded, overlapping audio chunking.
//!
//! Long recordings are cut into chunks of at most `max_chunk_duration`
//! seconds; each chunk after the first starts `overlap` seconds before the
//! previous chunk's end. The overlap lets the merger deduplicate repeated
//! text at the seams instead of dropping content, and softens vendor
//! timestamp drift at chunk edges.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

use super::probe::{probe, run_ffmpeg};
use super::MediaError;
use crate::settings::ChunkingSettings;

/// Descriptor for a single audio chunk.
#[derive(Debug, Clone)]
pub struct ChunkSpec {
    /// 0-based chunk index.
    pub index: usize,
    /// Start offset in seconds, relative to the full recording.
    pub start_time: f64,
    /// End offset in seconds, relative to the full recording.
    pub end_time: f64,
    /// Local path of the cut WAV, when one was produced.
    pub path: Option<PathBuf>,
    pub size_bytes: Option<u64>,
}

impl ChunkSpec {
    /// A single chunk covering the whole file (no cutting needed).
    pub fn whole(duration: f64, path: PathBuf) -> Self {
        Self {
            index: 0,
            start_time: 0.0,
            end_time: duration,
            path: Some(path),
            size_bytes: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Fixed-duration audio chunker with overlap.
#[derive(Debug, Clone)]
pub struct AudioChunker {
    max_chunk_duration: f64,
    overlap_duration: f64,
}

impl AudioChunker {
    /// `overlap` is clamped to half of `max_chunk_duration` so every
    /// boundary step makes forward progress.
    pub fn new(max_chunk_duration: f64, overlap_duration: f64) -> Self {
        Self {
            max_chunk_duration,
            overlap_duration: overlap_duration.clamp(0.0, max_chunk_duration / 2.0),
        }
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        Self::new(settings.max_chunk_duration, settings.overlap())
    }

    pub fn max_chunk_duration(&self) -> f64 {
        self.max_chunk_duration
    }

    /// Calculate fixed-duration chunk boundaries with overlap.
    ///
    /// Audio fitting in one chunk yields `[(0, duration)]`. Otherwise all
    /// chunks except the last are exactly `max_chunk_duration` long, each
    /// next chunk starts `overlap` before the previous end, and the last
    /// chunk ends exactly at `duration`.
    pub fn calculate_chunk_boundaries(&self, duration: f64) -> Vec<(f64, f64)> {
        if duration <= self.max_chunk_duration {
            return vec![(0.0, duration)];
        }

        let mut boundaries = Vec::new();
        let mut current_start = 0.0;

        while current_start < duration {
            let chunk_end = (current_start + self.max_chunk_duration).min(duration);
            boundaries.push((current_start, chunk_end));

            if chunk_end >= duration {
                break;
            }

            current_start = chunk_end - self.overlap_duration;
        }

        boundaries
    }

    /// Split an audio file into chunk WAVs under `out_dir`.
    ///
    /// The input is probed first; each span is cut with ffmpeg and
    /// re-encoded to the canonical 16 kHz mono profile.
    pub async fn chunk_audio(
        &self,
        input_path: &Path,
        out_dir: &Path,
    ) -> Result<Vec<ChunkSpec>, MediaError> {
        let metadata = probe(input_path).await?;
        info!(
            duration = metadata.duration,
            codec = %metadata.codec,
            sample_rate = metadata.sample_rate,
            "chunking audio"
        );

        tokio::fs::create_dir_all(out_dir).await?;

        let boundaries = self.calculate_chunk_boundaries(metadata.duration);
        let mut chunks = Vec::with_capacity(boundaries.len());

        for (index, (start_time, end_time)) in boundaries.into_iter().enumerate() {
            let output_path = out_dir.join(format!("chunk_{index:04}.wav"));
            extract_span(input_path, &output_path, start_time, end_time - start_time).await?;

            let size_bytes = tokio::fs::metadata(&output_path).await.ok().map(|m| m.len());
            chunks.push(ChunkSpec {
                index,
                start_time,
                end_time,
                path: Some(output_path),
                size_bytes,
            });
        }

        info!(count = chunks.len(), "created audio chunks");
        Ok(chunks)
    }

    /// Best-effort removal of chunk files and their directory.
    pub async fn cleanup_chunks(chunks: &[ChunkSpec]) {
        for chunk in chunks {
            if let Some(path) = &chunk.path {
                let _ = tokio::fs::remove_file(path).await;
            }
        }
        if let Some(dir) = chunks
            .first()
            .and_then(|c| c.path.as_ref())
            .and_then(|p| p.parent())
        {
            // Only removes the directory if nothing else lives there
            let _ = tokio::fs::remove_dir(dir).await;
        }
    }
}

/// Cut `[start, start + length)` out of `input` as 16 kHz mono WAV.
async fn extract_span(
    input: &Path,
    output: &Path,
    start: f64,
    length: f64,
) -> Result<(), MediaError> {
    run_ffmpeg(
        Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-ss",
                &format!("{start}"),
                "-t",
                &format!("{length}"),
                "-i",
            ])
            .arg(input.as_os_str())
            .args(["-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y"])
            .arg(output.as_os_str()),
    )
    .await
}
