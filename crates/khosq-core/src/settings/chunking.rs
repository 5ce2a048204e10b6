//! Chunking and context-carry configuration.

use serde::{Deserialize, Serialize};

/// Default overlap between adjacent chunks in seconds.
pub const DEFAULT_OVERLAP_SECS: f64 = 3.0;

/// Default similarity threshold for boundary deduplication.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Audio chunking configuration.
///
/// `overlap_duration` and `overlap_similarity_threshold` are optional so
/// that an explicit `0.0` is distinguishable from "not configured": `None`
/// means use the default, `Some(0.0)` genuinely means zero overlap /
/// nothing is ever considered similar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk duration in seconds.
    pub max_chunk_duration: f64,
    /// Overlap between adjacent chunks in seconds (default 3.0).
    pub overlap_duration: Option<f64>,
    /// Similarity threshold for overlap deduplication (default 0.8).
    pub overlap_similarity_threshold: Option<f64>,
    /// Number of trailing segments carried as context into the next chunk.
    pub context_segments: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chunk_duration: 600.0,
            overlap_duration: None,
            overlap_similarity_threshold: None,
            context_segments: 3,
        }
    }
}

impl ChunkingSettings {
    /// Effective overlap duration in seconds.
    pub fn overlap(&self) -> f64 {
        self.overlap_duration.unwrap_or(DEFAULT_OVERLAP_SECS)
    }

    /// Effective similarity threshold for deduplication.
    pub fn similarity_threshold(&self) -> f64 {
        self.overlap_similarity_threshold
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_zero_overlap_is_zero() {
        let settings = ChunkingSettings {
            overlap_duration: Some(0.0),
            ..Default::default()
        };
        assert_eq!(settings.overlap(), 0.0);
    }

    #[test]
    fn unset_overlap_uses_default() {
        assert_eq!(ChunkingSettings::default().overlap(), DEFAULT_OVERLAP_SECS);
    }
}
