//! Media probing, normalization and chunking.
//!
//! Everything in this module shells out to ffmpeg/ffprobe through
//! `tokio::process`, so transcoding never blocks the async runtime. The
//! pipeline normalizes every input to 16 kHz mono PCM before chunking so
//! all providers see the same codec profile regardless of what was
//! uploaded.

mod chunker;
mod probe;

pub use chunker::{AudioChunker, ChunkSpec};
pub use probe::{MediaInfo, extract_audio, normalize_to_wav, probe};

/// Audio container extensions accepted for upload.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "m4a", "flac", "ogg", "webm", "aac", "wma", "opus",
];

/// Video container extensions; audio is demuxed out before chunking.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "m4v", "mpg", "mpeg", "wmv"];

/// Lowercased extension of a filename, if any.
pub fn file_extension(filename: &str) -> Option<String> {
    filename.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

/// Whether the filename routes through video audio extraction.
pub fn is_video_filename(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Whether the filename is accepted at all (audio or video).
pub fn is_supported_filename(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| {
            AUDIO_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Errors from local media processing. All are fatal for the job.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The container could not be probed or decoded
    #[error("invalid media: {0}")]
    InvalidMedia(String),

    /// Extension is not on the accepted list
    #[error("unsupported format: .{extension}")]
    UnsupportedFormat { extension: String },

    /// ffmpeg failed while extracting or re-encoding
    #[error("transcode failed: {0}")]
    Transcode(String),

    #[error("media I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_extensions() {
        assert!(is_supported_filename("talk.mp3"));
        assert!(is_supported_filename("talk.OGG"));
        assert!(is_video_filename("meeting.mp4"));
        assert!(!is_video_filename("talk.mp3"));
        assert!(!is_supported_filename("notes.txt"));
        assert!(!is_supported_filename("no_extension"));
    }
}
