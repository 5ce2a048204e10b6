//! Timestamp hygiene for vendor responses.
//!
//! Vendors routinely return timestamps that drift past the clip length or
//! collapse to zero-width spans. The merger assumes every segment lies in
//! `[0, audio_duration]` with `start < end`, so adapters run their parsed
//! segments through [`realign_segments`] before returning.

use super::Segment;

/// Overshoot tolerance before proportional rescaling kicks in.
const OVERSHOOT_TOLERANCE: f64 = 1.05;

/// Minimum width given to degenerate spans, in seconds.
const MIN_SPAN_SECS: f64 = 0.1;

/// Re-align segment (and word) timestamps into `[0, audio_duration]`.
///
/// - Negative timestamps are clamped to 0.
/// - If the last end overshoots `audio_duration` by more than 5%, all
///   timestamps are proportionally rescaled.
/// - Spans left with `end <= start` are widened to `start + 0.1s`.
///
/// Best-effort: callers with `audio_duration <= 0` only get the negative
/// clamp and degenerate-span fixes.
pub fn realign_segments(segments: &mut [Segment], audio_duration: f64) {
    if segments.is_empty() {
        return;
    }

    for segment in segments.iter_mut() {
        segment.start_time = segment.start_time.max(0.0);
        segment.end_time = segment.end_time.max(0.0);
        if let Some(words) = segment.words.as_mut() {
            for word in words.iter_mut() {
                word.start_time = word.start_time.max(0.0);
                word.end_time = word.end_time.max(0.0);
            }
        }
    }

    if audio_duration > 0.0 {
        let max_end = segments
            .iter()
            .map(|s| s.end_time)
            .fold(0.0_f64, f64::max);

        if max_end > audio_duration * OVERSHOOT_TOLERANCE {
            let scale = audio_duration / max_end;
            for segment in segments.iter_mut() {
                segment.start_time *= scale;
                segment.end_time *= scale;
                if let Some(words) = segment.words.as_mut() {
                    for word in words.iter_mut() {
                        word.start_time *= scale;
                        word.end_time *= scale;
                    }
                }
            }
        }
    }

    for segment in segments.iter_mut() {
        if segment.end_time <= segment.start_time {
            segment.end_time = segment.start_time + MIN_SPAN_SECS;
        }
        if let Some(words) = segment.words.as_mut() {
            for word in words.iter_mut() {
                if word.end_time <= word.start_time {
                    word.end_time = word.start_time + MIN_SPAN_SECS;
                }
            }
        }
    }
}
