//! Context carry and coverage checking for the chunk loop.
//!
//! The "previous context" handed to chunk N is a derived view over the
//! already-transcribed results of chunks 0..N-1, recomputed on every
//! iteration. Nothing points from chunk to chunk; the data stays a tree.

use crate::provider::{Segment, TranscriptionResponse};

/// Extract continuity context from earlier chunk results.
///
/// Returns the last `num_segments` segments formatted one per line as
/// `SPEAKER_XX: text`, plus every speaker id seen so far (in order of
/// first appearance).
pub fn extract_context(
    results: &[TranscriptionResponse],
    num_segments: usize,
) -> (String, Vec<String>) {
    let mut all_segments: Vec<&Segment> = Vec::new();
    let mut speakers: Vec<String> = Vec::new();

    for result in results {
        for seg in &result.segments {
            all_segments.push(seg);
            if let Some(speaker) = &seg.speaker_id
                && !speakers.contains(speaker)
            {
                speakers.push(speaker.clone());
            }
        }
    }

    if all_segments.is_empty() {
        return (String::new(), speakers);
    }

    let tail_start = all_segments.len().saturating_sub(num_segments);
    let lines: Vec<String> = all_segments[tail_start..]
        .iter()
        .filter(|seg| !seg.text.trim().is_empty())
        .map(|seg| {
            format!(
                "{}: {}",
                seg.speaker_id.as_deref().unwrap_or("SPEAKER_00"),
                seg.text.trim()
            )
        })
        .collect();

    (lines.join("\n"), speakers)
}

/// Seconds at the start or end of a chunk not covered by any segment.
///
/// Returns `None` when the segments span the whole chunk (overflow past
/// the chunk end is clamped, not penalized). An empty segment list leaves
/// the entire chunk uncovered.
pub fn coverage_gap(segments: &[Segment], chunk_duration: f64) -> Option<f64> {
    if chunk_duration <= 0.0 {
        return None;
    }
    if segments.is_empty() {
        return Some(chunk_duration);
    }

    let first_start = segments
        .iter()
        .map(|s| s.start_time)
        .fold(f64::INFINITY, f64::min);
    let last_end = segments.iter().map(|s| s.end_time).fold(0.0_f64, f64::max);

    let leading = first_start.max(0.0);
    let trailing = (chunk_duration - last_end).max(0.0);

    let gap = leading.max(trailing);
    (gap > 0.0).then_some(gap)
}

/// Gap size above which a chunk result is considered suspect and worth
/// retransmitting: a fifth of the chunk, but never under five seconds.
pub fn gap_threshold(chunk_duration: f64) -> f64 {
    (0.2 * chunk_duration).max(5.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(speaker: &str, text: &str, start: f64, end: f64) -> Segment {
        Segment {
            text: text.to_string(),
            start_time: start,
            end_time: end,
            speaker_id: Some(speaker.to_string()),
            ..Default::default()
        }
    }

    fn response(segments: Vec<Segment>) -> TranscriptionResponse {
        TranscriptionResponse {
            segments,
            ..Default::default()
        }
    }

    // -- context carry ---------------------------------------------------

    #[test]
    fn empty_results_give_empty_context() {
        let (context, speakers) = extract_context(&[], 3);
        assert!(context.is_empty());
        assert!(speakers.is_empty());
    }

    #[test]
    fn takes_the_last_n_segments_across_results() {
        let results = vec![
            response(vec![
                seg("SPEAKER_00", "one", 0.0, 1.0),
                seg("SPEAKER_01", "two", 1.0, 2.0),
            ]),
            response(vec![
                seg("SPEAKER_00", "three", 0.0, 1.0),
                seg("SPEAKER_01", "four", 1.0, 2.0),
            ]),
        ];

        let (context, speakers) = extract_context(&results, 3);

        assert_eq!(
            context,
            "SPEAKER_01: two\nSPEAKER_00: three\nSPEAKER_01: four"
        );
        assert_eq!(speakers, vec!["SPEAKER_00", "SPEAKER_01"]);
    }

    #[test]
    fn speakers_accumulate_across_all_results_not_just_the_tail() {
        let results = vec![
            response(vec![seg("SPEAKER_02", "early", 0.0, 1.0)]),
            response(vec![
                seg("SPEAKER_00", "a", 0.0, 1.0),
                seg("SPEAKER_00", "b", 1.0, 2.0),
                seg("SPEAKER_00", "c", 2.0, 3.0),
            ]),
        ];

        let (context, speakers) = extract_context(&results, 3);

        // SPEAKER_02 is out of the context window but still a known voice
        assert!(!context.contains("SPEAKER_02"));
        assert!(speakers.contains(&"SPEAKER_02".to_string()));
    }

    #[test]
    fn blank_segments_are_skipped_in_context_lines() {
        let results = vec![response(vec![
            seg("SPEAKER_00", "  ", 0.0, 1.0),
            seg("SPEAKER_00", "spoken", 1.0, 2.0),
        ])];

        let (context, _) = extract_context(&results, 3);
        assert_eq!(context, "SPEAKER_00: spoken");
    }

    // -- coverage gap ----------------------------------------------------

    #[test]
    fn trailing_gap_is_detected() {
        // 60s chunk whose only segment is (0, 40): gap of 20s
        let segments = vec![seg("s0", "x", 0.0, 40.0)];
        assert_eq!(coverage_gap(&segments, 60.0), Some(20.0));
    }

    #[test]
    fn overflow_is_clamped_not_penalized() {
        // segments cover (0, 50) and (50, 70) of a 60s chunk
        let segments = vec![seg("s0", "a", 0.0, 50.0), seg("s0", "b", 50.0, 70.0)];
        assert_eq!(coverage_gap(&segments, 60.0), None);
    }

    #[test]
    fn leading_gap_is_detected() {
        let segments = vec![seg("s0", "late", 30.0, 60.0)];
        assert_eq!(coverage_gap(&segments, 60.0), Some(30.0));
    }

    #[test]
    fn larger_edge_wins() {
        // leading 10, trailing 25
        let segments = vec![seg("s0", "mid", 10.0, 35.0)];
        assert_eq!(coverage_gap(&segments, 60.0), Some(25.0));
    }

    #[test]
    fn empty_segments_leave_everything_uncovered() {
        assert_eq!(coverage_gap(&[], 60.0), Some(60.0));
    }

    #[test]
    fn full_coverage_has_no_gap() {
        let segments = vec![seg("s0", "all", 0.0, 60.0)];
        assert_eq!(coverage_gap(&segments, 60.0), None);
    }

    #[test]
    fn threshold_floors_at_five_seconds() {
        assert_eq!(gap_threshold(10.0), 5.0);
        assert_eq!(gap_threshold(60.0), 12.0);
        assert_eq!(gap_threshold(600.0), 120.0);
    }

    #[test]
    fn silence_chunk_exceeds_threshold() {
        // the retransmission trigger for an all-silence chunk
        let gap = coverage_gap(&[], 60.0).unwrap();
        assert!(gap > gap_threshold(60.0));
    }
}
