//! Transcript stitching across chunk results.
//!
//! Chunks overlap by a few seconds, so the seams contain repeated speech.
//! The merger translates every segment onto the global recording clock,
//! deduplicates the overlap windows, renormalizes speaker ids to a single
//! `SPEAKER_NN` sequence, and assembles the final transcript document.
//!
//! ```text
//! chunk results ──offset──▶ global timeline ──sort──▶ dedup ──▶
//!     renormalize speakers ──▶ full text + speaker stats + warnings
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::media::ChunkSpec;
use crate::provider::{Segment, TranscriptionResponse, WordSpan};

/// Characters that end a sentence (includes the Armenian full stop).
const TERMINAL_PUNCTUATION: &[char] = &['.', '!', '?', '։'];

/// Punctuation after which no joining space is inserted.
const JOINING_PUNCTUATION: &[char] = &['.', '!', '?', ',', '։'];

/// A segment in the merged transcript, on the global recording clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedSegment {
    pub speaker_id: String,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordSpan>>,
}

/// Per-speaker totals for the merged transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerStats {
    pub speaker_id: String,
    pub total_duration: f64,
    pub segment_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergeMetadata {
    pub chunks_merged: usize,
    pub total_segments: usize,
    pub dedup_removed: usize,
}

/// The final transcript document persisted as `transcript.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MergedTranscript {
    pub full_text: String,
    pub segments: Vec<MergedSegment>,
    pub speakers: Vec<SpeakerStats>,
    pub metadata: MergeMetadata,
    pub warnings: Vec<String>,
}

/// Merges per-chunk transcripts into a cohesive result.
///
/// Handles timestamp adjustment for chunk offsets, overlap deduplication,
/// speaker id normalization across chunks, and text continuity at chunk
/// boundaries.
pub struct TranscriptMerger {
    /// Seconds of overlap before two segments are considered colliding.
    overlap_threshold: f64,
    /// Similarity threshold for treating colliding texts as duplicates.
    similarity_threshold: f64,
}

/// Seconds of overlap before two segments are considered colliding.
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 2.0;

impl Default for TranscriptMerger {
    fn default() -> Self {
        Self::new(
            DEFAULT_OVERLAP_THRESHOLD,
            crate::settings::DEFAULT_SIMILARITY_THRESHOLD,
        )
    }
}

impl TranscriptMerger {
    pub fn new(overlap_threshold: f64, similarity_threshold: f64) -> Self {
        Self {
            overlap_threshold,
            similarity_threshold,
        }
    }

    /// Merge chunk transcripts into a single document.
    ///
    /// `results` and `chunks` are parallel, in chunk-index order.
    pub fn merge(
        &self,
        results: &[TranscriptionResponse],
        chunks: &[ChunkSpec],
    ) -> MergedTranscript {
        if results.is_empty() {
            return MergedTranscript {
                warnings: vec!["No transcription results to merge".to_string()],
                ..Default::default()
            };
        }

        let warnings = self.validate_chunk_completeness(results, chunks);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "chunk validation warnings detected");
        }

        if results.len() == 1 {
            return self.format_single_chunk(&results[0], warnings);
        }

        // Translate all segments onto the global recording clock
        let mut all_segments: Vec<MergedSegment> = Vec::new();
        for (result, chunk) in results.iter().zip(chunks.iter()) {
            all_segments.extend(extract_segments(result, chunk));
        }
        let gathered = all_segments.len();

        // Stable sort keeps chunk order for equal start times
        all_segments.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let deduped = self.deduplicate_overlaps(all_segments);
        let dedup_removed = gathered - deduped.len();

        let normalized = normalize_speakers(deduped);
        let full_text = build_full_text(&normalized);
        let speakers = compute_speaker_stats(&normalized);

        MergedTranscript {
            full_text,
            metadata: MergeMetadata {
                chunks_merged: results.len(),
                total_segments: normalized.len(),
                dedup_removed,
            },
            segments: normalized,
            speakers,
            warnings,
        }
    }

    /// Single chunk: normalize the shape without offsetting.
    fn format_single_chunk(
        &self,
        result: &TranscriptionResponse,
        warnings: Vec<String>,
    ) -> MergedTranscript {
        let segments: Vec<MergedSegment> = result
            .segments
            .iter()
            .map(|seg| MergedSegment {
                speaker_id: seg
                    .speaker_id
                    .clone()
                    .unwrap_or_else(|| "SPEAKER_00".to_string()),
                text: seg.text.trim().to_string(),
                start_time: seg.start_time,
                end_time: seg.end_time,
                confidence: seg.confidence,
                words: seg.words.clone(),
            })
            .collect();

        let normalized = normalize_speakers(segments);

        let full_text = if result.text.is_empty() {
            build_full_text(&normalized)
        } else {
            result.text.clone()
        };

        MergedTranscript {
            full_text,
            metadata: MergeMetadata {
                chunks_merged: 1,
                total_segments: normalized.len(),
                dedup_removed: 0,
            },
            speakers: compute_speaker_stats(&normalized),
            segments: normalized,
            warnings,
        }
    }

    /// Remove duplicate/overlapping segments introduced by chunk overlap.
    ///
    /// When a segment starts more than `overlap_threshold` before the
    /// previously kept segment's end: similar texts are duplicates (keep
    /// the longer one); different texts mean another speaker continued
    /// under the overlap, so the previous segment is truncated.
    fn deduplicate_overlaps(&self, segments: Vec<MergedSegment>) -> Vec<MergedSegment> {
        let mut result: Vec<MergedSegment> = Vec::with_capacity(segments.len());

        for seg in segments {
            let Some(prev) = result.last_mut() else {
                result.push(seg);
                continue;
            };

            if seg.start_time < prev.end_time - self.overlap_threshold {
                if self.texts_similar(&prev.text, &seg.text) {
                    debug!(
                        overlap_secs = prev.end_time - seg.start_time,
                        "deduplicating overlapping segment"
                    );
                    // Keep the one with more text
                    if seg.text.chars().count() > prev.text.chars().count() {
                        *prev = seg;
                    }
                    continue;
                }

                // Different text under the overlap, truncate the previous
                // segment instead of dropping content
                if seg.start_time > prev.start_time {
                    prev.end_time = seg.start_time;
                }
            }

            result.push(seg);
        }

        result
    }

    /// Whether two texts say the same thing.
    ///
    /// Case-folded comparison with four signals, any one above the
    /// threshold accepts: exact match, substring containment with a length
    /// ratio bound, word-token Jaccard, and character-trigram Jaccard with
    /// spaces stripped. The trigram signal is the only one that works for
    /// Armenian, where vendor tokenization is unreliable.
    pub fn texts_similar(&self, text1: &str, text2: &str) -> bool {
        // A zero threshold means deduplication is disabled outright
        if self.similarity_threshold <= 0.0 {
            return false;
        }
        if text1.is_empty() || text2.is_empty() {
            return false;
        }

        let a = text1.to_lowercase().trim().to_string();
        let b = text2.to_lowercase().trim().to_string();

        if a == b {
            return true;
        }

        let len_a = a.chars().count();
        let len_b = b.chars().count();
        if a.contains(&b) || b.contains(&a) {
            let shorter = len_a.min(len_b) as f64;
            let longer = len_a.max(len_b) as f64;
            if longer > 0.0 && shorter / longer >= self.similarity_threshold {
                return true;
            }
        }

        // Word-level overlap (works for English, Russian)
        let words_a: HashSet<&str> = a.split_whitespace().collect();
        let words_b: HashSet<&str> = b.split_whitespace().collect();
        if !words_a.is_empty()
            && !words_b.is_empty()
            && jaccard(&words_a, &words_b) >= self.similarity_threshold
        {
            return true;
        }

        // Character trigrams with spaces removed
        let trigrams_a = char_trigrams(&a);
        let trigrams_b = char_trigrams(&b);
        if !trigrams_a.is_empty()
            && !trigrams_b.is_empty()
            && jaccard(&trigrams_a, &trigrams_b) >= self.similarity_threshold
        {
            return true;
        }

        false
    }

    /// Collect non-fatal quality warnings about suspicious chunks.
    fn validate_chunk_completeness(
        &self,
        results: &[TranscriptionResponse],
        chunks: &[ChunkSpec],
    ) -> Vec<String> {
        let mut warnings = Vec::new();

        for (i, (result, chunk)) in results.iter().zip(chunks.iter()).enumerate() {
            // Very short transcript for long audio, likely truncated
            let duration = chunk.duration();
            if duration > 60.0 {
                let text_len = result.text.chars().count();
                if text_len < 100 {
                    warnings.push(format!(
                        "Chunk {i}: Suspiciously short transcript ({text_len} chars) for {duration:.1}s audio"
                    ));
                }
            }

            // Last segment ends abruptly (no terminal punctuation)
            if let Some(last) = result.segments.last() {
                let text = last.text.trim();
                if let Some(last_char) = text.chars().last()
                    && !TERMINAL_PUNCTUATION.contains(&last_char)
                {
                    let tail: String = text
                        .chars()
                        .rev()
                        .take(50)
                        .collect::<Vec<_>>()
                        .into_iter()
                        .rev()
                        .collect();
                    warnings.push(format!(
                        "Chunk {i}: Last segment doesn't end with punctuation: '{tail}'"
                    ));
                }
            }

            // The adapter had to fall back to degraded parsing
            if let Some(tag) = result.metadata.get("fallback") {
                warnings.push(format!(
                    "Chunk {i}: Provider used fallback parsing ({})",
                    tag.as_str().unwrap_or("unknown")
                ));
            }
        }

        warnings
    }
}

/// Extract a chunk's segments translated by the chunk's start offset.
fn extract_segments(result: &TranscriptionResponse, chunk: &ChunkSpec) -> Vec<MergedSegment> {
    let offset = chunk.start_time;

    result
        .segments
        .iter()
        .map(|seg: &Segment| MergedSegment {
            speaker_id: seg
                .speaker_id
                .clone()
                .unwrap_or_else(|| "SPEAKER_00".to_string()),
            text: seg.text.trim().to_string(),
            start_time: seg.start_time + offset,
            end_time: seg.end_time + offset,
            confidence: seg.confidence,
            words: seg.words.as_ref().map(|words| {
                words
                    .iter()
                    .map(|w| WordSpan {
                        text: w.text.clone(),
                        start_time: w.start_time + offset,
                        end_time: w.end_time + offset,
                    })
                    .collect()
            }),
        })
        .collect()
}

/// Renumber speaker ids to `SPEAKER_00…` in order of first appearance.
fn normalize_speakers(segments: Vec<MergedSegment>) -> Vec<MergedSegment> {
    let mut speaker_map: HashMap<String, String> = HashMap::new();

    segments
        .into_iter()
        .map(|mut seg| {
            let next_id = speaker_map.len();
            let normalized = speaker_map
                .entry(seg.speaker_id.clone())
                .or_insert_with(|| format!("SPEAKER_{next_id:02}"));
            seg.speaker_id = normalized.clone();
            seg
        })
        .collect()
}

/// Build the display transcript: a new line when the speaker changes, a
/// single joining space otherwise unless the text already ends in
/// punctuation.
fn build_full_text(segments: &[MergedSegment]) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current_speaker: Option<&str> = None;

    for seg in segments {
        if current_speaker != Some(seg.speaker_id.as_str()) {
            if !parts.is_empty() {
                parts.push("\n".to_string());
            }
            current_speaker = Some(seg.speaker_id.as_str());
        }

        parts.push(seg.text.clone());
        let ends_in_punctuation = seg
            .text
            .chars()
            .last()
            .map(|c| JOINING_PUNCTUATION.contains(&c))
            .unwrap_or(false);
        if !ends_in_punctuation {
            parts.push(" ".to_string());
        }
    }

    parts.concat().trim().to_string()
}

/// Total seconds spoken and segment count per speaker, sorted by id.
fn compute_speaker_stats(segments: &[MergedSegment]) -> Vec<SpeakerStats> {
    let mut stats: BTreeMap<&str, (f64, usize)> = BTreeMap::new();

    for seg in segments {
        let entry = stats.entry(seg.speaker_id.as_str()).or_insert((0.0, 0));
        entry.0 += seg.end_time - seg.start_time;
        entry.1 += 1;
    }

    stats
        .into_iter()
        .map(|(speaker_id, (duration, count))| SpeakerStats {
            speaker_id: speaker_id.to_string(),
            total_duration: (duration * 100.0).round() / 100.0,
            segment_count: count,
        })
        .collect()
}

fn jaccard<T: std::hash::Hash + Eq>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Character trigrams with spaces stripped; short inputs yield themselves.
fn char_trigrams(text: &str) -> HashSet<String> {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if chars.is_empty() {
        return HashSet::new();
    }
    if chars.len() < 3 {
        let mut set = HashSet::new();
        set.insert(chars.iter().collect());
        return set;
    }
    chars
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merger() -> TranscriptMerger {
        TranscriptMerger::new(2.0, 0.8)
    }

    fn chunk(index: usize, start: f64, end: f64) -> ChunkSpec {
        ChunkSpec {
            index,
            start_time: start,
            end_time: end,
            path: None,
            size_bytes: None,
        }
    }

    fn seg(speaker: &str, text: &str, start: f64, end: f64) -> Segment {
        Segment {
            text: text.to_string(),
            start_time: start,
            end_time: end,
            speaker_id: Some(speaker.to_string()),
            confidence: None,
            words: None,
        }
    }

    fn response(text: &str, segments: Vec<Segment>) -> TranscriptionResponse {
        TranscriptionResponse {
            text: text.to_string(),
            segments,
            language_detected: None,
            metadata: serde_json::Map::new(),
        }
    }

    fn merged(speaker: &str, text: &str, start: f64, end: f64) -> MergedSegment {
        MergedSegment {
            speaker_id: speaker.to_string(),
            text: text.to_string(),
            start_time: start,
            end_time: end,
            confidence: None,
            words: None,
        }
    }

    // -- merge: empty / single chunk ------------------------------------

    #[test]
    fn empty_results_merge_to_empty_transcript_with_warning() {
        let result = merger().merge(&[], &[]);
        assert_eq!(result.full_text, "");
        assert!(result.segments.is_empty());
        assert!(result.warnings[0].contains("No transcription results"));
    }

    #[test]
    fn single_chunk_passes_through() {
        let results = vec![response(
            "Hello world",
            vec![seg("speaker_0", "Hello world", 0.0, 5.0)],
        )];
        let result = merger().merge(&results, &[chunk(0, 0.0, 5.0)]);

        assert_eq!(result.full_text, "Hello world");
        assert_eq!(result.segments.len(), 1);
        assert_eq!(result.segments[0].speaker_id, "SPEAKER_00");
        assert_eq!(result.metadata.chunks_merged, 1);
    }

    #[test]
    fn single_chunk_normalizes_speakers() {
        let results = vec![response(
            "",
            vec![
                seg("spk_abc", "A", 0.0, 1.0),
                seg("spk_xyz", "B", 1.0, 2.0),
                seg("spk_abc", "C", 2.0, 3.0),
            ],
        )];
        let result = merger().merge(&results, &[chunk(0, 0.0, 3.0)]);

        let ids: Vec<&str> = result.segments.iter().map(|s| s.speaker_id.as_str()).collect();
        assert_eq!(ids, vec!["SPEAKER_00", "SPEAKER_01", "SPEAKER_00"]);
    }

    // -- merge: multi-chunk ---------------------------------------------

    #[test]
    fn timestamps_are_offset_by_chunk_start() {
        let results = vec![
            response("First chunk", vec![seg("s0", "First chunk", 0.0, 5.0)]),
            response("Second chunk", vec![seg("s0", "Second chunk", 0.0, 5.0)]),
        ];
        let chunks = vec![chunk(0, 0.0, 10.0), chunk(1, 10.0, 20.0)];

        let result = merger().merge(&results, &chunks);

        assert_eq!(result.segments[0].start_time, 0.0);
        assert_eq!(result.segments[1].start_time, 10.0);
        assert_eq!(result.segments[1].end_time, 15.0);
        assert_eq!(result.metadata.chunks_merged, 2);
    }

    #[test]
    fn second_chunk_segment_lands_on_global_clock() {
        // spans [0,10] and [10,20]; second chunk has (s0, 0, 5, "B")
        let results = vec![
            response("A", vec![seg("s0", "A", 0.0, 3.0)]),
            response("B", vec![seg("s0", "B", 0.0, 5.0)]),
        ];
        let chunks = vec![chunk(0, 0.0, 10.0), chunk(1, 10.0, 20.0)];

        let result = merger().merge(&results, &chunks);

        let b = &result.segments[1];
        assert_eq!(b.speaker_id, "SPEAKER_00");
        assert_eq!(b.start_time, 10.0);
        assert_eq!(b.end_time, 15.0);
        assert_eq!(b.text, "B");
    }

    #[test]
    fn same_raw_speaker_across_chunks_keeps_one_id() {
        let results = vec![
            response("A", vec![seg("speaker_0", "A", 0.0, 5.0)]),
            response("B", vec![seg("speaker_0", "B", 0.0, 5.0)]),
        ];
        let chunks = vec![chunk(0, 0.0, 10.0), chunk(1, 10.0, 20.0)];

        let result = merger().merge(&results, &chunks);

        let ids: HashSet<&str> = result.segments.iter().map(|s| s.speaker_id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["SPEAKER_00"]));
    }

    #[test]
    fn word_timestamps_are_offset_too() {
        let mut s = seg("s0", "word", 0.0, 1.0);
        s.words = Some(vec![WordSpan {
            text: "word".to_string(),
            start_time: 0.2,
            end_time: 0.8,
        }]);
        let results = vec![
            response("A", vec![seg("s0", "A", 0.0, 3.0)]),
            response("word", vec![s]),
        ];
        let chunks = vec![chunk(0, 0.0, 10.0), chunk(1, 10.0, 20.0)];

        let result = merger().merge(&results, &chunks);
        let words = result.segments[1].words.as_ref().unwrap();
        assert!((words[0].start_time - 10.2).abs() < 1e-9);
        assert!((words[0].end_time - 10.8).abs() < 1e-9);
    }

    #[test]
    fn output_segments_are_sorted_and_in_bounds() {
        let results = vec![
            response(
                "",
                vec![seg("s0", "a", 0.0, 100.0), seg("s1", "b", 100.0, 297.0)],
            ),
            response(
                "",
                vec![seg("s0", "c", 1.0, 50.0), seg("s1", "d", 50.0, 103.0)],
            ),
        ];
        let chunks = vec![chunk(0, 0.0, 300.0), chunk(1, 297.0, 400.0)];

        let result = merger().merge(&results, &chunks);

        let mut prev_start = f64::MIN;
        for s in &result.segments {
            assert!(s.start_time >= prev_start);
            assert!(s.start_time >= 0.0);
            assert!(s.end_time <= 400.0 + 1e-9);
            assert!(s.start_time < s.end_time);
            prev_start = s.start_time;
        }
    }

    // -- dedup ----------------------------------------------------------

    #[test]
    fn non_overlapping_segments_are_kept() {
        let m = merger();
        let segments = vec![
            merged("s0", "First", 0.0, 5.0),
            merged("s0", "Second", 5.0, 10.0),
        ];
        assert_eq!(m.deduplicate_overlaps(segments).len(), 2);
    }

    #[test]
    fn duplicate_text_in_overlap_is_removed() {
        let m = merger();
        let segments = vec![
            merged("s0", "Hello world", 0.0, 10.0),
            merged("s0", "Hello world", 5.0, 15.0),
        ];
        let result = m.deduplicate_overlaps(segments);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn longer_duplicate_wins() {
        let m = merger();
        // the re-heard copy caught the trailing punctuation too
        let segments = vec![
            merged("s0", "Hello world", 0.0, 10.0),
            merged("s0", "Hello world!", 5.0, 15.0),
        ];
        let result = m.deduplicate_overlaps(segments);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "Hello world!");
    }

    #[test]
    fn different_speaker_under_overlap_truncates_previous() {
        let m = merger();
        let segments = vec![
            merged("s0", "one speaker talking for a while", 0.0, 12.0),
            merged("s1", "completely different words here", 6.0, 14.0),
        ];
        let result = m.deduplicate_overlaps(segments);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].end_time, 6.0);
    }

    #[test]
    fn dedup_counter_is_reported() {
        let results = vec![
            response("Hello world", vec![seg("s0", "Hello world", 295.0, 300.0)]),
            // same words re-heard in the overlap window
            response("Hello world", vec![seg("s0", "Hello world", 0.0, 4.0)]),
        ];
        let chunks = vec![chunk(0, 0.0, 300.0), chunk(1, 297.0, 400.0)];

        let result = merger().merge(&results, &chunks);
        assert_eq!(result.metadata.dedup_removed, 1);
        assert_eq!(result.segments.len(), 1);
    }

    // -- similarity ------------------------------------------------------

    #[test]
    fn identical_texts_are_similar() {
        assert!(merger().texts_similar("hello world", "hello world"));
    }

    #[test]
    fn case_is_folded() {
        assert!(merger().texts_similar("Hello World", "hello world"));
    }

    #[test]
    fn empty_strings_are_never_similar() {
        let m = merger();
        assert!(!m.texts_similar("", ""));
        assert!(!m.texts_similar("hello", ""));
    }

    #[test]
    fn unrelated_texts_are_not_similar() {
        assert!(!merger().texts_similar("abc def ghi", "xyz uvw rst"));
    }

    #[test]
    fn short_substring_is_not_similar() {
        // length ratio 5/11 is under the threshold
        assert!(!merger().texts_similar("hello", "hello world"));
    }

    #[test]
    fn high_word_overlap_passes_lower_threshold() {
        let m = TranscriptMerger::new(2.0, 0.6);
        assert!(m.texts_similar("the quick brown fox", "the quick brown dog"));
    }

    #[test]
    fn armenian_texts_match_via_trigrams() {
        // Vendor tokenization differs but the characters agree
        let m = merger();
        assert!(m.texts_similar(
            "այսօր եղանակը շատ լավն է",
            "այսօր եղանակը շատ լավն է"
        ));
        assert!(!m.texts_similar(
            "այսօր եղանակը շատ լավն է",
            "վաղը կանձրևի ամբողջ օրը"
        ));
    }

    #[test]
    fn similarity_is_symmetric() {
        let m = merger();
        let pairs = [
            ("hello world", "hello world there"),
            ("abc", "xyz"),
            ("բարև ձեզ", "բարև ձեզ"),
        ];
        for (a, b) in pairs {
            assert_eq!(m.texts_similar(a, b), m.texts_similar(b, a));
        }
    }

    #[test]
    fn zero_threshold_disables_similarity() {
        let m = TranscriptMerger::new(2.0, 0.0);
        assert!(!m.texts_similar("hello", "hello"));
    }

    // -- full text -------------------------------------------------------

    #[test]
    fn same_speaker_segments_join_with_spaces() {
        let segments = vec![
            merged("SPEAKER_00", "Hello", 0.0, 1.0),
            merged("SPEAKER_00", "World", 1.0, 2.0),
        ];
        assert_eq!(build_full_text(&segments), "Hello World");
    }

    #[test]
    fn speaker_change_starts_a_new_line() {
        let segments = vec![
            merged("SPEAKER_00", "Hi.", 0.0, 1.0),
            merged("SPEAKER_01", "Hello.", 1.0, 2.0),
        ];
        let text = build_full_text(&segments);
        assert_eq!(text.lines().count(), 2);
        assert_eq!(text.lines().next().unwrap(), "Hi.");
    }

    #[test]
    fn no_extra_space_after_punctuation() {
        let segments = vec![
            merged("SPEAKER_00", "Hi.", 0.0, 1.0),
            merged("SPEAKER_00", "There", 1.0, 2.0),
        ];
        assert_eq!(build_full_text(&segments), "Hi.There");
    }

    #[test]
    fn armenian_full_stop_counts_as_punctuation() {
        let segments = vec![
            merged("SPEAKER_00", "Բարև։", 0.0, 1.0),
            merged("SPEAKER_00", "Ինչպե՞ս ես", 1.0, 2.0),
        ];
        assert_eq!(build_full_text(&segments), "Բարև։Ինչպե՞ս ես");
    }

    #[test]
    fn empty_segments_build_empty_text() {
        assert_eq!(build_full_text(&[]), "");
    }

    // -- speakers --------------------------------------------------------

    #[test]
    fn speakers_map_in_order_of_first_appearance() {
        let segments = vec![
            merged("zebra", "A", 0.0, 1.0),
            merged("alpha", "B", 1.0, 2.0),
            merged("zebra", "C", 2.0, 3.0),
        ];
        let result = normalize_speakers(segments);

        assert_eq!(result[0].speaker_id, "SPEAKER_00");
        assert_eq!(result[1].speaker_id, "SPEAKER_01");
        assert_eq!(result[2].speaker_id, "SPEAKER_00");
    }

    #[test]
    fn speaker_mapping_is_a_bijection() {
        let segments = vec![
            merged("a", "1", 0.0, 1.0),
            merged("b", "2", 1.0, 2.0),
            merged("c", "3", 2.0, 3.0),
            merged("b", "4", 3.0, 4.0),
        ];
        let result = normalize_speakers(segments);

        let raw_count = 3;
        let normalized: HashSet<&str> = result.iter().map(|s| s.speaker_id.as_str()).collect();
        assert_eq!(normalized.len(), raw_count);
        for i in 0..raw_count {
            assert!(normalized.contains(format!("SPEAKER_{i:02}").as_str()));
        }
    }

    #[test]
    fn speaker_stats_totals() {
        let segments = vec![
            merged("SPEAKER_00", "A", 0.0, 5.0),
            merged("SPEAKER_01", "B", 5.0, 8.0),
            merged("SPEAKER_00", "C", 8.0, 12.0),
        ];
        let stats = compute_speaker_stats(&segments);

        let by_id: HashMap<&str, &SpeakerStats> =
            stats.iter().map(|s| (s.speaker_id.as_str(), s)).collect();
        assert_eq!(by_id["SPEAKER_00"].total_duration, 9.0);
        assert_eq!(by_id["SPEAKER_00"].segment_count, 2);
        assert_eq!(by_id["SPEAKER_01"].total_duration, 3.0);
        assert_eq!(by_id["SPEAKER_01"].segment_count, 1);
    }

    // -- warnings --------------------------------------------------------

    #[test]
    fn short_text_for_long_audio_warns() {
        let results = vec![
            response("tiny", vec![seg("s0", "tiny.", 0.0, 90.0)]),
            response(
                &"a long enough transcription ".repeat(10),
                vec![seg("s0", "words.", 0.0, 90.0)],
            ),
        ];
        let chunks = vec![chunk(0, 0.0, 90.0), chunk(1, 87.0, 177.0)];

        let result = merger().merge(&results, &chunks);
        assert!(result.warnings.iter().any(|w| w.contains("Chunk 0")
            && w.contains("Suspiciously short")));
    }

    #[test]
    fn missing_terminal_punctuation_warns() {
        let results = vec![
            response(
                &"plenty of text here to avoid the short warning ".repeat(5),
                vec![seg("s0", "cut off mid sent", 0.0, 90.0)],
            ),
            response(
                &"plenty of text here to avoid the short warning ".repeat(5),
                vec![seg("s0", "Finished properly.", 0.0, 90.0)],
            ),
        ];
        let chunks = vec![chunk(0, 0.0, 90.0), chunk(1, 87.0, 177.0)];

        let result = merger().merge(&results, &chunks);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Chunk 0") && w.contains("punctuation")));
        assert!(!result
            .warnings
            .iter()
            .any(|w| w.contains("Chunk 1") && w.contains("punctuation")));
    }

    #[test]
    fn fallback_metadata_warns() {
        let mut fallback = response("x.", vec![seg("s0", "x.", 0.0, 5.0)]);
        fallback
            .metadata
            .insert("fallback".to_string(), serde_json::json!("raw_text"));
        let ok = response("y.", vec![seg("s0", "y.", 0.0, 5.0)]);

        let chunks = vec![chunk(0, 0.0, 5.0), chunk(1, 4.0, 9.0)];
        let result = merger().merge(&[fallback, ok], &chunks);

        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Chunk 0") && w.contains("fallback")));
    }

    // -- document shape --------------------------------------------------

    #[test]
    fn transcript_document_serializes_with_expected_fields() {
        let results = vec![response(
            "Hello.",
            vec![seg("s0", "Hello.", 0.0, 2.0)],
        )];
        let doc = merger().merge(&results, &[chunk(0, 0.0, 2.0)]);

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("full_text").is_some());
        assert!(json.get("segments").is_some());
        assert!(json.get("speakers").is_some());
        assert_eq!(json["metadata"]["chunks_merged"], 1);
        assert!(json.get("warnings").is_some());
    }
}
