//! The per-job transcription pipeline.

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use super::context::{coverage_gap, extract_context, gap_threshold};
use super::JobWorker;
use crate::classify::classify_error;
use crate::error::{CoreError, Result};
use crate::http::get_http_client;
use crate::job::{ChunkStatus, JobRecord, JobStatus};
use crate::media::{self, AudioChunker, ChunkSpec};
use crate::merger::{TranscriptMerger, DEFAULT_OVERLAP_THRESHOLD};
use crate::provider::{registry, SpeechBackend, TranscriptionRequest, TranscriptionResponse};
use crate::retry::retry_with_backoff;
use crate::store::{result_key, QUEUE_WEBHOOKS, TASK_SEND_WEBHOOK};

/// How many times a low-coverage chunk result is retransmitted before the
/// best attempt is accepted anyway.
const COVERAGE_RETRANSMITS: u32 = 2;

impl JobWorker {
    /// Process one job end to end.
    ///
    /// Cancellation unwinds cleanly without touching job state; any other
    /// failure is classified and persisted on the job row.
    pub async fn process_job(&self, job_id: &str) -> Result<()> {
        let span = tracing::info_span!("job", job_id);
        let outcome = self.run_pipeline(job_id).instrument(span.clone()).await;

        match outcome {
            Ok(()) => Ok(()),
            Err(err) if err.is_cancellation() => {
                span.in_scope(|| info!(reason = %err, "job cancelled, aborting cleanly"));
                Ok(())
            }
            Err(err) => {
                let (code, message) = classify_error(&err);
                if let Err(update_err) = self
                    .store
                    .update_status(job_id, JobStatus::Failed, Some(&message), Some(code))
                    .await
                {
                    // Job may have been deleted underneath us
                    span.in_scope(|| warn!(error = %update_err, "could not record job failure"));
                }
                Err(err)
            }
        }
    }

    async fn run_pipeline(&self, job_id: &str) -> Result<()> {
        // Admit. Only uploaded/processing jobs are workable; a redelivered
        // terminal job short-circuits here.
        let job = self.store.get_job(job_id, true).await?;
        match job.status {
            JobStatus::Uploaded | JobStatus::Processing => {}
            status => {
                warn!(%status, "job not in a processable state, skipping");
                return Ok(());
            }
        }
        let existing_chunks = job.chunks.len();
        self.store
            .update_status(job_id, JobStatus::Processing, None, None)
            .await?;

        let original_key = job
            .original_key
            .clone()
            .ok_or_else(|| CoreError::validation("no audio uploaded for this job"))?;
        let filename = job
            .original_filename
            .clone()
            .unwrap_or_else(|| "audio.wav".to_string());

        let extension = match media::file_extension(&filename) {
            Some(ext) if !media::is_supported_filename(&filename) => {
                return Err(crate::media::MediaError::UnsupportedFormat { extension: ext }.into());
            }
            Some(ext) => ext,
            None => "wav".to_string(),
        };

        // Fetch the original into a per-job scratch directory; the TempDir
        // guard removes everything on exit, normal or not.
        let scratch = tempfile::tempdir()?;
        let source_path = scratch.path().join(format!("source.{extension}"));
        self.blobs
            .download_to_path(&original_key, &source_path)
            .await?;

        // Preprocess: demux video, then normalize everything to 16 kHz
        // mono so every provider sees the same codec profile.
        let wav_path = if media::is_video_filename(&filename) {
            media::extract_audio(&source_path, scratch.path()).await?
        } else {
            media::normalize_to_wav(&source_path, scratch.path()).await?
        };

        // Chunk
        let metadata = media::probe(&wav_path).await?;
        let chunker = AudioChunker::from_settings(&self.settings.chunking);

        let chunks: Vec<ChunkSpec> = if metadata.duration <= chunker.max_chunk_duration() {
            vec![ChunkSpec::whole(metadata.duration, wav_path.clone())]
        } else {
            chunker
                .chunk_audio(&wav_path, &scratch.path().join("chunks"))
                .await?
        };

        if existing_chunks == 0 {
            let spans: Vec<(i64, f64, f64)> = chunks
                .iter()
                .map(|c| (c.index as i64, c.start_time, c.end_time))
                .collect();
            self.store.create_chunks_batch(job_id, &spans).await?;
            self.store
                .update_chunk_counts(job_id, chunks.len() as i64)
                .await?;
        }

        info!(
            total_chunks = chunks.len(),
            duration = metadata.duration,
            provider = %job.provider,
            "processing job"
        );

        // Iterate chunks sequentially, in index order
        let provider = registry().get_by_kind(job.provider)?;
        let mut results: Vec<TranscriptionResponse> = Vec::with_capacity(chunks.len());

        for spec in &chunks {
            // Cancellation takes effect between chunks as well as between
            // retry attempts
            check_job_active(&self.store, job_id).await?;

            let chunk_span = tracing::info_span!("chunk", chunk_index = spec.index);

            let row = self
                .store
                .get_chunk(job_id, spec.index as i64)
                .await?
                .ok_or_else(|| {
                    CoreError::internal(format!("chunk row {} missing for job", spec.index))
                })?;

            // Already done on a previous delivery: reuse the stored result
            if row.status == ChunkStatus::Completed {
                let stored = row.result.ok_or_else(|| {
                    CoreError::internal(format!("completed chunk {} has no result", spec.index))
                })?;
                results.push(stored);
                continue;
            }

            self.store.mark_chunk_processing(&row.id).await?;

            let request = self.build_chunk_request(&job, spec, &results);
            let audio_path = spec
                .path
                .as_ref()
                .ok_or_else(|| CoreError::internal("chunk descriptor without a file"))?;
            let audio_data = tokio::fs::read(audio_path).await?;

            let outcome = self
                .transcribe_chunk(&provider, job_id, spec, audio_data, &request)
                .instrument(chunk_span)
                .await;

            match outcome {
                Ok(result) => {
                    self.store.set_chunk_result(&row.id, &result).await?;
                    self.store.increment_completed_chunks(job_id).await?;

                    // Per-chunk forensics artifact, best effort
                    let artifact_key =
                        format!("jobs/{job_id}/chunks/chunk_{:04}.json", spec.index);
                    if let Ok(value) = serde_json::to_value(&result)
                        && let Err(e) = self.blobs.put_json(&artifact_key, &value).await
                    {
                        warn!(chunk_index = spec.index, error = %e, "failed to store chunk artifact");
                    }

                    results.push(result);
                }
                Err(err) => {
                    if err.is_cancellation() {
                        return Err(err);
                    }
                    self.store.set_chunk_failed(&row.id, &err.to_string()).await?;
                    return Err(err);
                }
            }
        }

        // A job deleted or cancelled while its last chunk was in flight
        // must not have its artifacts re-created
        check_job_active(&self.store, job_id).await?;

        // Pre-merge combined artifact, best effort
        if let Ok(value) = serde_json::to_value(&results) {
            let combined_key = format!("jobs/{job_id}/chunks/combined.json");
            if let Err(e) = self.blobs.put_json(&combined_key, &value).await {
                warn!(error = %e, "failed to store combined artifact");
            }
        }

        // Merge
        let merger = TranscriptMerger::new(
            DEFAULT_OVERLAP_THRESHOLD,
            self.settings.chunking.similarity_threshold(),
        );
        let merged = merger.merge(&results, &chunks);
        if !merged.warnings.is_empty() {
            warn!(warnings = merged.warnings.len(), "merge produced quality warnings");
        }

        // Persist result
        let key = result_key(job_id);
        let document = serde_json::to_value(&merged)?;
        self.blobs.put_json(&key, &document).await?;
        self.store.set_result(job_id, &document, &key).await?;

        info!(
            chunks = chunks.len(),
            segments = merged.segments.len(),
            speakers = merged.speakers.len(),
            "transcription job completed"
        );

        // Notify
        if let Some(url) = &job.webhook_url {
            self.queue
                .enqueue(
                    QUEUE_WEBHOOKS,
                    TASK_SEND_WEBHOOK,
                    json!({ "job_id": job_id, "webhook_url": url }),
                )
                .await?;
        }

        Ok(())
    }

    /// Per-chunk provider request: the job config plus chunk-local fields
    /// and the context carried from earlier chunks.
    fn build_chunk_request(
        &self,
        job: &JobRecord,
        spec: &ChunkSpec,
        results: &[TranscriptionResponse],
    ) -> TranscriptionRequest {
        let config = &job.config;

        let (context_text, known_speakers) = if spec.index > 0 {
            extract_context(results, self.settings.chunking.context_segments)
        } else {
            (String::new(), Vec::new())
        };

        if spec.index > 0 && !context_text.is_empty() {
            info!(
                chunk_index = spec.index,
                context_chars = context_text.chars().count(),
                known_speakers = known_speakers.len(),
                "passing context to chunk"
            );
        }

        TranscriptionRequest {
            language: config.language.clone(),
            additional_languages: config.additional_languages.clone(),
            prompt: config.context.prompt.clone(),
            custom_vocabulary: config.context.custom_vocabulary.clone(),
            domain: config.context.domain.clone(),
            previous_transcript_context: (!context_text.is_empty()).then_some(context_text),
            previous_speakers: known_speakers,
            chunk_index: spec.index,
            diarization_enabled: config.diarization.enabled,
            min_speakers: config.diarization.min_speakers,
            max_speakers: config.diarization.max_speakers,
            include_timestamps: config.output.include_timestamps,
            timestamp_granularity: config.output.timestamp_granularity,
            include_confidence: config.output.include_confidence,
            audio_duration: spec.duration(),
            audio_format: "wav".to_string(),
        }
    }

    /// Transcribe one chunk with retries, rate limiting, cancellation
    /// polling and the coverage check.
    ///
    /// A result leaving too much of the chunk uncovered is retransmitted
    /// up to twice; the attempt with the smallest gap wins.
    async fn transcribe_chunk(
        &self,
        provider: &Arc<dyn SpeechBackend>,
        job_id: &str,
        spec: &ChunkSpec,
        audio_data: Vec<u8>,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse> {
        let client = get_http_client().map_err(|e| CoreError::internal(e.to_string()))?;
        let duration = spec.duration();
        let threshold = gap_threshold(duration);

        let mut best: Option<(f64, TranscriptionResponse)> = None;

        for pass in 0..=COVERAGE_RETRANSMITS {
            let store = self.store.clone();
            let job_id_owned = job_id.to_string();

            let result = retry_with_backoff(
                || {
                    let audio = audio_data.clone();
                    async move {
                        provider
                            .transcribe(client, audio, request)
                            .await
                            .map_err(CoreError::Provider)
                    }
                },
                &self.settings.retry,
                Some(provider.name()),
                move |_attempt, _err, _delay| {
                    let store = store.clone();
                    let job_id = job_id_owned.clone();
                    async move { check_job_active(&store, &job_id).await }
                },
            )
            .await?;

            match coverage_gap(&result.segments, duration) {
                None => return Ok(result),
                Some(gap) if gap <= threshold => return Ok(result),
                Some(gap) => {
                    warn!(
                        gap,
                        threshold,
                        pass = pass + 1,
                        "coverage gap exceeds threshold, retransmitting chunk"
                    );
                    if best.as_ref().map(|(g, _)| gap < *g).unwrap_or(true) {
                        best = Some((gap, result));
                    }
                }
            }
        }

        let (gap, result) = best
            .ok_or_else(|| CoreError::internal("no transcription attempt recorded"))?;
        warn!(gap, "accepting transcription with residual coverage gap");
        Ok(result)
    }
}

/// Raise `JobCancelled` when the job disappeared or left the workable
/// states. Polled by the retry engine between attempts.
async fn check_job_active(store: &crate::store::JobStore, job_id: &str) -> Result<()> {
    let Some(job) = store.get_job_opt(job_id, false).await? else {
        return Err(CoreError::cancelled(format!("job {job_id} no longer exists")));
    };

    match job.status {
        JobStatus::Uploaded | JobStatus::Processing => Ok(()),
        status => Err(CoreError::cancelled(format!(
            "job {job_id} status is {status}"
        ))),
    }
}
