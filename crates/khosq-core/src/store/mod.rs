//! Durable state: blob storage, job rows, and the task queue.
//!
//! The core consumes trait interfaces; the bundled implementations are a
//! filesystem blob store and SQLite-backed job/queue tables so a single
//! binary runs everywhere. The database is the source of truth — persisted
//! chunk rows are the crash-recovery checkpoint.

mod blob;
mod jobs;
mod queue;

pub use blob::{
    chunk_key, job_prefix, original_key, result_key, BlobStore, FsBlobStore, PresignMethod,
};
pub use jobs::JobStore;
pub use queue::{
    QueuedTask, SqliteQueue, TaskQueue, QUEUE_TRANSCRIPTION, QUEUE_WEBHOOKS, TASK_PROCESS_JOB,
    TASK_SEND_WEBHOOK,
};
