//! Shared wiring: settings → stores, queue, orchestrator, worker.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use khosq_core::provider::init_registry;
use khosq_core::store::{BlobStore, FsBlobStore, JobStore, SqliteQueue, TaskQueue};
use khosq_core::{JobWorker, Orchestrator, Settings};

/// One initialized service context for a CLI invocation.
pub struct App {
    pub settings: Settings,
    pub store: JobStore,
    pub blobs: Arc<dyn BlobStore>,
    pub queue: Arc<dyn TaskQueue>,
}

impl App {
    pub async fn init(settings: Settings) -> Result<Self> {
        // SQLite needs its directory to exist before connecting
        if let Some(path) = sqlite_file_path(&settings.database.url) {
            if let Some(parent) = Path::new(&path).parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating database directory {}", parent.display()))?;
            }
        }

        let store = JobStore::connect(&settings.database.url)
            .await
            .with_context(|| format!("opening job store at {}", settings.database.url))?;
        let queue = SqliteQueue::new(store.pool().clone())
            .await
            .context("initializing task queue")?;
        let blobs = FsBlobStore::new(&settings.storage.root);

        init_registry(&settings.providers);
        khosq_core::http::warmup_http_client().ok();

        Ok(Self {
            settings,
            store,
            blobs: Arc::new(blobs),
            queue: Arc::new(queue),
        })
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.store.clone(),
            self.blobs.clone(),
            self.queue.clone(),
            self.settings.clone(),
        )
    }

    pub fn worker(&self) -> JobWorker {
        JobWorker::new(
            self.store.clone(),
            self.blobs.clone(),
            self.queue.clone(),
            self.settings.clone(),
        )
    }
}

/// Extract the filesystem path from a `sqlite://` URL, if it has one.
fn sqlite_file_path(url: &str) -> Option<String> {
    let rest = url.strip_prefix("sqlite://")?;
    if rest.starts_with(":memory:") {
        return None;
    }
    let path = rest.split('?').next().unwrap_or(rest);
    (!path.is_empty()).then(|| path.to_string())
}
