//! Run the worker process: startup recovery, queue loops, janitor.

use anyhow::Result;
use tracing::info;

use crate::app::App;
use khosq_core::{recover_stale_jobs, Janitor};

pub async fn run(app: &App) -> Result<()> {
    // Sweep jobs orphaned by a previous crash before taking new work
    recover_stale_jobs(&app.store, app.settings.janitor.stale_minutes).await?;

    let worker = app.worker();
    let webhook_worker = app.worker();
    let janitor = Janitor::new(
        app.store.clone(),
        app.blobs.clone(),
        app.settings.janitor.retention_days,
    );

    info!("khosq worker starting");

    tokio::select! {
        result = worker.run() => result?,
        result = webhook_worker.run_webhooks() => result?,
        result = janitor.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received; in-flight jobs will be resumed or swept on restart");
        }
    }

    Ok(())
}
