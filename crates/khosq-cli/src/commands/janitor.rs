//! Run one retention sweep.

use anyhow::Result;

use crate::app::App;
use khosq_core::Janitor;

pub async fn run(app: &App) -> Result<()> {
    let retention = app.settings.janitor.retention_days;
    if retention <= 0 {
        println!("Janitor is disabled (retention_days <= 0).");
        return Ok(());
    }

    let janitor = Janitor::new(app.store.clone(), app.blobs.clone(), retention);
    let evicted = janitor.sweep_once().await?;
    println!("Evicted {evicted} expired jobs (retention: {retention} days).");
    Ok(())
}
