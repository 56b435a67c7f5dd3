//! Background job scheduling

use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::services::FolderScanner;

/// Initialize and start the job scheduler
pub async fn start_scheduler(
    scanner: FolderScanner,
    schedule: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Watch-folder scan
    let organize_job = Job::new_async(schedule, move |_uuid, _l| {
        let scanner = scanner.clone();
        let cancel = shutdown.child_token();
        Box::pin(async move {
            if cancel.is_cancelled() {
                return;
            }
            info!("Running auto-organize scan");
            match scanner.run(&cancel).await {
                Ok(summary) => info!(
                    found = summary.found,
                    succeeded = summary.succeeded,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "Auto-organize scan finished"
                ),
                Err(e) => tracing::error!("Auto-organize scan error: {}", e),
            }
        })
    })?;
    scheduler.add(organize_job).await?;

    scheduler.start().await?;

    info!(schedule = %schedule, "Job scheduler started");
    Ok(scheduler)
}
