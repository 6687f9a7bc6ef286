use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::time::{interval, Duration};

use crate::services::clock::Clock;
use crate::services::processor_sync::ProcessorSync;
use crate::services::{sync_status, transaction_store};

/// Upper bound between due-checks so a vendor is never more than this late
const MAX_CHECK_PERIOD_SECS: u64 = 900;

/// Periodically sync every connected vendor whose interval has elapsed.
///
/// `interval_secs == 0` disables the job.
pub async fn start_processor_sync_job(
    db: DatabaseConnection,
    sync: ProcessorSync,
    clock: Arc<dyn Clock>,
    interval_secs: u64,
) {
    if interval_secs == 0 {
        tracing::info!("Processor sync job disabled (SYNC_INTERVAL_SECS=0)");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_secs.min(MAX_CHECK_PERIOD_SECS)));

        loop {
            ticker.tick().await;

            match sync_due_vendors(&db, &sync, clock.as_ref(), interval_secs).await {
                Ok(0) => tracing::debug!("No vendor syncs due"),
                Ok(synced) => tracing::info!("Processor sync pass finished: {} vendors attempted", synced),
                Err(e) => tracing::warn!("Processor sync pass failed: {}", e),
            }
        }
    });
}

/// One pass over connected vendors. Returns how many syncs were attempted.
pub async fn sync_due_vendors(
    db: &DatabaseConnection,
    sync: &ProcessorSync,
    clock: &dyn Clock,
    interval_secs: u64,
) -> Result<usize, sea_orm::DbErr> {
    let interval_secs = i32::try_from(interval_secs).unwrap_or(i32::MAX);
    let mut attempted = 0;

    for vendor in transaction_store::connected_vendors(db).await? {
        let job_name = sync_status::processor_job_name(vendor.id);
        let configured = sync_status::find(db, &job_name)
            .await?
            .is_some_and(|record| record.min_interval_secs == interval_secs);
        if !configured {
            sync_status::set_min_interval(db, vendor.id, interval_secs).await?;
        }

        match sync_status::should_sync(db, vendor.id, clock.now()).await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!("Failed to check sync status for vendor {}: {}", vendor.id, e);
                continue;
            }
        }

        attempted += 1;
        if let Err(e) = sync.sync_and_record(&vendor).await {
            tracing::error!("Scheduled sync failed for vendor {}: {}", vendor.id, e);
        }
    }

    Ok(attempted)
}
