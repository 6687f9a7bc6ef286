//! Sync status bookkeeping for processor syncs
//!
//! One row per vendor keeps the background job from hammering the processor
//! on restart and records the last failure for operators.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};

use crate::entities::sync_status::{self, Entity as SyncStatus};

/// Default minimum interval between processor syncs (in seconds)
pub const PROCESSOR_SYNC_INTERVAL: i32 = 21600; // 6 hours

pub fn processor_job_name(vendor_id: i32) -> String {
    format!("processor_sync:vendor:{}", vendor_id)
}

pub async fn find(db: &DatabaseConnection, job_name: &str) -> Result<Option<sync_status::Model>, DbErr> {
    SyncStatus::find()
        .filter(sync_status::Column::JobName.eq(job_name))
        .one(db)
        .await
}

/// Check if a vendor sync should run based on last successful sync time
///
/// Returns true if:
/// - No record exists for this vendor (first run)
/// - Last successful sync was at least the recorded min interval ago
pub async fn should_sync(
    db: &DatabaseConnection,
    vendor_id: i32,
    now: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let job_name = processor_job_name(vendor_id);

    let Some(record) = find(db, &job_name).await? else {
        tracing::info!("[{}] First run detected, will sync", job_name);
        return Ok(true);
    };

    let Some(last_success) = record.last_success_at else {
        tracing::info!("[{}] No previous successful sync, will sync", job_name);
        return Ok(true);
    };

    let elapsed = now.signed_duration_since(last_success);
    let interval = Duration::seconds(record.min_interval_secs as i64);

    if elapsed >= interval {
        tracing::info!(
            "[{}] Last sync was {}s ago (min: {}s), will sync",
            job_name,
            elapsed.num_seconds(),
            record.min_interval_secs
        );
        Ok(true)
    } else {
        tracing::debug!(
            "[{}] Skipping sync - next sync in {}s",
            job_name,
            (interval - elapsed).num_seconds()
        );
        Ok(false)
    }
}

/// Record a successful vendor sync
pub async fn record_success(
    db: &DatabaseConnection,
    vendor_id: i32,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    let job_name = processor_job_name(vendor_id);

    match find(db, &job_name).await? {
        Some(record) => {
            let success_count = record.success_count;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_success_at = Set(Some(now));
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(None);
            active_model.success_count = Set(success_count + 1);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.clone()),
                vendor_id: Set(Some(vendor_id)),
                last_success_at: Set(Some(now)),
                last_attempt_at: Set(Some(now)),
                last_error: Set(None),
                success_count: Set(1),
                error_count: Set(0),
                min_interval_secs: Set(PROCESSOR_SYNC_INTERVAL),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!("[{}] Recorded successful sync", job_name);
    Ok(())
}

/// Record a failed vendor sync attempt
pub async fn record_failure(
    db: &DatabaseConnection,
    vendor_id: i32,
    error: &str,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    let job_name = processor_job_name(vendor_id);

    match find(db, &job_name).await? {
        Some(record) => {
            let error_count = record.error_count;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(Some(error.to_string()));
            active_model.error_count = Set(error_count + 1);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.clone()),
                vendor_id: Set(Some(vendor_id)),
                last_success_at: Set(None),
                last_attempt_at: Set(Some(now)),
                last_error: Set(Some(error.to_string())),
                success_count: Set(0),
                error_count: Set(1),
                min_interval_secs: Set(PROCESSOR_SYNC_INTERVAL),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!("[{}] Recorded failed sync: {}", job_name, error);
    Ok(())
}

/// Update the minimum interval for a vendor's sync
pub async fn set_min_interval(
    db: &DatabaseConnection,
    vendor_id: i32,
    interval_secs: i32,
) -> Result<(), DbErr> {
    let job_name = processor_job_name(vendor_id);

    match find(db, &job_name).await? {
        Some(record) => {
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.min_interval_secs = Set(interval_secs);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.clone()),
                vendor_id: Set(Some(vendor_id)),
                success_count: Set(0),
                error_count: Set(0),
                min_interval_secs: Set(interval_secs),
                ..Default::default()
            };
            new_record.insert(db).await?;
        }
    }

    tracing::info!("[{}] Set min interval to {}s", job_name, interval_secs);
    Ok(())
}
