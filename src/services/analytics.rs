//! Store-backed segmentation for one vendor at a time.
//!
//! Every read checks the vendor first (`NotFound`, then `NotConnected`), loads a
//! snapshot with the configured aggregation mode, and hands it to the pure
//! engines. Cached results are keyed by vendor id, so tenants never share state.

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::debug;

use crate::entities::{customers, vendors};
use crate::error::AppError;
use crate::services::clock::Clock;
use crate::services::dashboard_cache::DashboardCache;
use crate::services::dynamic_filter::{self, DynamicFilter};
use crate::services::segmentation::{
    self, CustomerStats, DashboardMetrics, Segment, SegmentCounts, SegmentFlags, SegmentRules,
    SegmentationReport,
};
use crate::services::transaction_store::{self, AggregationMode, VendorSnapshot};

/// A value plus whether it came from the dashboard cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    pub value: T,
    pub cached: bool,
}

/// One customer with the facts the engines derived for them
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerActivity {
    pub customer: customers::Model,
    pub stats: CustomerStats,
    pub flags: SegmentFlags,
}

#[derive(Clone)]
pub struct AnalyticsService {
    db: DatabaseConnection,
    mode: AggregationMode,
    rules: SegmentRules,
    cache: Arc<DashboardCache>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsService {
    pub fn new(
        db: DatabaseConnection,
        mode: AggregationMode,
        rules: SegmentRules,
        cache: Arc<DashboardCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            mode,
            rules,
            cache,
            clock,
        }
    }

    async fn connected_vendor(&self, vendor_id: i32) -> Result<vendors::Model, AppError> {
        let vendor = transaction_store::find_vendor(&self.db, vendor_id).await?;
        if vendor.processor_credential().is_none() {
            return Err(AppError::NotConnected);
        }
        Ok(vendor)
    }

    async fn report(&self, vendor_id: i32) -> Result<(VendorSnapshot, SegmentationReport), AppError> {
        let now = self.clock.now();
        let snapshot = transaction_store::load_snapshot(
            &self.db,
            vendor_id,
            self.mode,
            self.rules.recent_since(now),
        )
        .await?;

        let report = segmentation::segment_customers(
            &snapshot.customers,
            &snapshot.stats,
            snapshot.totals,
            now,
            &self.rules,
        );
        Ok((snapshot, report))
    }

    /// Totals, average order value and segment counts (5-minute cache).
    pub async fn dashboard(
        &self,
        vendor_id: i32,
        fresh: bool,
    ) -> Result<Cached<DashboardMetrics>, AppError> {
        self.connected_vendor(vendor_id).await?;

        if !fresh {
            if let Some(metrics) = self.cache.get_dashboard(vendor_id) {
                return Ok(Cached {
                    value: metrics,
                    cached: true,
                });
            }
        }

        let (_, report) = self.report(vendor_id).await?;
        self.cache.put_dashboard(vendor_id, report.metrics.clone());

        Ok(Cached {
            value: report.metrics,
            cached: false,
        })
    }

    /// Segment counts only (24-hour cache).
    pub async fn segment_counts(
        &self,
        vendor_id: i32,
        fresh: bool,
    ) -> Result<Cached<SegmentCounts>, AppError> {
        self.connected_vendor(vendor_id).await?;

        if !fresh {
            if let Some(counts) = self.cache.get_segment_counts(vendor_id) {
                return Ok(Cached {
                    value: counts,
                    cached: true,
                });
            }
        }

        let (_, report) = self.report(vendor_id).await?;
        let counts = report.metrics.segments;
        self.cache.put_segment_counts(vendor_id, counts);

        Ok(Cached {
            value: counts,
            cached: false,
        })
    }

    /// Customers matching an ad-hoc predicate, with stats over the filter's window.
    pub async fn filter_customers(
        &self,
        vendor_id: i32,
        filter: &DynamicFilter,
    ) -> Result<Vec<(customers::Model, CustomerStats)>, AppError> {
        self.connected_vendor(vendor_id).await?;

        let now = self.clock.now();
        let snapshot = transaction_store::load_snapshot(
            &self.db,
            vendor_id,
            self.mode,
            filter.recent_since(now),
        )
        .await?;

        let matched: Vec<(customers::Model, CustomerStats)> =
            dynamic_filter::apply(filter, &snapshot.customers, &snapshot.stats, now)
                .into_iter()
                .map(|c| {
                    let stats = snapshot.stats.get(&c.id).copied().unwrap_or_default();
                    (c.clone(), stats)
                })
                .collect();

        debug!(
            "Vendor {}: {:?} filter matched {} of {} customers",
            vendor_id,
            filter.kind,
            matched.len(),
            snapshot.customers.len()
        );

        Ok(matched)
    }

    /// Every customer with stats and segment flags, in id order.
    pub async fn customer_activity(&self, vendor_id: i32) -> Result<Vec<CustomerActivity>, AppError> {
        self.connected_vendor(vendor_id).await?;

        let (snapshot, report) = self.report(vendor_id).await?;

        Ok(snapshot
            .customers
            .into_iter()
            .zip(report.customers)
            .map(|(customer, segments)| CustomerActivity {
                customer,
                stats: segments.stats,
                flags: segments.flags,
            })
            .collect())
    }

    /// Members of one segment; always computed fresh.
    pub async fn customers_in_segment(
        &self,
        vendor_id: i32,
        segment: Segment,
    ) -> Result<Vec<customers::Model>, AppError> {
        Ok(self
            .customer_activity(vendor_id)
            .await?
            .into_iter()
            .filter(|activity| activity.flags.contains(segment))
            .map(|activity| activity.customer)
            .collect())
    }
}
