use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::services::segmentation::{DashboardMetrics, SegmentCounts};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FreshQuery {
    /// Bypass the dashboard cache
    #[serde(default)]
    pub fresh: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub total_customers: u64,
    pub total_orders: i64,
    pub total_spent: f64,
    pub average_order_value: f64,
    pub loyal_customers: u64,
    pub high_value_customers: u64,
    pub at_risk_customers: u64,
    pub dormant_customers: u64,
    pub cached: bool,
}

impl DashboardResponse {
    pub fn new(metrics: DashboardMetrics, cached: bool) -> Self {
        Self {
            total_customers: metrics.total_customers,
            total_orders: metrics.total_orders,
            total_spent: metrics.total_spent.to_f64().unwrap_or(0.0),
            average_order_value: metrics.average_order_value.to_f64().unwrap_or(0.0),
            loyal_customers: metrics.segments.loyal_customers,
            high_value_customers: metrics.segments.high_value_customers,
            at_risk_customers: metrics.segments.at_risk_customers,
            dormant_customers: metrics.segments.dormant_customers,
            cached,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentsResponse {
    #[serde(flatten)]
    pub segments: SegmentCounts,
    pub cached: bool,
}
