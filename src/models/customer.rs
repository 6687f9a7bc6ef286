use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::services::analytics::CustomerActivity;
use crate::services::segmentation::SegmentFlags;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerOverview {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub total_spent: f64,
    pub last_order: Option<DateTime<Utc>>,
    pub order_count: i64,
    pub status: String,
}

/// Single headline tag: High Value beats At Risk beats Active
pub fn status_label(flags: &SegmentFlags) -> &'static str {
    if flags.high_value {
        "High Value"
    } else if flags.at_risk {
        "At Risk"
    } else {
        "Active"
    }
}

impl From<CustomerActivity> for CustomerOverview {
    fn from(activity: CustomerActivity) -> Self {
        Self {
            id: activity.customer.id,
            name: activity.customer.display_name(),
            email: activity.customer.email,
            total_spent: activity.stats.total_spent().to_f64().unwrap_or(0.0),
            last_order: activity.stats.last_paid_at,
            order_count: activity.stats.order_count,
            status: status_label(&activity.flags).to_string(),
        }
    }
}

pub type CustomerOverviewResponse = Vec<CustomerOverview>;
