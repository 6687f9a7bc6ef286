use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::customers;
use crate::services::segmentation::CustomerStats;

/// `value` and `days` stay raw so type errors become validation messages
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentFilterRequest {
    pub filter_type: Option<String>,
    pub value: Option<Value>,
    pub days: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilteredCustomer {
    pub id: i32,
    pub customer_code: String,
    pub name: String,
    pub email: String,
    pub total_spent: f64,
    pub order_count: i64,
    pub last_order: Option<DateTime<Utc>>,
}

impl FilteredCustomer {
    pub fn new(customer: &customers::Model, stats: &CustomerStats) -> Self {
        Self {
            id: customer.id,
            customer_code: customer.customer_code.clone(),
            name: customer.display_name(),
            email: customer.email.clone(),
            total_spent: stats.total_spent().to_f64().unwrap_or(0.0),
            order_count: stats.order_count,
            last_order: stats.last_paid_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentFilterResponse {
    pub filter_type: String,
    pub count: usize,
    pub customers: Vec<FilteredCustomer>,
}
