//! Segmentation Engine
//!
//! Pure classification of customers into behavioural segments from their
//! successful transactions. Both aggregation modes of the transaction store
//! reduce to [`CustomerStats`], so every caller goes through [`classify`].

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::customers;

/// Minor units per major unit (2-decimal currencies).
const MINOR_UNIT_SCALE: u32 = 2;

/// Thresholds for the four segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRules {
    pub loyal_min_orders: i64,
    pub loyal_window_days: i64,
    /// Major currency units; spend must be strictly greater
    pub high_value_threshold: Decimal,
    pub at_risk_after_days: i64,
    pub dormant_after_days: i64,
}

impl Default for SegmentRules {
    fn default() -> Self {
        Self {
            loyal_min_orders: 3,
            loyal_window_days: 90,
            high_value_threshold: Decimal::from(500),
            at_risk_after_days: 30,
            dormant_after_days: 90,
        }
    }
}

impl SegmentRules {
    pub fn with_high_value_threshold(threshold: Decimal) -> Self {
        Self {
            high_value_threshold: threshold,
            ..Self::default()
        }
    }

    /// Start of the window `CustomerStats::recent_orders` must be computed over.
    pub fn recent_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.loyal_window_days)
    }
}

/// Successful-transaction aggregates for one customer.
///
/// `recent_orders` counts orders with `paid_at >= recent_since` for whichever
/// window the producer was asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerStats {
    pub order_count: i64,
    pub total_minor: i64,
    pub last_paid_at: Option<DateTime<Utc>>,
    pub recent_orders: i64,
}

/// Minimal view of a successful transaction
#[derive(Debug, Clone, Copy)]
pub struct SuccessfulOrder {
    pub amount_minor: i64,
    pub paid_at: Option<DateTime<Utc>>,
}

impl CustomerStats {
    /// `None` when the summed amount leaves the `i64` range.
    pub fn from_orders<'a, I>(orders: I, recent_since: DateTime<Utc>) -> Option<Self>
    where
        I: IntoIterator<Item = &'a SuccessfulOrder>,
    {
        orders.into_iter().try_fold(Self::default(), |mut stats, order| {
            stats.order_count += 1;
            stats.total_minor = stats.total_minor.checked_add(order.amount_minor)?;
            if let Some(paid_at) = order.paid_at {
                if paid_at >= recent_since {
                    stats.recent_orders += 1;
                }
                stats.last_paid_at = Some(stats.last_paid_at.map_or(paid_at, |l| l.max(paid_at)));
            }
            Some(stats)
        })
    }

    pub fn total_spent(&self) -> Decimal {
        minor_to_major(self.total_minor)
    }

    /// Whole days since the last paid order
    pub fn days_since_last_order(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_paid_at.map(|last| (now - last).num_days())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    #[serde(alias = "Loyal Customers", alias = "loyal_customers")]
    Loyal,
    #[serde(alias = "High Value Customers", alias = "high_value_customers")]
    HighValue,
    #[serde(alias = "At-Risk Customers", alias = "at_risk_customers")]
    AtRisk,
    #[serde(alias = "Dormant Customers", alias = "dormant_customers")]
    Dormant,
}

impl Segment {
    pub fn display_name(&self) -> &'static str {
        match self {
            Segment::Loyal => "Loyal Customers",
            Segment::HighValue => "High Value Customers",
            Segment::AtRisk => "At-Risk Customers",
            Segment::Dormant => "Dormant Customers",
        }
    }
}

/// Independent boolean facets; not an exclusive partition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SegmentFlags {
    pub loyal: bool,
    pub high_value: bool,
    pub at_risk: bool,
    pub dormant: bool,
}

impl SegmentFlags {
    pub fn contains(&self, segment: Segment) -> bool {
        match segment {
            Segment::Loyal => self.loyal,
            Segment::HighValue => self.high_value,
            Segment::AtRisk => self.at_risk,
            Segment::Dormant => self.dormant,
        }
    }
}

/// Classify one customer. `stats.recent_orders` must cover `rules.recent_since(now)`.
pub fn classify(stats: &CustomerStats, now: DateTime<Utc>, rules: &SegmentRules) -> SegmentFlags {
    let idle_days = stats.days_since_last_order(now);

    SegmentFlags {
        loyal: stats.order_count >= rules.loyal_min_orders
            && stats.recent_orders >= rules.loyal_min_orders,
        high_value: stats.total_spent() > rules.high_value_threshold,
        at_risk: idle_days.is_some_and(|d| d >= rules.at_risk_after_days),
        dormant: stats.order_count == 0 || idle_days.is_some_and(|d| d >= rules.dormant_after_days),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCounts {
    pub loyal_customers: u64,
    pub high_value_customers: u64,
    pub at_risk_customers: u64,
    pub dormant_customers: u64,
}

impl SegmentCounts {
    fn record(&mut self, flags: SegmentFlags) {
        self.loyal_customers += flags.loyal as u64;
        self.high_value_customers += flags.high_value as u64;
        self.at_risk_customers += flags.at_risk as u64;
        self.dormant_customers += flags.dormant as u64;
    }
}

/// Vendor-level successful-order totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VendorTotals {
    pub order_count: i64,
    pub total_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardMetrics {
    pub total_customers: u64,
    pub total_orders: i64,
    pub total_spent: Decimal,
    pub average_order_value: Decimal,
    pub segments: SegmentCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSegments {
    pub customer_id: i32,
    pub stats: CustomerStats,
    pub flags: SegmentFlags,
}

/// Full engine output for one vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationReport {
    pub customers: Vec<CustomerSegments>,
    pub metrics: DashboardMetrics,
}

/// Classify every customer of a vendor and aggregate the dashboard metrics.
///
/// Customers missing from `stats` have no successful orders.
pub fn segment_customers(
    customers: &[customers::Model],
    stats: &HashMap<i32, CustomerStats>,
    totals: VendorTotals,
    now: DateTime<Utc>,
    rules: &SegmentRules,
) -> SegmentationReport {
    let mut counts = SegmentCounts::default();

    let customers: Vec<CustomerSegments> = customers
        .iter()
        .map(|customer| {
            let stats = stats.get(&customer.id).copied().unwrap_or_default();
            let flags = classify(&stats, now, rules);
            counts.record(flags);
            CustomerSegments {
                customer_id: customer.id,
                stats,
                flags,
            }
        })
        .collect();

    let metrics = DashboardMetrics {
        total_customers: customers.len() as u64,
        total_orders: totals.order_count,
        total_spent: minor_to_major(totals.total_minor),
        average_order_value: average_order_value(totals.total_minor, totals.order_count),
        segments: counts,
    };

    SegmentationReport { customers, metrics }
}

pub fn minor_to_major(amount_minor: i64) -> Decimal {
    Decimal::new(amount_minor, MINOR_UNIT_SCALE)
}

/// Total spend over order count in major units, rounded to 2 dp; zero without orders.
pub fn average_order_value(total_minor: i64, order_count: i64) -> Decimal {
    if order_count == 0 {
        return Decimal::ZERO;
    }
    (minor_to_major(total_minor) / Decimal::from(order_count)).round_dp(2)
}
