//! Dynamic Filter Engine
//!
//! Ad-hoc customer predicates supplied at query time. Like the segmentation
//! engine it works over [`CustomerStats`] built from successful orders only.
//!
//! `value` is overloaded: a major-unit amount for `spend_more_than`, an order
//! count threshold for `ordered_in_last`, and unused for `last_visited`.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

use crate::entities::customers;
use crate::error::AppError;
use crate::services::segmentation::CustomerStats;

/// Longest accepted `days` window (about a century)
pub const MAX_FILTER_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Total successful spend (major units) > value
    SpendMoreThan,
    /// Successful orders paid within `days` >= value
    OrderedInLast,
    /// Last successful order at most `days` whole days ago
    LastVisited,
}

impl FromStr for FilterKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "spend_more_than" => Ok(FilterKind::SpendMoreThan),
            "ordered_in_last" => Ok(FilterKind::OrderedInLast),
            "last_visited" => Ok(FilterKind::LastVisited),
            other => Err(AppError::validation(format!(
                "Unknown filter_type '{}' (expected spend_more_than, ordered_in_last or last_visited)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicFilter {
    pub kind: FilterKind,
    pub value: Decimal,
    pub days: i64,
}

impl DynamicFilter {
    /// Validate raw request parameters. Missing `value`/`days` default to 0;
    /// numbers may arrive as JSON numbers or numeric strings.
    pub fn parse(
        filter_type: Option<&str>,
        value: Option<&Value>,
        days: Option<&Value>,
    ) -> Result<Self, AppError> {
        let kind: FilterKind = filter_type
            .ok_or_else(|| AppError::validation("filter_type is required"))?
            .parse()?;

        let value = match value {
            None | Some(Value::Null) => Decimal::ZERO,
            Some(raw) => parse_decimal(raw)
                .ok_or_else(|| AppError::validation(format!("value must be numeric, got {}", raw)))?,
        };

        let days = match days {
            None | Some(Value::Null) => 0,
            Some(raw) => parse_days(raw).ok_or_else(|| {
                AppError::validation(format!(
                    "days must be an integer between 0 and {}, got {}",
                    MAX_FILTER_DAYS, raw
                ))
            })?,
        };

        Ok(Self { kind, value, days })
    }

    /// Start of the recency window used for `ordered_in_last`.
    pub fn recent_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days)
    }

    /// `stats.recent_orders` must cover `self.recent_since(now)`.
    pub fn matches(&self, stats: &CustomerStats, now: DateTime<Utc>) -> bool {
        match self.kind {
            FilterKind::SpendMoreThan => stats.total_spent() > self.value,
            FilterKind::OrderedInLast => Decimal::from(stats.recent_orders) >= self.value,
            FilterKind::LastVisited => stats
                .days_since_last_order(now)
                .is_some_and(|d| d <= self.days),
        }
    }
}

/// Customers matching `filter`, in input order. Missing stats mean no orders.
pub fn apply<'a>(
    filter: &DynamicFilter,
    customers: &'a [customers::Model],
    stats: &HashMap<i32, CustomerStats>,
    now: DateTime<Utc>,
) -> Vec<&'a customers::Model> {
    customers
        .iter()
        .filter(|c| {
            let stats = stats.get(&c.id).copied().unwrap_or_default();
            filter.matches(&stats, now)
        })
        .collect()
}

fn parse_decimal(raw: &Value) -> Option<Decimal> {
    match raw {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn parse_days(raw: &Value) -> Option<i64> {
    let days = match raw {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (0..=MAX_FILTER_DAYS).contains(&days).then_some(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::segmentation::SuccessfulOrder;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn customer(id: i32) -> customers::Model {
        customers::Model {
            id,
            vendor_id: 1,
            customer_code: format!("CUS_{}", id),
            email: format!("c{}@example.com", id),
            first_name: None,
            last_name: None,
            phone: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn stats(filter: &DynamicFilter, orders: &[(i64, i64)]) -> CustomerStats {
        let orders: Vec<SuccessfulOrder> = orders
            .iter()
            .map(|(days_ago, amount_minor)| SuccessfulOrder {
                amount_minor: *amount_minor,
                paid_at: Some(now() - Duration::days(*days_ago)),
            })
            .collect();
        CustomerStats::from_orders(&orders, filter.recent_since(now())).unwrap()
    }

    #[test]
    fn test_spend_more_than_is_strict() {
        let filter =
            DynamicFilter::parse(Some("spend_more_than"), Some(&json!(500)), None).unwrap();
        let customers = vec![customer(1), customer(2), customer(3)];
        let mut by_id = HashMap::new();
        by_id.insert(1, stats(&filter, &[(3, 49_999)]));
        by_id.insert(2, stats(&filter, &[(3, 50_000)]));
        by_id.insert(3, stats(&filter, &[(3, 25_000), (4, 25_001)]));

        let matched = apply(&filter, &customers, &by_id, now());
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 3);
    }

    #[test]
    fn test_ordered_in_last_uses_value_as_count() {
        let filter =
            DynamicFilter::parse(Some("ordered_in_last"), Some(&json!("2")), Some(&json!(30)))
                .unwrap();
        assert_eq!(filter.value, dec!(2));
        assert!(filter.matches(&stats(&filter, &[(1, 100), (29, 100)]), now()));
        assert!(!filter.matches(&stats(&filter, &[(1, 100), (31, 100)]), now()));
    }

    #[test]
    fn test_last_visited_requires_an_order() {
        let filter = DynamicFilter::parse(Some("last_visited"), None, Some(&json!(7))).unwrap();
        assert!(filter.matches(&stats(&filter, &[(7, 100)]), now()));
        assert!(!filter.matches(&stats(&filter, &[(8, 100)]), now()));
        assert!(!filter.matches(&CustomerStats::default(), now()));
    }

    #[test]
    fn test_missing_value_and_days_default_to_zero() {
        let filter = DynamicFilter::parse(Some("spend_more_than"), None, None).unwrap();
        assert_eq!(filter.value, Decimal::ZERO);
        assert_eq!(filter.days, 0);
        assert!(!filter.matches(&CustomerStats::default(), now()));
    }

    #[test]
    fn test_unknown_filter_type_is_rejected() {
        let err = DynamicFilter::parse(Some("bought_shoes"), None, None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = DynamicFilter::parse(None, None, None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_non_numeric_parameters_are_rejected() {
        let err = DynamicFilter::parse(Some("spend_more_than"), Some(&json!("lots")), None)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = DynamicFilter::parse(Some("last_visited"), None, Some(&json!(2.5))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = DynamicFilter::parse(Some("last_visited"), None, Some(&json!(-1))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_days_window_is_bounded() {
        let filter =
            DynamicFilter::parse(Some("last_visited"), None, Some(&json!(MAX_FILTER_DAYS))).unwrap();
        assert_eq!(filter.recent_since(now()), now() - Duration::days(MAX_FILTER_DAYS));

        for days in [json!(MAX_FILTER_DAYS + 1), json!(100_000_000), json!("1000000000000")] {
            let err = DynamicFilter::parse(Some("last_visited"), None, Some(&days)).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
    }

    #[test]
    fn test_decimal_values_stay_exact() {
        let filter =
            DynamicFilter::parse(Some("spend_more_than"), Some(&json!(500.01)), None).unwrap();
        assert_eq!(filter.value, dec!(500.01));
    }
}
